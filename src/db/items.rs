use serde::Serialize;
use uuid::Uuid;
use wardrobe_postgrest::SortOrder;

use super::ITEMS;
use crate::error::{db_error, Error, Result};
use crate::models::{Item, ItemFilter, ItemPatch, NewItem};
use crate::session::AuthContext;
use crate::Wardrobe;

#[derive(Serialize)]
struct ItemInsert<'a> {
    id: Uuid,
    owner_id: Uuid,
    #[serde(flatten)]
    item: &'a NewItem,
}

/// The `items` table
pub struct ItemStore<'a> {
    wardrobe: &'a Wardrobe,
}

impl<'a> ItemStore<'a> {
    pub(crate) fn new(wardrobe: &'a Wardrobe) -> Self {
        Self { wardrobe }
    }

    /// The owner's items, newest first
    pub async fn list(&self, ctx: &AuthContext, filter: &ItemFilter) -> Result<Vec<Item>> {
        let mut query = self
            .wardrobe
            .from(ITEMS, ctx)?
            .select("*")
            .eq("owner_id", &ctx.owner_id.to_string())
            .order("created_at", SortOrder::Descending);

        if let Some(category) = filter.category {
            query = query.eq("category", category.as_str());
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(subcategory) = filter.subcategory.as_deref().filter(|s| !s.is_empty()) {
            query = query.eq("subcategory", subcategory);
        }
        if !filter.care_tags.is_empty() {
            let tags: Vec<&str> = filter.care_tags.iter().map(String::as_str).collect();
            query = query.overlaps("care_tags", &tags);
        }

        tracing::debug!(?filter, "listing items");
        query
            .execute::<Item>()
            .await
            .map_err(db_error("failed to list items"))
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<Option<Item>> {
        self.wardrobe
            .from(ITEMS, ctx)?
            .select("*")
            .eq("id", &id.to_string())
            .execute_single::<Item>()
            .await
            .map_err(db_error("failed to load item"))
    }

    /// Batch lookup; ids that no longer resolve are simply absent
    pub async fn get_many(&self, ctx: &AuthContext, ids: &[Uuid]) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        self.wardrobe
            .from(ITEMS, ctx)?
            .select("*")
            .in_list("id", &ids)
            .execute::<Item>()
            .await
            .map_err(db_error("failed to load items"))
    }

    /// Insert with a fresh id
    pub async fn create(&self, ctx: &AuthContext, item: &NewItem) -> Result<Item> {
        self.create_with_id(ctx, Uuid::new_v4(), item).await
    }

    /// Insert under an id chosen by the caller, e.g. one already used as a
    /// storage key
    pub async fn create_with_id(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        item: &NewItem,
    ) -> Result<Item> {
        let row = ItemInsert {
            id,
            owner_id: ctx.owner_id,
            item,
        };

        let created = self
            .wardrobe
            .from(ITEMS, ctx)?
            .insert_returning::<_, Item>(&row)
            .await
            .map_err(db_error("failed to create item"))?;

        let created = single_row(created, "failed to create item")?;
        tracing::info!(item_id = %created.id, category = %created.category, "item created");
        Ok(created)
    }

    pub async fn update(&self, ctx: &AuthContext, id: Uuid, patch: &ItemPatch) -> Result<Item> {
        if patch.is_empty() {
            return self
                .get(ctx, id)
                .await?
                .ok_or_else(|| Error::validation(format!("item {} not found", id)));
        }

        let updated = self
            .wardrobe
            .from(ITEMS, ctx)?
            .eq("id", &id.to_string())
            .update_returning::<_, Item>(patch)
            .await
            .map_err(db_error("failed to update item"))?;

        let updated = updated
            .into_iter()
            .next()
            .ok_or_else(|| Error::validation(format!("item {} not found", id)))?;
        tracing::info!(item_id = %id, "item updated");
        Ok(updated)
    }

    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        self.wardrobe
            .from(ITEMS, ctx)?
            .eq("id", &id.to_string())
            .delete()
            .await
            .map_err(db_error("failed to delete item"))?;

        tracing::info!(item_id = %id, "item deleted");
        Ok(())
    }
}

fn single_row<T>(rows: Vec<T>, context: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::validation(format!("{}: no row returned", context)))
}
