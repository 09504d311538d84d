use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;
use wardrobe_postgrest::SortOrder;

use super::{OUTFITS, OUTFIT_ITEMS};
use crate::error::{db_error, Error, Result};
use crate::models::{NewOutfit, Outfit, OutfitItemRef, OutfitPatch, OutfitWithItems, SlottedItem};
use crate::session::AuthContext;
use crate::Wardrobe;

const CREATE_OUTFIT_WITH_ITEMS: &str = "create_outfit_with_items";
const REPLACE_OUTFIT_ITEMS: &str = "replace_outfit_items";

/// The `outfits` table and its `outfit_items` associations
pub struct OutfitStore<'a> {
    wardrobe: &'a Wardrobe,
}

impl<'a> OutfitStore<'a> {
    pub(crate) fn new(wardrobe: &'a Wardrobe) -> Self {
        Self { wardrobe }
    }

    /// The owner's outfits, newest first
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Outfit>> {
        self.wardrobe
            .from(OUTFITS, ctx)?
            .select("*")
            .eq("owner_id", &ctx.owner_id.to_string())
            .order("created_at", SortOrder::Descending)
            .execute::<Outfit>()
            .await
            .map_err(db_error("failed to list outfits"))
    }

    /// Outfit plus its items. Associations whose item has since been
    /// deleted are dropped.
    pub async fn get_with_items(
        &self,
        ctx: &AuthContext,
        id: Uuid,
    ) -> Result<Option<OutfitWithItems>> {
        let outfit = self
            .wardrobe
            .from(OUTFITS, ctx)?
            .select("*")
            .eq("id", &id.to_string())
            .execute_single::<Outfit>()
            .await
            .map_err(db_error("failed to load outfit"))?;
        let Some(outfit) = outfit else {
            return Ok(None);
        };

        let associations = self.associations(ctx, id).await?;

        let mut item_ids: Vec<Uuid> = associations.iter().map(|a| a.item_id).collect();
        item_ids.sort();
        item_ids.dedup();
        let items: HashMap<Uuid, _> = self
            .wardrobe
            .items()
            .get_many(ctx, &item_ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let items = associations
            .into_iter()
            .filter_map(|assoc| match items.get(&assoc.item_id) {
                Some(item) => Some(SlottedItem {
                    slot: assoc.slot,
                    item: item.clone(),
                }),
                None => {
                    tracing::debug!(outfit_id = %id, item_id = %assoc.item_id, "dropping dangling outfit item");
                    None
                }
            })
            .collect();

        Ok(Some(OutfitWithItems { outfit, items }))
    }

    pub async fn associations(&self, ctx: &AuthContext, id: Uuid) -> Result<Vec<OutfitItemRef>> {
        self.wardrobe
            .from(OUTFIT_ITEMS, ctx)?
            .select("slot,item_id")
            .eq("outfit_id", &id.to_string())
            .execute::<OutfitItemRef>()
            .await
            .map_err(db_error("failed to load outfit items"))
    }

    /// Create the outfit and all of its associations in one transaction
    pub async fn create(
        &self,
        ctx: &AuthContext,
        outfit: &NewOutfit,
        items: &[OutfitItemRef],
    ) -> Result<Outfit> {
        let params = json!({
            "p_name": outfit.name,
            "p_notes": outfit.notes,
            "p_cover_image_path": outfit.cover_image_path,
            "p_items": items,
        });

        let created = self
            .wardrobe
            .rpc(CREATE_OUTFIT_WITH_ITEMS, params, ctx)?
            .call_rpc::<Outfit>()
            .await
            .map_err(db_error("failed to create outfit"))?;

        tracing::info!(outfit_id = %created.id, items = items.len(), "outfit created");
        Ok(created)
    }

    /// Patch the outfit row and/or replace its whole association set
    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        patch: Option<&OutfitPatch>,
        items: Option<&[OutfitItemRef]>,
    ) -> Result<()> {
        if let Some(patch) = patch.filter(|p| !p.is_empty()) {
            let updated = self
                .wardrobe
                .from(OUTFITS, ctx)?
                .eq("id", &id.to_string())
                .update_returning::<_, Outfit>(patch)
                .await
                .map_err(db_error("failed to update outfit"))?;
            if updated.is_empty() {
                return Err(Error::validation(format!("outfit {} not found", id)));
            }
        }

        if let Some(items) = items {
            let params = json!({
                "p_outfit_id": id,
                "p_items": items,
            });
            self.wardrobe
                .rpc(REPLACE_OUTFIT_ITEMS, params, ctx)?
                .call_rpc::<()>()
                .await
                .map_err(db_error("failed to update outfit items"))?;
        }

        tracing::info!(outfit_id = %id, "outfit updated");
        Ok(())
    }

    /// Remove the associations, then the outfit row
    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        self.wardrobe
            .from(OUTFIT_ITEMS, ctx)?
            .eq("outfit_id", &id.to_string())
            .delete()
            .await
            .map_err(db_error("failed to delete outfit items"))?;

        self.wardrobe
            .from(OUTFITS, ctx)?
            .eq("id", &id.to_string())
            .delete()
            .await
            .map_err(db_error("failed to delete outfit"))?;

        tracing::info!(outfit_id = %id, "outfit deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use crate::test_support::{ctx, item_json, wardrobe, OWNER};
    use serde_json::Value;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const OUTFIT: &str = "5b2d6f3e-0c55-4f0e-9a1d-3f2b8c7d6e5a";
    const TEE: &str = "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11";
    const GONE: &str = "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d";

    fn outfit_json() -> Value {
        json!({ "id": OUTFIT, "owner_id": OWNER, "name": "Office", "notes": null })
    }

    #[tokio::test]
    async fn detail_drops_dangling_associations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/outfits"))
            .and(query_param("id", format!("eq.{}", OUTFIT).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(outfit_json()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/outfit_items"))
            .and(query_param("select", "slot,item_id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "slot": "base", "item_id": TEE },
                { "slot": "shoes", "item_id": GONE }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([item_json(TEE, "top", "Tee")])),
            )
            .mount(&server)
            .await;

        let detail = wardrobe(&server)
            .outfits()
            .get_with_items(&ctx(), Uuid::parse_str(OUTFIT).unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(detail.outfit.display_name(), "Office");
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].slot, Slot::Base);
        assert_eq!(detail.items_in(Slot::Shoes).count(), 0);
    }

    #[tokio::test]
    async fn create_sends_every_association_in_one_call() {
        let server = MockServer::start().await;
        let hat = Uuid::new_v4();
        let scarf = Uuid::new_v4();
        let tee = Uuid::parse_str(TEE).unwrap();
        let items = vec![
            OutfitItemRef { item_id: tee, slot: Slot::Base },
            OutfitItemRef { item_id: hat, slot: Slot::Accessory },
            OutfitItemRef { item_id: scarf, slot: Slot::Accessory },
        ];

        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_outfit_with_items"))
            .and(body_json(json!({
                "p_name": "Office",
                "p_notes": null,
                "p_cover_image_path": null,
                "p_items": [
                    { "item_id": TEE, "slot": "base" },
                    { "item_id": hat, "slot": "accessory" },
                    { "item_id": scarf, "slot": "accessory" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(outfit_json()))
            .expect(1)
            .mount(&server)
            .await;

        let outfit = NewOutfit {
            name: Some("Office".to_string()),
            ..Default::default()
        };
        let created = wardrobe(&server)
            .outfits()
            .create(&ctx(), &outfit, &items)
            .await
            .unwrap();
        assert_eq!(created.id.to_string(), OUTFIT);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_outfit_behind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_outfit_with_items"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "22P02",
                "message": "invalid input syntax for type uuid: \"nope\"",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/outfits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        // Any direct write to the tables would bypass the transaction
        Mock::given(method("POST"))
            .and(path("/rest/v1/outfits"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let wardrobe = wardrobe(&server);
        let items = [OutfitItemRef { item_id: Uuid::new_v4(), slot: Slot::Shoes }];
        let err = wardrobe
            .outfits()
            .create(&ctx(), &NewOutfit::default(), &items)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to create outfit"));

        assert!(wardrobe.outfits().list(&ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_association_set() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/outfits"))
            .and(body_json(json!({ "notes": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([outfit_json()])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/replace_outfit_items"))
            .and(body_json(json!({
                "p_outfit_id": OUTFIT,
                "p_items": [{ "item_id": TEE, "slot": "mid" }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let patch = OutfitPatch {
            notes: Some(None),
            ..Default::default()
        };
        let items = [OutfitItemRef {
            item_id: Uuid::parse_str(TEE).unwrap(),
            slot: Slot::Mid,
        }];
        wardrobe(&server)
            .outfits()
            .update(&ctx(), Uuid::parse_str(OUTFIT).unwrap(), Some(&patch), Some(&items))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_removes_associations_first() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/outfit_items"))
            .and(query_param("outfit_id", format!("eq.{}", OUTFIT).as_str()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/outfits"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let wardrobe = wardrobe(&server);
        wardrobe
            .outfits()
            .delete(&ctx(), Uuid::parse_str(OUTFIT).unwrap())
            .await
            .unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let order: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
        assert_eq!(order, vec!["/rest/v1/outfit_items", "/rest/v1/outfits"]);
    }
}
