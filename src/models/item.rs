use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{null_as_empty, text_enum};

text_enum! {
    /// Kind of garment
    Category("category") {
        Top => "top",
        Bottom => "bottom",
        Outer => "outer",
        Shoes => "shoes",
        Socks => "socks",
        Accessory => "accessory",
    }
}

text_enum! {
    /// Position of a top or bottom in a layered outfit
    Layer("layer") {
        Base => "base",
        Mid => "mid",
        Outer => "outer",
    }
}

text_enum! {
    ItemStatus("status") {
        Clean => "clean",
        Laundry => "laundry",
        Repair => "repair",
    }
}

/// A row of the `items` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category: Category,
    #[serde(default)]
    pub layer: Option<Layer>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color_primary: Option<String>,
    #[serde(default)]
    pub color_secondary: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub status: ItemStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub care_tags: Vec<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub detail_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Care tags as the comma-joined text shown to users
    pub fn care_tags_text(&self) -> String {
        format_care_tags(&self.care_tags)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// Fields for a new item. The owner comes from the authenticated context.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewItem {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub status: ItemStatus,
    pub care_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_path: Option<String>,
}

impl NewItem {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            layer: None,
            subcategory: None,
            name: None,
            color_primary: None,
            color_secondary: None,
            size: None,
            status: ItemStatus::Clean,
            care_tags: Vec::new(),
            image_path: None,
            detail_path: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_care_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.care_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update. `Some(None)` clears a nullable column, `None` leaves it alone.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<Option<Layer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_primary: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_secondary: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub care_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_path: Option<Option<String>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == ItemPatch::default()
    }
}

/// Narrowing for the items list; empty fields do not filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub status: Option<ItemStatus>,
    pub subcategory: Option<String>,
    /// Matches items carrying at least one of these tags
    pub care_tags: Vec<String>,
}

/// Split user-entered care tags on commas, trimming blanks
pub fn parse_care_tags(text: &str) -> Vec<String> {
    text.split([',', '，'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn format_care_tags(tags: &[String]) -> String {
    tags.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_row_tolerates_nulls() {
        let item: Item = serde_json::from_value(json!({
            "id": "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11",
            "owner_id": "8d0fd2b3-9ca6-4a3b-9d8a-5a1b2c3d4e5f",
            "category": "top",
            "layer": null,
            "name": "Merino tee",
            "status": "laundry",
            "care_tags": null,
            "created_at": "2024-06-01T08:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(item.category, Category::Top);
        assert_eq!(item.layer, None);
        assert_eq!(item.status, ItemStatus::Laundry);
        assert!(item.care_tags.is_empty());
        assert_eq!(item.care_tags_text(), "");
    }

    #[test]
    fn care_tags_parse_and_format() {
        let tags = parse_care_tags(" cold wash, no tumble ,,hang dry，iron low ");
        assert_eq!(tags, vec!["cold wash", "no tumble", "hang dry", "iron low"]);
        assert_eq!(
            format_care_tags(&tags),
            "cold wash, no tumble, hang dry, iron low"
        );
        assert!(parse_care_tags(" , ").is_empty());
    }

    #[test]
    fn new_item_omits_unset_fields() {
        let item = NewItem::new(Category::Shoes)
            .with_name("Trail runners")
            .with_care_tags(["hand wash"]);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "category": "shoes",
                "name": "Trail runners",
                "status": "clean",
                "care_tags": ["hand wash"]
            })
        );
    }

    #[test]
    fn patch_distinguishes_clear_from_keep() {
        let patch = ItemPatch {
            layer: Some(None),
            size: Some(Some("L".to_string())),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "layer": null, "size": "L" })
        );
        assert!(ItemPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn enum_parsing() {
        assert_eq!("Outer".parse::<Category>().unwrap(), Category::Outer);
        assert_eq!(" mid ".parse::<Layer>().unwrap(), Layer::Mid);
        let err = "dirty".parse::<ItemStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown status \"dirty\", expected one of: clean, laundry, repair"
        );
    }
}
