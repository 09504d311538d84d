use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{text_enum, Item};

text_enum! {
    /// Fixed position an outfit assigns items to, in display order
    Slot("slot") {
        Base => "base",
        Mid => "mid",
        Outer => "outer",
        Bottom => "bottom",
        BottomBase => "bottom_base",
        Shoes => "shoes",
        Socks => "socks",
        Accessory => "accessory",
    }
}

impl Slot {
    /// Only the accessory slot holds more than one item
    pub fn is_multi(&self) -> bool {
        matches!(self, Slot::Accessory)
    }
}

/// A row of the `outfits` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outfit {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cover_image_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Outfit {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed outfit)")
    }
}

/// One `(item, slot)` association
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OutfitItemRef {
    pub item_id: Uuid,
    pub slot: Slot,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NewOutfit {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub cover_image_path: Option<String>,
}

/// Partial update of the outfit row; `Some(None)` clears a column
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OutfitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_path: Option<Option<String>>,
}

impl OutfitPatch {
    pub fn is_empty(&self) -> bool {
        *self == OutfitPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlottedItem {
    pub slot: Slot,
    pub item: Item,
}

/// An outfit joined with the items it still resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct OutfitWithItems {
    pub outfit: Outfit,
    pub items: Vec<SlottedItem>,
}

impl OutfitWithItems {
    pub fn items_in(&self, slot: Slot) -> impl Iterator<Item = &Item> {
        self.items
            .iter()
            .filter(move |slotted| slotted.slot == slot)
            .map(|slotted| &slotted.item)
    }
}
