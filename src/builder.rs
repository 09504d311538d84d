//! Outfit builder
//!
//! Each [`Slot`] admits a subset of the catalog. Single slots hold at most
//! one item, the accessory slot holds a set. Saving flattens the selection
//! into one association per `(item, slot)` pair, in slot order.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Category, Item, ItemStatus, Layer, OutfitItemRef, OutfitWithItems, Slot};

impl Slot {
    /// Category an item must have to go into this slot
    pub fn category(&self) -> Category {
        match self {
            Slot::Base | Slot::Mid => Category::Top,
            Slot::Outer => Category::Outer,
            Slot::Bottom | Slot::BottomBase => Category::Bottom,
            Slot::Shoes => Category::Shoes,
            Slot::Socks => Category::Socks,
            Slot::Accessory => Category::Accessory,
        }
    }

    fn layer(&self) -> Option<Layer> {
        match self {
            Slot::Base => Some(Layer::Base),
            Slot::Mid => Some(Layer::Mid),
            Slot::Outer => Some(Layer::Outer),
            _ => None,
        }
    }

    pub fn accepts(&self, item: &Item) -> bool {
        if item.category != self.category() {
            return false;
        }
        match self {
            Slot::Base | Slot::Mid | Slot::Outer => {
                item.layer == self.layer()
                    || matches!(item.category, Category::Top | Category::Outer)
            }
            Slot::BottomBase => matches!(item.layer, None | Some(Layer::Base)),
            _ => true,
        }
    }

    /// The items of `items` this slot accepts, in their original order
    pub fn eligible<'i>(&self, items: &'i [Item]) -> Vec<&'i Item> {
        items.iter().filter(|item| self.accepts(item)).collect()
    }
}

/// Slot selections of an outfit being composed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutfitBuilder {
    singles: BTreeMap<Slot, Item>,
    accessories: Vec<Item>,
}

impl OutfitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing outfit's resolved items
    pub fn from_outfit(outfit: &OutfitWithItems) -> Self {
        let mut builder = Self::new();
        for slotted in &outfit.items {
            if slotted.slot.is_multi() {
                if !builder.contains_accessory(slotted.item.id) {
                    builder.accessories.push(slotted.item.clone());
                }
            } else {
                builder.singles.insert(slotted.slot, slotted.item.clone());
            }
        }
        builder
    }

    /// Put `item` into `slot`. Single slots replace their current item; the
    /// accessory slot adds it unless already present.
    pub fn select(&mut self, slot: Slot, item: Item) -> Result<()> {
        self.check(slot, &item)?;
        if slot.is_multi() {
            if !self.contains_accessory(item.id) {
                self.accessories.push(item);
            }
        } else {
            self.singles.insert(slot, item);
        }
        Ok(())
    }

    /// Add an accessory, or remove it if already selected. Returns whether
    /// the item is selected afterwards.
    pub fn toggle_accessory(&mut self, item: Item) -> Result<bool> {
        if let Some(pos) = self.accessories.iter().position(|a| a.id == item.id) {
            self.accessories.remove(pos);
            return Ok(false);
        }
        self.check(Slot::Accessory, &item)?;
        self.accessories.push(item);
        Ok(true)
    }

    /// Empty a slot
    pub fn deselect(&mut self, slot: Slot) {
        if slot.is_multi() {
            self.accessories.clear();
        } else {
            self.singles.remove(&slot);
        }
    }

    pub fn clear(&mut self) {
        self.singles.clear();
        self.accessories.clear();
    }

    pub fn selected(&self, slot: Slot) -> Vec<&Item> {
        if slot.is_multi() {
            self.accessories.iter().collect()
        } else {
            self.singles.get(&slot).into_iter().collect()
        }
    }

    pub fn len(&self) -> usize {
        self.singles.len() + self.accessories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any selected item is waiting for the wash
    pub fn has_laundry_items(&self) -> bool {
        self.items().any(|item| item.status == ItemStatus::Laundry)
    }

    /// One association per selected item, slot order, accessories expanded
    pub fn associations(&self) -> Result<Vec<OutfitItemRef>> {
        if self.is_empty() {
            return Err(Error::validation("select at least one item"));
        }

        let mut refs: Vec<OutfitItemRef> = self
            .singles
            .iter()
            .map(|(slot, item)| OutfitItemRef {
                item_id: item.id,
                slot: *slot,
            })
            .collect();
        refs.extend(self.accessories.iter().map(|item| OutfitItemRef {
            item_id: item.id,
            slot: Slot::Accessory,
        }));
        Ok(refs)
    }

    fn items(&self) -> impl Iterator<Item = &Item> {
        self.singles.values().chain(self.accessories.iter())
    }

    fn contains_accessory(&self, id: Uuid) -> bool {
        self.accessories.iter().any(|a| a.id == id)
    }

    fn check(&self, slot: Slot, item: &Item) -> Result<()> {
        if slot.accepts(item) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "{} ({}) cannot go into the {} slot",
                item.display_name(),
                item.category,
                slot
            )))
        }
    }
}
