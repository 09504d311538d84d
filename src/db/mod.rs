//! Data access for the wardrobe tables
//!
//! Each store borrows the [`Wardrobe`](crate::Wardrobe) and issues requests
//! as the user in the given [`AuthContext`](crate::AuthContext). Store
//! failures come back as [`Error::Database`](crate::Error::Database) with a
//! short description of the attempted operation; a missing row on a
//! single-row lookup is `Ok(None)`.

mod items;
mod outfits;
mod plans;

pub use items::ItemStore;
pub use outfits::OutfitStore;
pub use plans::PlanStore;

pub(crate) const ITEMS: &str = "items";
pub(crate) const OUTFITS: &str = "outfits";
pub(crate) const OUTFIT_ITEMS: &str = "outfit_items";
pub(crate) const PLANS: &str = "plans";
