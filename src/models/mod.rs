//! Rows of the wardrobe tables and the values written to them

mod item;
mod outfit;
mod plan;

pub use item::{
    format_care_tags, parse_care_tags, Category, Item, ItemFilter, ItemPatch, ItemStatus, Layer,
    NewItem,
};
pub use outfit::{NewOutfit, Outfit, OutfitItemRef, OutfitPatch, OutfitWithItems, Slot, SlottedItem};
pub use plan::{OutfitSummary, Plan, PlanUpsert};

use serde::{Deserialize, Deserializer};

/// Closed set of lowercase names stored as text columns
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident($label:literal) { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        crate::error::Error::validation(format!(
                            "unknown {} {:?}, expected one of: {}",
                            $label,
                            s,
                            allowed.join(", ")
                        ))
                    })
            }
        }
    };
}
pub(crate) use text_enum;

/// Treat an explicit `null` array column like an empty one
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
