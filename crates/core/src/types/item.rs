//! Catalog items.
//!
//! An [`Item`] is the client's read-only projection of a product owned by the
//! Catalog Service. The cache may hold a stale copy; nothing here writes back.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ItemId, SellerId};

/// Lowest valid star rating.
pub const RATING_MIN: u8 = 1;
/// Highest valid star rating.
pub const RATING_MAX: u8 = 5;

/// Department an item is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Men,
    Women,
    Unisex,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Wire name used in catalog queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
            Self::Other => "other",
        }
    }

    /// Parse a wire category, falling back to [`Category::Other`].
    #[must_use]
    pub fn from_wire(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "men" | "mens" => Self::Men,
            "women" | "womens" => Self::Women,
            "unisex" => Self::Unisex,
            _ => Self::Other,
        }
    }
}

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    /// Current selling price.
    pub price: Decimal,
    /// Original price when the item is discounted.
    pub compare_at_price: Option<Decimal>,
    pub category: Category,
    /// Garment type, e.g. "dress" or "jacket".
    pub clothing_type: Option<String>,
    /// Occasions the item is tagged for, e.g. "casual", "formal".
    pub occasions: BTreeSet<String>,
    pub sizes: BTreeSet<String>,
    pub colors: BTreeSet<String>,
    pub is_new_arrival: bool,
    pub on_sale: bool,
    pub created_at: DateTime<Utc>,
    pub view_count: u64,
    pub sales_count: u64,
    /// Individual star ratings, each within `RATING_MIN..=RATING_MAX`.
    pub ratings: Vec<u8>,
    pub seller_id: SellerId,
}

impl Item {
    /// Arithmetic mean of the item's ratings, or `0.0` when it has none.
    ///
    /// Display code may prefer a friendlier default for unrated items; ranking
    /// must not.
    #[must_use]
    pub fn average_rating(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let sum: u32 = self.ratings.iter().map(|&r| u32::from(r)).sum();
        #[allow(clippy::cast_precision_loss)] // rating lists never approach 2^52 entries
        let count = self.ratings.len() as f64;
        f64::from(sum) / count
    }
}
