//! Cached, multi-view catalog snapshot.
//!
//! # Architecture
//!
//! - [`builder`] fetches every view concurrently and assembles one
//!   [`CatalogSnapshot`]; any failed fetch fails the whole build
//! - [`ranking`] computes the trending score used for the `trending` view
//! - [`manager`] owns the current snapshot, its durable copy and the mount
//!   flow (serve cached, or build with a loading state)
//! - [`reconciler`] probes the item count on a timer and rebuilds on drift
//! - [`filter`] runs user predicates against a cached view, never the network
//!
//! Readers always get an `Arc` of a complete snapshot; a rebuild swaps the
//! whole snapshot at once.

pub mod builder;
pub mod filter;
pub mod manager;
pub mod ranking;
pub mod reconciler;
mod snapshot;

use std::future::Future;

use serde::{Deserialize, Serialize};
use storeline_core::{Category, Item};

use crate::api::ServiceError;

pub use builder::{SnapshotBuilder, TrendingSource};
pub use filter::{FilterCriteria, SortKey, filter};
pub use manager::{CacheManager, CatalogOptions, CatalogStatus, MountOutcome};
pub use ranking::{RankedItem, TrendingWeights, rank, score};
pub use reconciler::{ReconcilerHandle, ReconcilerState, TickOutcome, spawn_reconciler};
pub use snapshot::CatalogSnapshot;

/// Durable storage key of the catalog snapshot.
pub const CATALOG_CACHE_KEY: &str = "catalog-cache";

/// The fixed set of catalog views held in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKey {
    All,
    Men,
    Women,
    Unisex,
    OnSale,
    NewArrivals,
    Trending,
}

impl ViewKey {
    /// Every view, `All` first.
    pub const ALL: [Self; 7] = [
        Self::All,
        Self::Men,
        Self::Women,
        Self::Unisex,
        Self::OnSale,
        Self::NewArrivals,
        Self::Trending,
    ];

    /// Views fetched with their own filtered query (everything except `All`
    /// and the derived `Trending`).
    pub const FILTERED: [Self; 5] = [
        Self::Men,
        Self::Women,
        Self::Unisex,
        Self::OnSale,
        Self::NewArrivals,
    ];

    /// Catalog query for this view, or `None` for the ranked `Trending` view.
    #[must_use]
    pub const fn query(self) -> Option<ViewQuery> {
        let query = match self {
            Self::All => ViewQuery::ALL,
            Self::Men => ViewQuery::category(Category::Men),
            Self::Women => ViewQuery::category(Category::Women),
            Self::Unisex => ViewQuery::category(Category::Unisex),
            Self::OnSale => ViewQuery {
                on_sale: true,
                ..ViewQuery::ALL
            },
            Self::NewArrivals => ViewQuery {
                new_arrivals: true,
                ..ViewQuery::ALL
            },
            Self::Trending => return None,
        };
        Some(query)
    }

    /// Name used on the command line and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
            Self::OnSale => "on-sale",
            Self::NewArrivals => "new-arrivals",
            Self::Trending => "trending",
        }
    }
}

impl std::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViewKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "men" => Ok(Self::Men),
            "women" => Ok(Self::Women),
            "unisex" => Ok(Self::Unisex),
            "on-sale" | "onsale" | "sale" => Ok(Self::OnSale),
            "new-arrivals" | "newarrivals" | "new" => Ok(Self::NewArrivals),
            "trending" => Ok(Self::Trending),
            _ => Err(format!("invalid view: {s}")),
        }
    }
}

/// Filters sent to the Catalog Service's list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewQuery {
    pub category: Option<Category>,
    pub on_sale: bool,
    pub new_arrivals: bool,
}

impl ViewQuery {
    /// The unfiltered catalog.
    pub const ALL: Self = Self {
        category: None,
        on_sale: false,
        new_arrivals: false,
    };

    const fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::ALL
        }
    }

    /// Whether `item` belongs in this view.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.category.is_none_or(|c| item.category == c)
            && (!self.on_sale || item.on_sale)
            && (!self.new_arrivals || item.is_new_arrival)
    }
}

/// Read access to the Catalog Service.
pub trait CatalogSource: Send + Sync + 'static {
    /// List products matching `query`, in service order.
    fn list_products(
        &self,
        query: ViewQuery,
    ) -> impl Future<Output = Result<Vec<Item>, ServiceError>> + Send;

    /// Server-ranked trending products, best first.
    fn trending(&self, limit: usize) -> impl Future<Output = Result<Vec<Item>, ServiceError>> + Send;

    /// Total number of catalog items. Used as the sentinel probe.
    fn item_count(&self) -> impl Future<Output = Result<u64, ServiceError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_view_key_parse_round_trip() {
        for key in ViewKey::ALL {
            assert_eq!(key.as_str().parse::<ViewKey>().unwrap(), key);
        }
        assert!("kids".parse::<ViewKey>().is_err());
    }

    #[test]
    fn test_trending_has_no_query() {
        assert!(ViewKey::Trending.query().is_none());
        assert_eq!(ViewKey::All.query(), Some(ViewQuery::ALL));
        assert_eq!(
            ViewKey::OnSale.query().map(|q| q.on_sale),
            Some(true)
        );
    }

    #[test]
    fn test_view_key_serializes_camel_case() {
        let json = serde_json::to_string(&ViewKey::NewArrivals).unwrap();
        assert_eq!(json, "\"newArrivals\"");
    }
}
