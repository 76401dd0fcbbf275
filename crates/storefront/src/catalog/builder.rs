//! Concurrent fan-out build of a [`CatalogSnapshot`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use storeline_core::{Item, ItemId};

use super::ranking::rank;
use super::snapshot::CatalogSnapshot;
use super::{CatalogSource, ViewKey, ViewQuery};
use crate::api::ServiceError;

/// Default length of the `trending` view.
pub const DEFAULT_TRENDING_LIMIT: usize = 50;

/// Where the `trending` view comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingSource {
    /// Rank the `all` view locally.
    #[default]
    Client,
    /// Use the Catalog Service's trending endpoint.
    Server,
}

impl TrendingSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl std::str::FromStr for TrendingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            _ => Err(format!("invalid trending source: {s}")),
        }
    }
}

/// Fetches every view and assembles a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuilder {
    trending_source: TrendingSource,
    trending_limit: usize,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(TrendingSource::Client, DEFAULT_TRENDING_LIMIT)
    }
}

impl SnapshotBuilder {
    #[must_use]
    pub const fn new(trending_source: TrendingSource, trending_limit: usize) -> Self {
        Self {
            trending_source,
            trending_limit,
        }
    }

    /// Fetch `all`, every filtered view and (in server mode) the trending
    /// list concurrently, then assemble them into snapshot `version`.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error. Nothing is assembled unless every fetch
    /// succeeded.
    #[tracing::instrument(skip(self, source), fields(trending = self.trending_source.as_str()))]
    pub async fn build<S: CatalogSource>(
        &self,
        source: &S,
        now: DateTime<Utc>,
        version: u64,
    ) -> Result<CatalogSnapshot, ServiceError> {
        let all = source.list_products(ViewQuery::ALL);
        let filtered = try_join_all(ViewKey::FILTERED.into_iter().map(|key| async move {
            let items = source
                .list_products(key.query().unwrap_or_default())
                .await?;
            Ok::<_, ServiceError>((key, items))
        }));
        let trending = async {
            match self.trending_source {
                TrendingSource::Client => Ok(None),
                TrendingSource::Server => source.trending(self.trending_limit).await.map(Some),
            }
        };

        let (all, filtered, server_trending) = tokio::try_join!(all, filtered, trending)?;
        let snapshot = self.assemble(all, filtered, server_trending, now, version);

        tracing::debug!(
            items = snapshot.item_count(),
            trending = snapshot.view(ViewKey::Trending).len(),
            "Assembled catalog snapshot"
        );
        Ok(snapshot)
    }

    fn assemble(
        &self,
        all: Vec<Item>,
        filtered: Vec<(ViewKey, Vec<Item>)>,
        server_trending: Option<Vec<Item>>,
        now: DateTime<Utc>,
        version: u64,
    ) -> CatalogSnapshot {
        let all: Vec<Arc<Item>> = all.into_iter().map(Arc::new).collect();
        let mut index: HashMap<ItemId, Arc<Item>> = HashMap::with_capacity(all.len());
        for item in &all {
            index.entry(item.id).or_insert_with(|| Arc::clone(item));
        }

        let mut views: BTreeMap<ViewKey, Vec<Arc<Item>>> = filtered
            .into_iter()
            .map(|(key, items)| (key, resolve(&index, key, &items)))
            .collect();

        let trending = match server_trending {
            Some(items) => {
                let mut trending = resolve(&index, ViewKey::Trending, &items);
                trending.truncate(self.trending_limit);
                trending
            }
            None => rank(&all, now)
                .into_iter()
                .take(self.trending_limit)
                .map(|ranked| ranked.item)
                .collect(),
        };
        views.insert(ViewKey::Trending, trending);

        let item_count = all.len() as u64;
        views.insert(ViewKey::All, all);

        CatalogSnapshot {
            views,
            item_count,
            taken_at: now,
            version,
        }
    }
}

/// Map a fetched view onto the `all` allocations, dropping items that the
/// `all` fetch did not return.
fn resolve(index: &HashMap<ItemId, Arc<Item>>, key: ViewKey, items: &[Item]) -> Vec<Arc<Item>> {
    let resolved: Vec<Arc<Item>> = items
        .iter()
        .filter_map(|item| index.get(&item.id).cloned())
        .collect();

    if resolved.len() != items.len() {
        tracing::warn!(
            view = %key,
            dropped = items.len() - resolved.len(),
            "Dropped items missing from the all view"
        );
    }
    resolved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storeline_core::Category;

    use super::*;
    use crate::testing::{FakeCatalog, item};

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn catalog() -> FakeCatalog {
        let items = (1..=6)
            .map(|id| {
                let mut item = item(id);
                item.category = if id % 2 == 0 { Category::Men } else { Category::Women };
                item.on_sale = id == 3;
                item.sales_count = u64::try_from(id).unwrap();
                item
            })
            .collect();
        FakeCatalog::new(items)
    }

    fn ids(items: &[Arc<Item>]) -> Vec<i64> {
        items.iter().map(|i| i.id.as_i64()).collect()
    }

    #[tokio::test]
    async fn test_build_fills_every_view() {
        let source = catalog();
        let snapshot = SnapshotBuilder::default()
            .build(&source, now(), 1)
            .await
            .unwrap();

        assert_eq!(snapshot.item_count(), 6);
        assert_eq!(snapshot.version(), 1);
        assert_eq!(ids(snapshot.view(ViewKey::Men)), vec![2, 4, 6]);
        assert_eq!(ids(snapshot.view(ViewKey::Women)), vec![1, 3, 5]);
        assert_eq!(ids(snapshot.view(ViewKey::OnSale)), vec![3]);
        assert!(snapshot.view(ViewKey::Unisex).is_empty());
        assert_eq!(ids(snapshot.view(ViewKey::Trending)), vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(source.full_fetches(), 1);
        assert_eq!(source.trending_calls(), 0);
    }

    #[tokio::test]
    async fn test_views_share_all_allocations() {
        let source = catalog();
        let snapshot = SnapshotBuilder::default()
            .build(&source, now(), 1)
            .await
            .unwrap();

        let all = snapshot.view(ViewKey::All);
        for key in ViewKey::ALL {
            for item in snapshot.view(key) {
                assert!(all.iter().any(|a| Arc::ptr_eq(a, item)), "{key} not shared");
            }
        }
    }

    #[tokio::test]
    async fn test_any_failed_view_fails_the_build() {
        let source = catalog();
        source.fail_query(ViewKey::OnSale.query());

        let result = SnapshotBuilder::default().build(&source, now(), 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_client_trending_is_truncated() {
        let source = catalog();
        let snapshot = SnapshotBuilder::new(TrendingSource::Client, 2)
            .build(&source, now(), 1)
            .await
            .unwrap();

        assert_eq!(ids(snapshot.view(ViewKey::Trending)), vec![6, 5]);
        assert_eq!(snapshot.view(ViewKey::All).len(), 6);
    }

    #[tokio::test]
    async fn test_server_trending_resolves_against_all() {
        let source = catalog();
        // Item 99 is not part of the all view and must be dropped
        source.set_server_trending(vec![item(4), item(99), item(1)]);

        let snapshot = SnapshotBuilder::new(TrendingSource::Server, 10)
            .build(&source, now(), 1)
            .await
            .unwrap();

        assert_eq!(source.trending_calls(), 1);
        assert_eq!(ids(snapshot.view(ViewKey::Trending)), vec![4, 1]);
    }

    #[test]
    fn test_trending_source_parse() {
        assert_eq!("Server".parse::<TrendingSource>().unwrap(), TrendingSource::Server);
        assert_eq!(TrendingSource::default(), TrendingSource::Client);
        assert!("both".parse::<TrendingSource>().is_err());
    }
}
