//! Seller order queue cache.
//!
//! Same preload/serve pattern as the catalog, but without a timer: the cache
//! is refreshed only when asked, typically right after a status change.
//!
//! # Refresh collapsing
//!
//! Every [`OrdersCache::refresh`] call takes a ticket. A refresh covers every
//! ticket issued before its fetch started, so callers that queued up behind
//! it return without fetching. A ticket issued while a fetch is in flight is
//! not covered by it and causes exactly one more fetch, shared by everyone
//! who queued during the first. A write that lands mid-fetch is therefore
//! always followed by a fetch that sees it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use storeline_core::{Order, OrderId, OrderStats, OrderStatus, SellerId};

use crate::api::ServiceError;
use crate::cache::{CacheEntry, CacheStore};
use crate::catalog::MountOutcome;
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::storage::Storage;

/// Age after which a cached queue is reported as out of date. It never
/// triggers a fetch by itself.
pub const DEFAULT_ORDERS_TTL: Duration = Duration::from_secs(300);

/// Durable storage key of a seller's order queue.
#[must_use]
pub fn orders_cache_key(seller: SellerId) -> String {
    format!("orders-cache:{seller}")
}

/// Order queue tabs: everything, or one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    All,
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl FilterKey {
    pub const ALL: [Self; 6] = [
        Self::All,
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Status filter sent to the Order Service; `None` for `All`.
    #[must_use]
    pub const fn status(self) -> Option<OrderStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(OrderStatus::Pending),
            Self::Processing => Some(OrderStatus::Processing),
            Self::Shipped => Some(OrderStatus::Shipped),
            Self::Delivered => Some(OrderStatus::Delivered),
            Self::Cancelled => Some(OrderStatus::Cancelled),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self.status() {
            Some(status) => status.as_str(),
            None => "all",
        }
    }
}

impl From<OrderStatus> for FilterKey {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => Self::Pending,
            OrderStatus::Processing => Self::Processing,
            OrderStatus::Shipped => Self::Shipped,
            OrderStatus::Delivered => Self::Delivered,
            OrderStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl std::fmt::Display for FilterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FilterKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<OrderStatus>()
            .map(Self::from)
            .map_err(|_| format!("invalid order filter: {s}"))
    }
}

/// One page of orders as returned by the Order Service.
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// Seller-wide stats, when the service includes them.
    pub stats: Option<OrderStats>,
}

/// Access to the Order Service.
pub trait OrderSource: Send + Sync + 'static {
    /// List a seller's orders, optionally restricted to one status.
    fn list_orders(
        &self,
        seller: SellerId,
        status: Option<OrderStatus>,
    ) -> impl Future<Output = std::result::Result<OrderPage, ServiceError>> + Send;

    /// Move an order to `status`.
    fn update_status(
        &self,
        order: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send;
}

/// A seller's order queue, one list per [`FilterKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersSnapshot {
    by_filter: BTreeMap<FilterKey, Vec<Order>>,
    stats: OrderStats,
    taken_at: DateTime<Utc>,
}

impl OrdersSnapshot {
    #[must_use]
    pub fn view(&self, key: FilterKey) -> &[Order] {
        self.by_filter
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn stats(&self) -> &OrderStats {
        &self.stats
    }

    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

/// Cached order queue of one seller.
pub struct OrdersCache<S> {
    source: S,
    seller: SellerId,
    key: String,
    store: CacheStore<OrdersSnapshot>,
    ttl: Duration,
    requested: AtomicU64,
    completed: AtomicU64,
    refresh_lock: tokio::sync::Mutex<()>,
    alive: AtomicBool,
}

impl<S: OrderSource> OrdersCache<S> {
    #[must_use]
    pub fn new(
        source: S,
        seller: SellerId,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            seller,
            key: orders_cache_key(seller),
            store: CacheStore::new(storage, clock),
            ttl,
            requested: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            refresh_lock: tokio::sync::Mutex::new(()),
            alive: AtomicBool::new(true),
        }
    }

    /// Serve the cached queue, fetching only when nothing is cached.
    ///
    /// An old queue is still served as is; only [`refresh`](Self::refresh)
    /// replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ColdStart`] when nothing is cached and the fetch
    /// fails.
    #[tracing::instrument(skip(self), fields(seller = %self.seller))]
    pub async fn load(&self) -> Result<MountOutcome> {
        if self.current().is_some() {
            return Ok(MountOutcome::Cached);
        }

        match self.refresh().await {
            Ok(_) => Ok(MountOutcome::Built),
            Err(SyncError::Service(e)) => Err(SyncError::ColdStart(e)),
            Err(e) => Err(e),
        }
    }

    /// Whether the cached queue is younger than its time-to-live.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.current().is_some_and(|entry| self.store.is_valid(&entry))
    }

    /// Re-fetch every queue tab and commit the result.
    ///
    /// Concurrent calls collapse as described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if any fetch failed; the previous queue
    /// is kept.
    pub async fn refresh(&self) -> Result<Arc<CacheEntry<OrdersSnapshot>>> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let _lock = self.refresh_lock.lock().await;

        if self.completed.load(Ordering::SeqCst) >= ticket {
            tracing::debug!(ticket, "Refresh already covered by a completed fetch");
            return self.current().ok_or(SyncError::TornDown);
        }

        let covers = self.requested.load(Ordering::SeqCst);
        let snapshot = self.fetch().await?;

        if !self.alive.load(Ordering::SeqCst) {
            return Err(SyncError::TornDown);
        }
        let entry = self.store.put(&self.key, snapshot, self.ttl).await;
        self.completed.fetch_max(covers, Ordering::SeqCst);

        tracing::debug!(
            seller = %self.seller,
            orders = entry.data.stats().total,
            covers,
            "Order queue refreshed"
        );
        Ok(entry)
    }

    async fn fetch(&self) -> std::result::Result<OrdersSnapshot, ServiceError> {
        let pages = try_join_all(FilterKey::ALL.into_iter().map(|key| async move {
            let page = self.source.list_orders(self.seller, key.status()).await?;
            Ok::<_, ServiceError>((key, page))
        }))
        .await?;

        let mut stats = None;
        let mut by_filter = BTreeMap::new();
        for (key, page) in pages {
            if key == FilterKey::All {
                stats = Some(
                    page.stats
                        .unwrap_or_else(|| OrderStats::from_orders(&page.orders)),
                );
            }
            by_filter.insert(key, page.orders);
        }

        Ok(OrdersSnapshot {
            by_filter,
            stats: stats.unwrap_or_default(),
            taken_at: self.store.now(),
        })
    }

    /// Change an order's status, then refresh so it moves between tabs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the Order Service rejected the
    /// change. A failed follow-up refresh is logged, not returned.
    #[tracing::instrument(skip(self), fields(seller = %self.seller))]
    pub async fn update_status(&self, order: OrderId, status: OrderStatus) -> Result<()> {
        self.source.update_status(order, status).await?;
        tracing::info!(%order, status = status.as_str(), "Order status updated");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Refresh after status change failed");
        }
        Ok(())
    }

    /// The current queue snapshot, valid or expired.
    #[must_use]
    pub fn current(&self) -> Option<Arc<CacheEntry<OrdersSnapshot>>> {
        self.store.get(&self.key)
    }

    /// Orders in tab `key`; empty before the first fetch.
    #[must_use]
    pub fn view(&self, key: FilterKey) -> Vec<Order> {
        self.current()
            .map(|entry| entry.data.view(key).to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stats(&self) -> Option<OrderStats> {
        self.current().map(|entry| entry.data.stats().clone())
    }

    #[must_use]
    pub const fn seller(&self) -> SellerId {
        self.seller
    }

    /// Stop applying fetch results.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use crate::testing::{FakeOrders, order};

    fn cache_over(storage: &Arc<MemoryStorage>, orders: Vec<Order>) -> Arc<OrdersCache<FakeOrders>> {
        Arc::new(OrdersCache::new(
            FakeOrders::new(orders),
            SellerId::new(1),
            storage.clone(),
            Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH)),
            DEFAULT_ORDERS_TTL,
        ))
    }

    fn queue() -> Vec<Order> {
        vec![
            order(1, OrderStatus::Pending),
            order(2, OrderStatus::Pending),
            order(3, OrderStatus::Shipped),
        ]
    }

    fn ids(orders: &[Order]) -> Vec<i64> {
        orders.iter().map(|o| o.id.as_i64()).collect()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_load_partitions_by_status() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());

        assert_eq!(cache.load().await.unwrap(), MountOutcome::Built);
        assert_eq!(ids(&cache.view(FilterKey::All)), vec![1, 2, 3]);
        assert_eq!(ids(&cache.view(FilterKey::Pending)), vec![1, 2]);
        assert_eq!(ids(&cache.view(FilterKey::Shipped)), vec![3]);
        assert!(cache.view(FilterKey::Cancelled).is_empty());

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert!(storage.read("orders-cache:1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reload_serves_cached_queue() {
        let storage = Arc::new(MemoryStorage::new());
        cache_over(&storage, queue()).load().await.unwrap();

        let reloaded = cache_over(&storage, Vec::new());
        assert_eq!(reloaded.load().await.unwrap(), MountOutcome::Cached);
        assert_eq!(reloaded.source().full_fetches(), 0);
        assert_eq!(reloaded.view(FilterKey::All).len(), 3);
    }

    #[tokio::test]
    async fn test_old_queue_is_served_without_refetch() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let cache_at = |orders: Vec<Order>| {
            OrdersCache::new(
                FakeOrders::new(orders),
                SellerId::new(1),
                storage.clone(),
                clock.clone(),
                DEFAULT_ORDERS_TTL,
            )
        };
        cache_at(queue()).load().await.unwrap();
        clock.advance(chrono::TimeDelta::seconds(301));

        let reloaded = cache_at(Vec::new());
        assert_eq!(reloaded.load().await.unwrap(), MountOutcome::Cached);
        assert_eq!(reloaded.source().full_fetches(), 0);
        assert!(!reloaded.is_fresh());
        assert_eq!(reloaded.view(FilterKey::All).len(), 3);

        reloaded.refresh().await.unwrap();
        assert_eq!(reloaded.source().full_fetches(), 1);
        assert!(reloaded.view(FilterKey::All).is_empty());
        assert!(reloaded.is_fresh());
    }

    #[tokio::test]
    async fn test_cold_start_failure() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.source().fail(true);

        assert!(matches!(cache.load().await, Err(SyncError::ColdStart(_))));
    }

    #[tokio::test]
    async fn test_status_change_moves_order_between_views() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.load().await.unwrap();

        cache
            .update_status(OrderId::new(1), OrderStatus::Shipped)
            .await
            .unwrap();

        assert_eq!(ids(&cache.view(FilterKey::Pending)), vec![2]);
        assert_eq!(ids(&cache.view(FilterKey::Shipped)), vec![1, 3]);
        assert_eq!(cache.stats().unwrap().shipped, 2);
    }

    #[tokio::test]
    async fn test_rejected_status_change_is_an_error() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.load().await.unwrap();

        let result = cache.update_status(OrderId::new(42), OrderStatus::Shipped).await;
        assert!(matches!(result, Err(SyncError::Service(ServiceError::NotFound(_)))));
        assert_eq!(cache.source().full_fetches(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_collapse() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.source().gate.close();

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await.map(drop) }
        });
        while cache.source().full_fetches() < 1 {
            tokio::task::yield_now().await;
        }

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.refresh().await.map(drop) })
            })
            .collect();
        settle().await;

        cache.source().gate.open();
        first.await.unwrap().unwrap();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }

        // The in-flight fetch plus one shared follow-up
        assert_eq!(cache.source().full_fetches(), 2);
    }

    #[tokio::test]
    async fn test_mutation_during_refresh_triggers_one_more() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.source().gate.close();

        let stale = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await.map(drop) }
        });
        while cache.source().full_fetches() < 1 {
            tokio::task::yield_now().await;
        }

        let update = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.update_status(OrderId::new(2), OrderStatus::Cancelled).await }
        });
        while cache.source().status_updates() < 1 {
            tokio::task::yield_now().await;
        }
        settle().await;

        cache.source().gate.open();
        stale.await.unwrap().unwrap();
        update.await.unwrap().unwrap();

        assert_eq!(cache.source().full_fetches(), 2);
        assert_eq!(ids(&cache.view(FilterKey::Pending)), vec![1]);
        assert_eq!(ids(&cache.view(FilterKey::Cancelled)), vec![2]);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_queue() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = cache_over(&storage, queue());
        cache.load().await.unwrap();
        cache.source().fail(true);

        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.view(FilterKey::All).len(), 3);

        // A later refresh is not considered covered by the failed one
        cache.source().fail(false);
        cache.refresh().await.unwrap();
        assert_eq!(cache.source().full_fetches(), 3);
    }

    #[test]
    fn test_filter_key_parse() {
        assert_eq!("all".parse::<FilterKey>().unwrap(), FilterKey::All);
        assert_eq!("shipped".parse::<FilterKey>().unwrap(), FilterKey::Shipped);
        assert_eq!(FilterKey::Cancelled.as_str(), "cancelled");
        assert!("lost".parse::<FilterKey>().is_err());
    }
}
