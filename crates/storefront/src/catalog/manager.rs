//! Ownership of the current catalog snapshot.
//!
//! [`CacheManager`] replaces what would otherwise be process-global cache
//! state: it is constructed with its source, storage and clock, and every
//! piece of mutable state lives on the instance.
//!
//! # Mount flow
//!
//! 1. A valid cached snapshot is served as-is ([`MountOutcome::Cached`]);
//!    the reconciler's first tick then probes for drift.
//! 2. Otherwise the status goes to [`CatalogStatus::Loading`] and a build
//!    runs. An expired snapshot stays readable while it does.
//! 3. A failed build with nothing cached is a cold-start failure and the only
//!    error surfaced to the user.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use storeline_core::Item;

use super::builder::{DEFAULT_TRENDING_LIMIT, SnapshotBuilder, TrendingSource};
use super::filter::{FilterCriteria, SortKey, filter};
use super::snapshot::CatalogSnapshot;
use super::{CATALOG_CACHE_KEY, CatalogSource, ViewKey};
use crate::cache::{CacheEntry, CacheStore};
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::storage::Storage;

/// Default snapshot time-to-live.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(300);

/// Tunables for a [`CacheManager`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogOptions {
    /// How long a snapshot counts as fresh.
    pub ttl: Duration,
    /// Length of the `trending` view.
    pub trending_limit: usize,
    pub trending_source: TrendingSource,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CATALOG_TTL,
            trending_limit: DEFAULT_TRENDING_LIMIT,
            trending_source: TrendingSource::Client,
        }
    }
}

/// What the UI should show for the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    /// No snapshot to show yet.
    Loading,
    /// A snapshot is available.
    Ready,
    /// Cold start failed; the message is user-facing.
    Failed(String),
}

/// How [`CacheManager::mount`] produced the snapshot it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// A valid cached snapshot was served without fetching.
    Cached,
    /// A new snapshot was built and committed.
    Built,
    /// The build failed and an expired snapshot is being served.
    Stale,
}

/// Owns the current catalog snapshot and its durable copy.
pub struct CacheManager<S> {
    source: S,
    store: CacheStore<CatalogSnapshot>,
    builder: SnapshotBuilder,
    ttl: Duration,
    status: RwLock<CatalogStatus>,
    alive: AtomicBool,
    /// Set while a reconciliation runs; see `reconciler`.
    pub(super) reconciling: AtomicBool,
    next_version: AtomicU64,
    commit_lock: tokio::sync::Mutex<()>,
}

impl<S: CatalogSource> CacheManager<S> {
    /// Create a manager. Reads the durable snapshot (if any) right away so
    /// build versions keep increasing across restarts.
    #[must_use]
    pub fn new(
        source: S,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        options: CatalogOptions,
    ) -> Self {
        let store: CacheStore<CatalogSnapshot> = CacheStore::new(storage, clock);
        let last_version = store
            .get(CATALOG_CACHE_KEY)
            .map_or(0, |entry| entry.data.version());

        Self {
            source,
            store,
            builder: SnapshotBuilder::new(options.trending_source, options.trending_limit),
            ttl: options.ttl,
            status: RwLock::new(CatalogStatus::Loading),
            alive: AtomicBool::new(true),
            reconciling: AtomicBool::new(false),
            next_version: AtomicU64::new(last_version + 1),
            commit_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Serve the cached snapshot or build one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ColdStart`] when nothing is cached and the build
    /// fails, and [`SyncError::TornDown`] after [`teardown`](Self::teardown).
    #[tracing::instrument(skip(self))]
    pub async fn mount(&self) -> Result<MountOutcome> {
        let cached = self.current();

        if let Some(entry) = &cached
            && self.store.is_valid(entry)
        {
            tracing::info!(
                version = entry.data.version(),
                items = entry.data.item_count(),
                "Serving cached catalog snapshot"
            );
            self.set_status(CatalogStatus::Ready);
            return Ok(MountOutcome::Cached);
        }

        if cached.is_none() {
            self.set_status(CatalogStatus::Loading);
        }

        match self.rebuild().await {
            Ok(_) => Ok(MountOutcome::Built),
            Err(SyncError::Service(e)) if cached.is_some() => {
                tracing::warn!(error = %e, "Catalog build failed, serving expired snapshot");
                self.set_status(CatalogStatus::Ready);
                Ok(MountOutcome::Stale)
            }
            Err(SyncError::Service(e)) => {
                tracing::error!(error = %e, "Catalog build failed with nothing cached");
                let err = SyncError::ColdStart(e);
                self.set_status(CatalogStatus::Failed(err.to_string()));
                Err(err)
            }
            Err(e) => Err(e),
        }
    }

    /// Build a new snapshot and commit it.
    ///
    /// The commit is skipped when the manager was torn down while the build
    /// ran, or when a newer build already committed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if any fetch failed (the current
    /// snapshot is untouched) and [`SyncError::TornDown`] if the result was
    /// discarded.
    pub async fn rebuild(&self) -> Result<Arc<CacheEntry<CatalogSnapshot>>> {
        if !self.is_alive() {
            return Err(SyncError::TornDown);
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = self
            .builder
            .build(&self.source, self.store.now(), version)
            .await?;
        self.commit(snapshot).await
    }

    async fn commit(&self, snapshot: CatalogSnapshot) -> Result<Arc<CacheEntry<CatalogSnapshot>>> {
        let _guard = self.commit_lock.lock().await;

        if !self.is_alive() {
            tracing::debug!(
                version = snapshot.version(),
                "Discarding snapshot built after teardown"
            );
            return Err(SyncError::TornDown);
        }

        if let Some(current) = self.current()
            && current.data.version() >= snapshot.version()
        {
            tracing::debug!(
                built = snapshot.version(),
                current = current.data.version(),
                "Newer snapshot already committed"
            );
            return Ok(current);
        }

        tracing::info!(
            version = snapshot.version(),
            items = snapshot.item_count(),
            "Committed catalog snapshot"
        );
        let entry = self.store.put(CATALOG_CACHE_KEY, snapshot, self.ttl).await;
        self.set_status(CatalogStatus::Ready);
        Ok(entry)
    }

    /// The current snapshot entry, valid or expired.
    #[must_use]
    pub fn current(&self) -> Option<Arc<CacheEntry<CatalogSnapshot>>> {
        self.store.get(CATALOG_CACHE_KEY)
    }

    /// Whether the current snapshot is within its TTL.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.current()
            .is_some_and(|entry| self.store.is_valid(&entry))
    }

    /// Items of `key` in the current snapshot; empty before the first build.
    #[must_use]
    pub fn view(&self, key: ViewKey) -> Vec<Arc<Item>> {
        self.current()
            .map(|entry| entry.data.view(key).to_vec())
            .unwrap_or_default()
    }

    /// Run the filter engine over a cached view. Never touches the network.
    #[must_use]
    pub fn filter(&self, key: ViewKey, criteria: &FilterCriteria, sort: SortKey) -> Vec<Arc<Item>> {
        self.current()
            .map(|entry| filter(entry.data.view(key), criteria, sort))
            .unwrap_or_default()
    }

    /// Item count recorded in the current snapshot.
    #[must_use]
    pub fn item_count(&self) -> Option<u64> {
        self.current().map(|entry| entry.data.item_count())
    }

    #[must_use]
    pub fn status(&self) -> CatalogStatus {
        self.status.read().clone()
    }

    fn set_status(&self, status: CatalogStatus) {
        *self.status.write() = status;
    }

    /// Stop applying results. In-flight fetches run to completion but their
    /// snapshots are discarded.
    pub fn teardown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            tracing::info!("Catalog cache torn down");
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::catalog::ViewQuery;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use crate::testing::{FakeCatalog, item};

    struct Harness {
        clock: Arc<ManualClock>,
        storage: Arc<MemoryStorage>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH)),
                storage: Arc::new(MemoryStorage::new()),
            }
        }

        fn manager(&self, items: usize) -> CacheManager<FakeCatalog> {
            let items = (1..=i64::try_from(items).unwrap()).map(item).collect();
            CacheManager::new(
                FakeCatalog::new(items),
                self.storage.clone(),
                self.clock.clone(),
                CatalogOptions::default(),
            )
        }
    }

    #[tokio::test]
    async fn test_cold_start_builds_and_persists() {
        let harness = Harness::new();
        let manager = harness.manager(3);
        assert_eq!(manager.status(), CatalogStatus::Loading);

        assert_eq!(manager.mount().await.unwrap(), MountOutcome::Built);
        assert_eq!(manager.status(), CatalogStatus::Ready);
        assert_eq!(manager.item_count(), Some(3));
        assert_eq!(manager.view(ViewKey::All).len(), 3);
        assert!(harness.storage.read(CATALOG_CACHE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_valid_cache_is_served_without_fetching() {
        let harness = Harness::new();
        harness.manager(3).mount().await.unwrap();

        let reloaded = harness.manager(3);
        assert_eq!(reloaded.mount().await.unwrap(), MountOutcome::Cached);
        assert_eq!(reloaded.source().full_fetches(), 0);
        assert_eq!(reloaded.view(ViewKey::All).len(), 3);
    }

    #[tokio::test]
    async fn test_versions_continue_after_reload() {
        let harness = Harness::new();
        harness.manager(1).mount().await.unwrap();

        let reloaded = harness.manager(1);
        let entry = reloaded.rebuild().await.unwrap();
        assert_eq!(entry.data.version(), 2);
    }

    #[tokio::test]
    async fn test_expired_cache_is_rebuilt() {
        let harness = Harness::new();
        harness.manager(2).mount().await.unwrap();
        harness.clock.advance(TimeDelta::seconds(300));

        let reloaded = harness.manager(4);
        assert!(!reloaded.is_fresh());
        assert_eq!(reloaded.mount().await.unwrap(), MountOutcome::Built);
        assert_eq!(reloaded.item_count(), Some(4));
        assert!(reloaded.is_fresh());
    }

    #[tokio::test]
    async fn test_expired_cache_is_served_when_build_fails() {
        let harness = Harness::new();
        harness.manager(2).mount().await.unwrap();
        harness.clock.advance(TimeDelta::seconds(301));

        let reloaded = harness.manager(4);
        reloaded.source().fail_query(Some(ViewQuery::ALL));
        assert_eq!(reloaded.mount().await.unwrap(), MountOutcome::Stale);
        assert_eq!(reloaded.status(), CatalogStatus::Ready);
        assert_eq!(reloaded.item_count(), Some(2));
    }

    #[tokio::test]
    async fn test_cold_start_failure_is_surfaced() {
        let harness = Harness::new();
        let manager = harness.manager(2);
        manager.source().fail_query(ViewKey::Men.query());

        let err = manager.mount().await.unwrap_err();
        assert!(matches!(err, SyncError::ColdStart(_)));
        assert!(err.is_user_visible());
        assert!(matches!(manager.status(), CatalogStatus::Failed(_)));
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_malformed_durable_payload_is_a_miss() {
        let harness = Harness::new();
        harness
            .storage
            .write(CATALOG_CACHE_KEY, "{not json")
            .unwrap();

        let manager = harness.manager(2);
        assert_eq!(manager.mount().await.unwrap(), MountOutcome::Built);
        assert_eq!(manager.item_count(), Some(2));
    }

    #[tokio::test]
    async fn test_teardown_discards_in_flight_build() {
        let harness = Harness::new();
        let manager = Arc::new(harness.manager(2));
        manager.mount().await.unwrap();
        manager.source().set_items((1..=5).map(item).collect());
        manager.source().gate.close();

        let task = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.rebuild().await }
        });
        while manager.source().full_fetches() < 2 {
            tokio::task::yield_now().await;
        }

        manager.teardown();
        manager.source().gate.open();

        assert!(matches!(task.await.unwrap(), Err(SyncError::TornDown)));
        assert_eq!(manager.item_count(), Some(2));
    }

    #[tokio::test]
    async fn test_filter_reads_cached_view() {
        let harness = Harness::new();
        let manager = harness.manager(3);
        manager.mount().await.unwrap();

        let criteria = FilterCriteria {
            query: Some("item 2".to_string()),
            ..FilterCriteria::default()
        };
        let result = manager.filter(ViewKey::All, &criteria, SortKey::Featured);
        assert_eq!(result.len(), 1);
        assert_eq!(manager.source().full_fetches(), 1);
    }
}
