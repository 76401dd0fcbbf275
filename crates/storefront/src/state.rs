//! Shared client state.

use std::sync::Arc;

use storeline_core::SellerId;

use crate::api::{ApiClient, CatalogClient, NotificationClient, OrderClient};
use crate::catalog::CacheManager;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::notifications::NotificationPoller;
use crate::orders::{DEFAULT_ORDERS_TTL, OrdersCache};
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Everything the caches need, built once per process.
///
/// This struct is cheaply cloneable via `Arc`. Each cache constructor
/// returns a fresh, independent instance; callers decide how to share it.
#[derive(Clone)]
pub struct ClientState {
    inner: Arc<ClientStateInner>,
}

struct ClientStateInner {
    config: SyncConfig,
    api: ApiClient,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl ClientState {
    /// Create state backed by per-origin file storage and the system clock.
    ///
    /// Falls back to in-memory storage (with a warning) when the cache
    /// directory cannot be created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`](crate::error::SyncError::Service) if the HTTP client cannot be built.
    pub fn new(config: SyncConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> =
            match FileStorage::for_origin(&config.cache_dir, &config.api.base_url) {
                Ok(storage) => {
                    tracing::debug!(dir = %storage.dir().display(), "Using durable cache directory");
                    Arc::new(storage)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cache directory unavailable, caching in memory only");
                    Arc::new(MemoryStorage::new())
                }
            };
        Self::with_storage(config, storage, Arc::new(SystemClock))
    }

    /// Create state over explicit storage and clock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`](crate::error::SyncError::Service) if the HTTP client cannot be built.
    pub fn with_storage(
        config: SyncConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;
        Ok(Self {
            inner: Arc::new(ClientStateInner {
                config,
                api,
                storage,
                clock,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.inner.storage)
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// A catalog cache manager over the Catalog Service.
    #[must_use]
    pub fn catalog(&self) -> CacheManager<CatalogClient> {
        CacheManager::new(
            CatalogClient::new(self.api().clone()),
            self.storage(),
            self.clock(),
            self.config().catalog_options(),
        )
    }

    /// The order queue cache of `seller`.
    #[must_use]
    pub fn orders(&self, seller: SellerId) -> OrdersCache<OrderClient> {
        OrdersCache::new(
            OrderClient::new(self.api().clone()),
            seller,
            self.storage(),
            self.clock(),
            DEFAULT_ORDERS_TTL,
        )
    }

    /// A notification poller with the persisted shown-set loaded.
    #[must_use]
    pub fn notifications(&self) -> NotificationPoller<NotificationClient> {
        NotificationPoller::new(
            NotificationClient::new(self.api().clone()),
            self.storage(),
            self.config().notification_limit,
            self.config().shown_notifications_cap,
        )
    }
}
