//! Time-to-live cache entries backed by durable storage.
//!
//! [`CacheStore`] keeps the latest entry per key in memory and mirrors every
//! `put` to [`Storage`]. The first `get` for a key deserializes the durable
//! copy; later reads never touch storage again.
//!
//! A `put` swaps the in-memory entry before its durable write starts, so
//! readers see the new value at once. Durable writes of one store run one at
//! a time, in `put` order.
//!
//! Expired entries are kept and keep being served: an entry is only ever
//! replaced by the next successful `put`, never deleted for being old.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::storage::{Storage, load_json, save_json};

/// A cached value with the instant it was fetched and how long it stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is still valid at `now` (`now - fetched_at < ttl`).
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.fetched_at);
        // A TTL too large for TimeDelta never expires
        TimeDelta::from_std(self.ttl).map_or(true, |ttl| elapsed < ttl)
    }
}

/// Keyed store of [`CacheEntry`] values.
pub struct CacheStore<T> {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    /// `None` marks a key whose durable copy was already checked and absent.
    entries: RwLock<HashMap<String, Option<Arc<CacheEntry<T>>>>>,
    writes: tokio::sync::Mutex<()>,
}

impl<T> CacheStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a store over `storage`, reading time from `clock`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            entries: RwLock::new(HashMap::new()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Latest entry for `key`, valid or not.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<T>>> {
        if let Some(slot) = self.entries.read().get(key) {
            return slot.clone();
        }

        let loaded = load_json::<CacheEntry<T>>(self.storage.as_ref(), key).map(Arc::new);
        if loaded.is_some() {
            tracing::debug!(key, "Hydrated cache entry from durable storage");
        }

        // Another reader may have hydrated the key meanwhile; keep theirs
        self.entries
            .write()
            .entry(key.to_string())
            .or_insert(loaded)
            .clone()
    }

    /// Store `data` under `key`, stamped with the current time.
    ///
    /// The in-memory entry is always replaced. A durable write failure is
    /// logged and otherwise ignored.
    pub async fn put(&self, key: &str, data: T, ttl: Duration) -> Arc<CacheEntry<T>> {
        let _writing = self.writes.lock().await;
        let entry = Arc::new(CacheEntry {
            data,
            fetched_at: self.clock.now(),
            ttl,
        });
        self.entries
            .write()
            .insert(key.to_string(), Some(Arc::clone(&entry)));

        if let Err(e) = save_json(&self.storage, key, entry.as_ref()).await {
            tracing::warn!(key, error = %e, "Failed to persist cache entry");
        }
        entry
    }

    /// Whether `entry` is valid at the store clock's current time.
    #[must_use]
    pub fn is_valid(&self, entry: &CacheEntry<T>) -> bool {
        entry.is_valid_at(self.clock.now())
    }

    /// Current time according to the store clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
