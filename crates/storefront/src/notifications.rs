//! Notification polling with at-most-once transient alerts.
//!
//! Each tick fetches the unread count and the most recent notifications,
//! updates the badge count, and surfaces at most one alert: the first unread
//! notification whose id is not in the shown-set. The id is added to the set
//! and the set is persisted before the alert is handed out, so an id is
//! surfaced at most once for as long as the persisted set remembers it.
//!
//! The shown-set is capped; when full, the oldest ids are forgotten first.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use storeline_core::{Notification, NotificationId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ServiceError;
use crate::error::{Result, SyncError};
use crate::storage::{Storage, load_json, save_json};

/// Durable storage key of the shown-set.
pub const SHOWN_NOTIFICATIONS_KEY: &str = "shown-notification-ids";

/// Default capacity of the shown-set.
pub const DEFAULT_SHOWN_CAP: usize = 500;

/// Default number of recent notifications fetched per tick.
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 20;

/// Shortest accepted timer period.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Alerts buffered between the poller and its consumer.
const ALERT_BUFFER: usize = 16;

/// Recent notifications plus the server's unread count.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

/// Access to the Notification Service.
pub trait NotificationSource: Send + Sync + 'static {
    /// Most recent notifications, newest first, plus the unread count.
    fn list(
        &self,
        limit: usize,
    ) -> impl Future<Output = std::result::Result<NotificationFeed, ServiceError>> + Send;

    fn mark_read(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send;

    fn delete(
        &self,
        id: NotificationId,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send;
}

// =============================================================================
// ShownNotificationSet
// =============================================================================

/// Ids already surfaced as alerts, in insertion order, bounded by `cap`.
#[derive(Debug, Clone)]
pub struct ShownNotificationSet {
    order: VecDeque<NotificationId>,
    ids: HashSet<NotificationId>,
    cap: usize,
}

impl ShownNotificationSet {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            cap: cap.max(1),
        }
    }

    /// Rebuild from persisted ids (oldest first), keeping the newest `cap`.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = NotificationId>, cap: usize) -> Self {
        let mut set = Self::new(cap);
        for id in ids {
            set.insert(id);
        }
        set
    }

    #[must_use]
    pub fn contains(&self, id: NotificationId) -> bool {
        self.ids.contains(&id)
    }

    /// Add `id`, evicting the oldest ids beyond the cap. Returns `false` if
    /// the id was already present.
    pub fn insert(&mut self, id: NotificationId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids oldest first, the persisted order.
    pub fn ids(&self) -> impl Iterator<Item = NotificationId> + '_ {
        self.order.iter().copied()
    }
}

// =============================================================================
// NotificationPoller
// =============================================================================

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub unread_count: u64,
    /// The alert to show this tick, if any.
    pub surfaced: Option<Notification>,
}

/// Polls the Notification Service and decides which alert to surface.
pub struct NotificationPoller<S> {
    source: S,
    storage: Arc<dyn Storage>,
    limit: usize,
    shown: Mutex<ShownNotificationSet>,
    /// Keeps shown-set writes in order.
    persist_lock: tokio::sync::Mutex<()>,
    recent: RwLock<Vec<Notification>>,
    unread: AtomicU64,
    alive: AtomicBool,
}

impl<S: NotificationSource> NotificationPoller<S> {
    /// Create a poller, loading the persisted shown-set.
    #[must_use]
    pub fn new(source: S, storage: Arc<dyn Storage>, limit: usize, shown_cap: usize) -> Self {
        let persisted: Vec<NotificationId> =
            load_json(storage.as_ref(), SHOWN_NOTIFICATIONS_KEY).unwrap_or_default();
        let shown = ShownNotificationSet::from_ids(persisted, shown_cap);
        tracing::debug!(shown = shown.len(), "Loaded shown notification ids");

        Self {
            source,
            storage,
            limit,
            shown: Mutex::new(shown),
            persist_lock: tokio::sync::Mutex::new(()),
            recent: RwLock::new(Vec::new()),
            unread: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        }
    }

    /// Run one poll tick.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the fetch failed (the unread count
    /// is kept) and [`SyncError::TornDown`] if the poller was torn down while
    /// fetching; nothing is surfaced in either case.
    pub async fn poll_tick(&self) -> Result<PollOutcome> {
        if !self.is_alive() {
            return Err(SyncError::TornDown);
        }

        let feed = self.source.list(self.limit).await?;
        if !self.is_alive() {
            return Err(SyncError::TornDown);
        }

        self.unread.store(feed.unread_count, Ordering::SeqCst);
        let surfaced = self.surface(&feed.notifications).await;
        *self.recent.write() = feed.notifications;

        if let Some(notification) = &surfaced {
            tracing::info!(id = %notification.id, title = %notification.title, "Surfacing notification");
        }
        Ok(PollOutcome {
            unread_count: feed.unread_count,
            surfaced,
        })
    }

    /// Pick the first unread, never-shown notification and record it.
    async fn surface(&self, notifications: &[Notification]) -> Option<Notification> {
        let _persisting = self.persist_lock.lock().await;
        let (next, ids) = {
            let mut shown = self.shown.lock();
            let next = notifications
                .iter()
                .find(|n| !n.read && !shown.contains(n.id))?
                .clone();
            shown.insert(next.id);
            let ids: Vec<NotificationId> = shown.ids().collect();
            (next, ids)
        };

        if let Err(e) = save_json(&self.storage, SHOWN_NOTIFICATIONS_KEY, &ids).await {
            tracing::warn!(error = %e, "Failed to persist shown notification ids");
        }
        Some(next)
    }

    /// Mark a notification read on the server and drop it from the local
    /// unread count. Ids outside the last fetched window leave the count to
    /// the next tick. The shown-set is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service call failed.
    pub async fn mark_read(&self, id: NotificationId) -> Result<()> {
        self.source.mark_read(id).await?;

        let was_unread = {
            let mut recent = self.recent.write();
            recent
                .iter_mut()
                .find(|n| n.id == id)
                .is_some_and(|notification| !std::mem::replace(&mut notification.read, true))
        };
        if was_unread {
            self.decrement_unread();
        }
        Ok(())
    }

    /// Delete a notification on the server. The shown-set is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Service`] if the service call failed.
    pub async fn delete(&self, id: NotificationId) -> Result<()> {
        self.source.delete(id).await?;

        let was_unread = {
            let mut recent = self.recent.write();
            let position = recent.iter().position(|n| n.id == id);
            position.is_some_and(|index| !recent.remove(index).read)
        };
        if was_unread {
            self.decrement_unread();
        }
        Ok(())
    }

    fn decrement_unread(&self) {
        let _ = self
            .unread
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Unread count from the last successful tick, adjusted by local
    /// mutations since.
    #[must_use]
    pub fn unread_count(&self) -> u64 {
        self.unread.load(Ordering::SeqCst)
    }

    /// Notifications from the last successful tick.
    #[must_use]
    pub fn recent(&self) -> Vec<Notification> {
        self.recent.read().clone()
    }

    #[must_use]
    pub fn was_shown(&self, id: NotificationId) -> bool {
        self.shown.lock().contains(id)
    }

    /// Stop surfacing alerts. An in-flight tick completes without surfacing.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Handle to a running poller timer.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancel the timer and wait for the timer task to exit.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Notification poller task ended abnormally");
        }
    }
}

/// Poll every `every`, starting now, and deliver surfaced alerts on the
/// returned channel.
pub fn spawn_poller<S: NotificationSource>(
    poller: Arc<NotificationPoller<S>>,
    every: Duration,
) -> (PollerHandle, mpsc::Receiver<Notification>) {
    let (shutdown, mut stopped) = watch::channel(false);
    let (alerts, receiver) = mpsc::channel(ALERT_BUFFER);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {
                    match poller.poll_tick().await {
                        Ok(PollOutcome { surfaced: Some(notification), .. }) if poller.is_alive() => {
                            if alerts.send(notification).await.is_err() {
                                tracing::debug!("Alert receiver dropped");
                                break;
                            }
                        }
                        Ok(_) | Err(SyncError::TornDown) => {}
                        Err(e) => tracing::warn!(error = %e, "Notification poll failed"),
                    }
                }
            }
        }
        tracing::debug!("Notification poller stopped");
    });

    (PollerHandle { shutdown, task }, receiver)
}
