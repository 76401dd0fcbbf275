//! Background reconciliation of the catalog snapshot.
//!
//! Each tick asks the Catalog Service for its item count (the sentinel
//! probe). A count that differs from the current snapshot triggers a silent
//! rebuild and swap; a matching count does nothing.
//!
//! ```text
//!          fire            probe matches / build done / failure
//!   IDLE --------> RECONCILING ----------------------------------> IDLE
//!                      |
//!                      +-- fire while here: no-op
//! ```
//!
//! At most one reconciliation is in flight per [`CacheManager`]. Probe and
//! build failures keep the previous snapshot and leave the timer armed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::CatalogSource;
use super::manager::CacheManager;
use crate::error::SyncError;

/// Shortest accepted timer period.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Reconciling,
}

/// Result of one reconciler tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Another reconciliation was already in flight.
    Skipped,
    /// The probe matched the snapshot.
    Unchanged { count: u64 },
    /// The counts differed and a new snapshot was committed.
    Rebuilt {
        previous: Option<u64>,
        count: u64,
        version: u64,
    },
    /// The probe or the build failed; the previous snapshot is kept.
    Failed(SyncError),
    /// The cache was torn down and the result was not applied.
    Discarded,
}

/// Resets the reconciling flag when the tick ends, however it ends.
struct ReconcilingGuard<'a>(&'a AtomicBool);

impl Drop for ReconcilingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<S: CatalogSource> CacheManager<S> {
    #[must_use]
    pub fn reconciler_state(&self) -> ReconcilerState {
        if self.reconciling.load(Ordering::SeqCst) {
            ReconcilerState::Reconciling
        } else {
            ReconcilerState::Idle
        }
    }

    /// Run one reconciler tick.
    ///
    /// Callable directly; [`spawn_reconciler`] drives it from a timer.
    pub async fn reconcile_tick(&self) -> TickOutcome {
        if !self.is_alive() {
            return TickOutcome::Discarded;
        }
        if self
            .reconciling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Reconciliation already in flight, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = ReconcilingGuard(&self.reconciling);

        let remote = match self.source().item_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Sentinel probe failed");
                return TickOutcome::Failed(e.into());
            }
        };

        let local = self.item_count();
        if local == Some(remote) {
            tracing::trace!(count = remote, "Catalog unchanged");
            return TickOutcome::Unchanged { count: remote };
        }

        tracing::info!(?local, remote, "Catalog item count drifted, rebuilding");
        match self.rebuild().await {
            Ok(entry) => TickOutcome::Rebuilt {
                previous: local,
                count: entry.data.item_count(),
                version: entry.data.version(),
            },
            Err(SyncError::TornDown) => TickOutcome::Discarded,
            Err(e) => {
                tracing::warn!(error = %e, "Background rebuild failed, keeping previous snapshot");
                TickOutcome::Failed(e)
            }
        }
    }
}

/// Handle to a running reconciler timer.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Cancel the timer and wait for the timer task to exit.
    ///
    /// A tick that is already running is not cancelled; tear the manager
    /// down first so its result is discarded.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Reconciler task ended abnormally");
        }
    }
}

/// Drive [`CacheManager::reconcile_tick`] every `every`, starting now.
///
/// The immediate first tick is the post-mount probe. Each tick runs on its
/// own task so a slow rebuild never delays the timer; ticks that fire during
/// it come back as [`TickOutcome::Skipped`].
pub fn spawn_reconciler<S: CatalogSource>(
    manager: Arc<CacheManager<S>>,
    every: Duration,
) -> ReconcilerHandle {
    let (shutdown, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move {
                        match manager.reconcile_tick().await {
                            TickOutcome::Rebuilt { previous, count, version } => {
                                tracing::info!(?previous, count, version, "Catalog reconciled");
                            }
                            TickOutcome::Failed(e) => {
                                tracing::debug!(error = %e, "Reconciler tick failed");
                            }
                            _ => {}
                        }
                    });
                }
            }
        }
        tracing::debug!("Reconciler timer stopped");
    });

    ReconcilerHandle { shutdown, task }
}
