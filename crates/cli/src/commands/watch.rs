//! Long-running sync until interrupted.
//!
//! Mounts the catalog, arms the reconciler and the notification poller, and
//! optionally keeps a seller's order queue loaded. Alerts are logged as they
//! arrive; order alerts also refresh the queue. On Ctrl+C or SIGTERM every
//! cache is torn down before its timer is stopped, so work still in flight
//! is discarded rather than applied.

use std::sync::Arc;

use storeline_core::{NotificationKind, SellerId};
use storeline_storefront::SyncError;
use storeline_storefront::catalog::spawn_reconciler;
use storeline_storefront::notifications::spawn_poller;
use storeline_storefront::state::ClientState;

pub async fn run(state: &ClientState, seller: Option<SellerId>) -> Result<(), SyncError> {
    let config = state.config();

    let catalog = Arc::new(state.catalog());
    super::catalog::mount(&catalog).await?;
    let reconciler = spawn_reconciler(Arc::clone(&catalog), config.reconcile_interval);

    let poller = Arc::new(state.notifications());
    let (poller_handle, mut alerts) =
        spawn_poller(Arc::clone(&poller), config.notification_poll_interval);

    let orders = match seller {
        Some(seller) => {
            let cache = state.orders(seller);
            match cache.load().await {
                Ok(outcome) => tracing::info!(%seller, ?outcome, stats = ?cache.stats(), "Order queue loaded"),
                Err(e) => tracing::warn!(%seller, error = %e, "Order queue unavailable"),
            }
            Some(cache)
        }
        None => None,
    };

    tracing::info!(
        reconcile_every = ?config.reconcile_interval,
        poll_every = ?config.notification_poll_interval,
        "Watching for changes, press Ctrl+C to stop"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            Some(notification) = alerts.recv() => {
                tracing::info!(
                    id = %notification.id,
                    kind = ?notification.kind,
                    unread = poller.unread_count(),
                    "{}: {}",
                    notification.title,
                    notification.message
                );

                if notification.kind == NotificationKind::Order
                    && let Some(orders) = &orders
                {
                    match orders.refresh().await {
                        Ok(entry) => tracing::info!(stats = ?entry.data.stats(), "Order queue refreshed"),
                        Err(e) => tracing::warn!(error = %e, "Order queue refresh failed"),
                    }
                }
            }
        }
    }

    catalog.teardown();
    poller.teardown();
    if let Some(orders) = &orders {
        orders.teardown();
    }
    reconciler.stop().await;
    poller_handle.stop().await;

    tracing::info!(
        version = ?catalog.current().map(|entry| entry.data.version()),
        "Stopped"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, tearing down");
}
