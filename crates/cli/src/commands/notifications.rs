//! Notification commands.

use storeline_core::NotificationId;
use storeline_storefront::SyncError;
use storeline_storefront::state::ClientState;

/// Run one poll tick and print the feed, marking the surfaced alert.
#[allow(clippy::print_stdout)]
pub async fn poll(state: &ClientState) -> Result<(), SyncError> {
    let poller = state.notifications();
    let outcome = poller.poll_tick().await?;

    println!("{} unread", outcome.unread_count);
    let alert = outcome.surfaced.as_ref().map(|n| n.id);
    for notification in poller.recent() {
        let marker = if Some(notification.id) == alert {
            '!'
        } else if notification.read {
            ' '
        } else {
            '*'
        };
        println!(
            "{marker} {:>6}  {:<12} {}: {}",
            notification.id,
            format!("{:?}", notification.kind),
            notification.title,
            notification.message
        );
    }
    Ok(())
}

pub async fn mark_read(state: &ClientState, id: NotificationId) -> Result<(), SyncError> {
    state.notifications().mark_read(id).await?;
    tracing::info!(%id, "Notification marked read");
    Ok(())
}

pub async fn delete(state: &ClientState, id: NotificationId) -> Result<(), SyncError> {
    state.notifications().delete(id).await?;
    tracing::info!(%id, "Notification deleted");
    Ok(())
}
