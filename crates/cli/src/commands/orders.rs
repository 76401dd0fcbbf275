//! Order queue commands.

use storeline_core::{OrderId, OrderStatus, SellerId};
use storeline_storefront::SyncError;
use storeline_storefront::catalog::MountOutcome;
use storeline_storefront::orders::FilterKey;
use storeline_storefront::state::ClientState;

/// Print one tab of a seller's order queue with the seller-wide stats.
///
/// The cached queue is shown unless `refresh` asks for a fresh fetch.
#[allow(clippy::print_stdout)]
pub async fn list(
    state: &ClientState,
    seller: SellerId,
    filter: FilterKey,
    refresh: bool,
) -> Result<(), SyncError> {
    let cache = state.orders(seller);
    if cache.load().await? == MountOutcome::Cached {
        if refresh {
            cache.refresh().await?;
        } else if !cache.is_fresh() {
            tracing::warn!(%seller, "Showing an old order queue; pass --refresh to update it");
        }
    }

    if let Some(stats) = cache.stats() {
        println!(
            "{} orders: {} pending, {} processing, {} shipped, {} delivered, {} cancelled; revenue {}",
            stats.total,
            stats.pending,
            stats.processing,
            stats.shipped,
            stats.delivered,
            stats.cancelled,
            stats.revenue
        );
    }

    for order in cache.view(filter) {
        println!(
            "{:<12} {:<28} {:<10} {:>10}  {}",
            order.order_number,
            order.customer_name,
            order.status.as_str(),
            order.total.to_string(),
            order.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Move an order to `status` and show the tab it landed in.
#[allow(clippy::print_stdout)]
pub async fn set_status(
    state: &ClientState,
    seller: SellerId,
    order: OrderId,
    status: OrderStatus,
) -> Result<(), SyncError> {
    let cache = state.orders(seller);
    cache.update_status(order, status).await?;

    let tab = FilterKey::from(status);
    let landed = cache.view(tab).iter().any(|o| o.id == order);
    println!(
        "Order {order} is now {status}{}",
        if landed { "" } else { " (queue not yet refreshed)" }
    );
    Ok(())
}
