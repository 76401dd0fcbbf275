//! Catalog commands: trending view and filtered browsing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use storeline_core::{Item, PriceRange};
use storeline_storefront::SyncError;
use storeline_storefront::catalog::{
    CacheManager, CatalogSource, FilterCriteria, MountOutcome, TrendingSource, ViewKey, score,
};
use storeline_storefront::state::ClientState;

use crate::BrowseArgs;

/// Mount the catalog and log how the snapshot was obtained.
///
/// # Errors
///
/// Returns the cold start error when nothing is cached and the service is
/// unreachable.
pub async fn mount<S: CatalogSource>(manager: &CacheManager<S>) -> Result<(), SyncError> {
    match manager.mount().await? {
        MountOutcome::Cached => tracing::debug!(items = ?manager.item_count(), "Serving cached catalog"),
        MountOutcome::Built => tracing::info!(items = ?manager.item_count(), "Catalog snapshot built"),
        MountOutcome::Stale => {
            tracing::warn!(items = ?manager.item_count(), "Catalog service unavailable, serving expired snapshot");
        }
    }
    Ok(())
}

/// Print the trending view, best first, with each item's score.
///
/// Scores are those the ranking saw when the snapshot was taken. Server
/// ranked views have no local score.
#[allow(clippy::print_stdout)]
pub async fn trending(state: &ClientState, limit: Option<usize>) -> Result<(), SyncError> {
    let manager = state.catalog();
    mount(&manager).await?;

    let Some(entry) = manager.current() else {
        return Ok(());
    };
    let rows = trending_rows(
        entry.data.view(ViewKey::Trending),
        entry.data.taken_at(),
        state.config().trending_source,
        limit,
    );

    for (position, (item, score)) in rows.iter().enumerate() {
        let score = score.map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        println!(
            "{:>3}. {:<40} {:>10} {:>8}",
            position + 1,
            item.title,
            item.price.to_string(),
            score
        );
    }
    Ok(())
}

fn trending_rows(
    view: &[Arc<Item>],
    taken_at: DateTime<Utc>,
    source: TrendingSource,
    limit: Option<usize>,
) -> Vec<(Arc<Item>, Option<f64>)> {
    view.iter()
        .take(limit.unwrap_or(view.len()))
        .map(|item| {
            let score = match source {
                TrendingSource::Client => Some(score(item, taken_at)),
                TrendingSource::Server => None,
            };
            (Arc::clone(item), score)
        })
        .collect()
}

/// Print the items of a view that pass the requested filters.
#[allow(clippy::print_stdout)]
pub async fn browse(state: &ClientState, args: &BrowseArgs) -> Result<(), SyncError> {
    let manager = state.catalog();
    mount(&manager).await?;

    let items = manager.filter(args.view, &criteria(args), args.sort);
    for item in &items {
        println!(
            "{:>8}  {:<40} {:>10}  {}",
            item.id,
            item.title,
            item.price.to_string(),
            item.category.as_str()
        );
    }
    println!(
        "{} of {} items in {}",
        items.len(),
        manager.view(args.view).len(),
        args.view
    );
    Ok(())
}

fn criteria(args: &BrowseArgs) -> FilterCriteria {
    let price_range = match (args.min_price, args.max_price) {
        (Some(min), Some(max)) => Some(PriceRange::new(min, max)),
        (Some(min), None) => Some(PriceRange::at_least(min)),
        (None, Some(max)) => Some(PriceRange::at_most(max)),
        (None, None) => None,
    };

    FilterCriteria {
        query: args.query.clone(),
        price_range,
        sizes: args.sizes.iter().cloned().collect(),
        colors: args.colors.iter().cloned().collect(),
        clothing_types: args.clothing_types.iter().cloned().collect(),
        occasions: args.occasions.iter().cloned().collect(),
        new_arrival: args.new_arrivals,
        on_sale: args.on_sale,
    }
}
