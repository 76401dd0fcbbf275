//! Trending score.
//!
//! ```text
//! recency = max(0, 30 - days_since_created) / 30
//! score   = 0.4   * sales
//!         + 0.003 * views
//!         + 0.2   * (average_rating * 4)
//!         + 0.1   * (recency * 10)
//! ```
//!
//! The Catalog Service's trending endpoint computes the same formula; both
//! sides must read their weights from [`TrendingWeights::DEFAULT`].

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use storeline_core::Item;

/// Items older than this many days get no recency boost.
pub const RECENCY_WINDOW_DAYS: i64 = 30;

/// Weights of the four trending signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingWeights {
    pub sales: f64,
    pub views: f64,
    pub rating: f64,
    pub recency: f64,
}

impl TrendingWeights {
    /// The production weights.
    pub const DEFAULT: Self = Self {
        sales: 0.4,
        views: 0.003,
        rating: 0.2,
        recency: 0.1,
    };

    /// Scale applied to the 0-5 average rating before weighting.
    const RATING_SCALE: f64 = 4.0;
    /// Scale applied to the 0-1 recency score before weighting.
    const RECENCY_SCALE: f64 = 10.0;
}

/// An item with its computed trending score. The score is never persisted.
#[derive(Debug, Clone)]
pub struct RankedItem {
    pub item: Arc<Item>,
    pub trending_score: f64,
}

/// Recency signal in `0.0..=1.0`: 1 on the day of creation, 0 after the window.
#[must_use]
#[allow(clippy::cast_precision_loss)] // both values are within 0..=30
pub fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = now.signed_duration_since(created_at).num_days().max(0);
    let remaining = (RECENCY_WINDOW_DAYS - days).max(0);
    remaining as f64 / RECENCY_WINDOW_DAYS as f64
}

/// Trending score of a single item at `now`.
#[must_use]
pub fn score(item: &Item, now: DateTime<Utc>) -> f64 {
    score_with(item, now, TrendingWeights::DEFAULT)
}

#[allow(clippy::cast_precision_loss)] // counters beyond 2^52 lose precision harmlessly
fn score_with(item: &Item, now: DateTime<Utc>, weights: TrendingWeights) -> f64 {
    weights.sales * item.sales_count as f64
        + weights.views * item.view_count as f64
        + weights.rating * (item.average_rating() * TrendingWeights::RATING_SCALE)
        + weights.recency * (recency_score(item.created_at, now) * TrendingWeights::RECENCY_SCALE)
}

/// Rank `items` by trending score, best first.
///
/// Pure and deterministic for a given `now`. Items with equal scores keep
/// their input order.
#[must_use]
pub fn rank(items: &[Arc<Item>], now: DateTime<Utc>) -> Vec<RankedItem> {
    let mut ranked: Vec<RankedItem> = items
        .iter()
        .map(|item| RankedItem {
            trending_score: score(item, now),
            item: Arc::clone(item),
        })
        .collect();

    // sort_by is stable, so ties stay in fetch order
    ranked.sort_by(|a, b| {
        b.trending_score
            .partial_cmp(&a.trending_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::testing::item;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(400)
    }

    fn aged(id: i64, days: i64) -> Item {
        let mut item = item(id);
        item.created_at = now() - TimeDelta::days(days);
        item
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(&[], now()).is_empty());
    }

    #[test]
    fn test_reference_score() {
        let mut item = aged(1, 0);
        item.sales_count = 10;
        item.view_count = 500;
        item.ratings = vec![4, 5];

        // 0.4*10 + 0.003*500 + 0.2*4.5*4 + 0.1*1*10
        let expected = 4.0 + 1.5 + 3.6 + 1.0;
        assert!((score(&item, now()) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_reference_score_with_four_star_average() {
        let mut item = aged(1, 0);
        item.sales_count = 10;
        item.view_count = 500;
        item.ratings = vec![4, 4];

        assert!((score(&item, now()) - 9.7).abs() < 1e-9);
    }

    #[test]
    fn test_cold_old_item_scores_zero() {
        assert!(score(&aged(1, 30), now()).abs() < f64::EPSILON);
        assert!(score(&aged(1, 365), now()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recency_score_bounds() {
        let now = now();
        assert!((recency_score(now, now) - 1.0).abs() < f64::EPSILON);
        assert!((recency_score(now - TimeDelta::days(15), now) - 0.5).abs() < f64::EPSILON);
        assert!(recency_score(now - TimeDelta::days(45), now).abs() < f64::EPSILON);
        // Future timestamps count as brand new
        assert!((recency_score(now + TimeDelta::days(3), now) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rank_sorts_descending() {
        let mut hot = aged(1, 90);
        hot.sales_count = 50;
        let mut warm = aged(2, 90);
        warm.sales_count = 5;
        let cold = aged(3, 90);

        let items: Vec<Arc<Item>> = vec![cold, warm, hot].into_iter().map(Arc::new).collect();
        let ids: Vec<i64> = rank(&items, now())
            .iter()
            .map(|r| r.item.id.as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let items: Vec<Arc<Item>> = (1..=5)
            .map(|id| {
                let mut item = aged(id, 90);
                item.sales_count = if id == 3 { 1 } else { 0 };
                Arc::new(item)
            })
            .collect();

        let ids: Vec<i64> = rank(&items, now())
            .iter()
            .map(|r| r.item.id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 1, 2, 4, 5]);
    }

    #[test]
    fn test_rank_shares_allocations() {
        let items = vec![Arc::new(aged(1, 1))];
        let ranked = rank(&items, now());
        assert!(Arc::ptr_eq(&ranked[0].item, &items[0]));
    }
}
