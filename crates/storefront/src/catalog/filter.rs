//! User-facing filters and sorting over a cached view.
//!
//! Everything here is synchronous and works on the in-memory snapshot only.
//! Predicates combine with AND; an empty [`FilterCriteria`] keeps every item.

use std::collections::BTreeSet;
use std::sync::Arc;

use storeline_core::{Item, PriceRange};

/// Predicates selected by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Case-insensitive substring matched against title and description.
    pub query: Option<String>,
    /// Inclusive price bounds.
    pub price_range: Option<PriceRange>,
    /// Keep items offered in at least one of these sizes.
    pub sizes: BTreeSet<String>,
    /// Keep items offered in at least one of these colors (case-insensitive).
    pub colors: BTreeSet<String>,
    /// Keep items whose clothing type is one of these.
    pub clothing_types: BTreeSet<String>,
    /// Keep items tagged with at least one of these occasions.
    pub occasions: BTreeSet<String>,
    /// Keep only new arrivals.
    pub new_arrival: bool,
    /// Keep only discounted items.
    pub on_sale: bool,
}

impl FilterCriteria {
    /// Whether no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized_query().is_none()
            && self.price_range.is_none()
            && self.sizes.is_empty()
            && self.colors.is_empty()
            && self.clothing_types.is_empty()
            && self.occasions.is_empty()
            && !self.new_arrival
            && !self.on_sale
    }

    /// Whether `item` passes every predicate.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.matches_query(item)
            && self
                .price_range
                .is_none_or(|range| range.contains(item.price))
            && (self.sizes.is_empty() || !self.sizes.is_disjoint(&item.sizes))
            && self.matches_colors(item)
            && (self.clothing_types.is_empty()
                || item
                    .clothing_type
                    .as_ref()
                    .is_some_and(|t| self.clothing_types.contains(t)))
            && (self.occasions.is_empty() || !self.occasions.is_disjoint(&item.occasions))
            && (!self.new_arrival || item.is_new_arrival)
            && (!self.on_sale || item.on_sale)
    }

    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    fn matches_query(&self, item: &Item) -> bool {
        let Some(query) = self.normalized_query() else {
            return true;
        };
        item.title.to_lowercase().contains(&query)
            || item.description.to_lowercase().contains(&query)
    }

    fn matches_colors(&self, item: &Item) -> bool {
        if self.colors.is_empty() {
            return true;
        }
        item.colors.iter().any(|color| {
            let color = color.to_lowercase();
            self.colors.iter().any(|wanted| wanted.to_lowercase() == color)
        })
    }
}

/// Sort order applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Keep snapshot order (rank order for the trending view).
    #[default]
    Featured,
    PriceLow,
    PriceHigh,
    /// Title, lexicographic.
    Name,
}

impl SortKey {
    /// Name used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::PriceLow => "price-low",
            Self::PriceHigh => "price-high",
            Self::Name => "name",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "featured" => Ok(Self::Featured),
            "price-low" => Ok(Self::PriceLow),
            "price-high" => Ok(Self::PriceHigh),
            "name" => Ok(Self::Name),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

/// Filter and sort a cached view.
///
/// Sorting is stable: items that compare equal keep their view order.
#[must_use]
pub fn filter(view: &[Arc<Item>], criteria: &FilterCriteria, sort: SortKey) -> Vec<Arc<Item>> {
    let mut items: Vec<Arc<Item>> = if criteria.is_empty() {
        view.to_vec()
    } else {
        view.iter()
            .filter(|item| criteria.matches(item))
            .cloned()
            .collect()
    };

    match sort {
        SortKey::Featured => {}
        SortKey::PriceLow => items.sort_by(|a, b| a.price.cmp(&b.price)),
        SortKey::PriceHigh => items.sort_by(|a, b| b.price.cmp(&a.price)),
        SortKey::Name => items.sort_by(|a, b| a.title.cmp(&b.title)),
    }
    items
}
