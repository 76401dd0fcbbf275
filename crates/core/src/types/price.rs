//! Price helpers using decimal arithmetic.
//!
//! Catalog prices are `rust_decimal::Decimal` values in the store currency's
//! standard unit (dollars, not cents). Float prices never appear in this
//! crate, so range checks and price sorting are exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An inclusive price range used by catalog filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lowest accepted price (inclusive).
    pub min: Decimal,
    /// Highest accepted price (inclusive).
    pub max: Decimal,
}

impl PriceRange {
    /// Create a new range. Bounds given in the wrong order are swapped.
    #[must_use]
    pub fn new(min: Decimal, max: Decimal) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Range with only a lower bound.
    #[must_use]
    pub const fn at_least(min: Decimal) -> Self {
        Self {
            min,
            max: Decimal::MAX,
        }
    }

    /// Range with only an upper bound.
    #[must_use]
    pub const fn at_most(max: Decimal) -> Self {
        Self {
            min: Decimal::ZERO,
            max,
        }
    }

    /// Whether `price` lies within the range, bounds included.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Whether a compare-at price marks the item as discounted.
#[must_use]
pub fn is_discounted(price: Decimal, compare_at_price: Option<Decimal>) -> bool {
    compare_at_price.is_some_and(|compare_at| compare_at > price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive() {
        let range = PriceRange::new(Decimal::new(1000, 2), Decimal::new(2000, 2));
        assert!(range.contains(Decimal::new(1000, 2)));
        assert!(range.contains(Decimal::new(2000, 2)));
        assert!(!range.contains(Decimal::new(2001, 2)));
        assert!(!range.contains(Decimal::new(999, 2)));
    }

    #[test]
    fn test_range_swaps_reversed_bounds() {
        let range = PriceRange::new(Decimal::from(50), Decimal::from(10));
        assert_eq!(range.min, Decimal::from(10));
        assert_eq!(range.max, Decimal::from(50));
    }

    #[test]
    fn test_half_open_ranges() {
        assert!(PriceRange::at_least(Decimal::from(5)).contains(Decimal::from(1_000_000)));
        assert!(PriceRange::at_most(Decimal::from(5)).contains(Decimal::ZERO));
        assert!(!PriceRange::at_most(Decimal::from(5)).contains(Decimal::from(6)));
    }

    #[test]
    fn test_is_discounted() {
        let price = Decimal::from(40);
        assert!(is_discounted(price, Some(Decimal::from(60))));
        assert!(!is_discounted(price, Some(Decimal::from(40))));
        assert!(!is_discounted(price, None));
    }
}
