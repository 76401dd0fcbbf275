//! Seller order queue records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{OrderId, SellerId};
use super::status::OrderStatus;

/// An order as seen in a seller's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing order number, e.g. "#1042".
    pub order_number: String,
    pub seller_id: SellerId,
    pub customer_name: String,
    pub status: OrderStatus,
    pub total: Decimal,
    /// Number of line items.
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counters over a seller's orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
    /// Sum of order totals, excluding cancelled orders.
    pub revenue: Decimal,
}

impl OrderStats {
    /// Recompute stats from a full order list.
    ///
    /// Used when the service omits stats from its response.
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut stats = Self {
            total: orders.len() as u64,
            ..Self::default()
        };
        for order in orders {
            *stats.count_mut(order.status) += 1;
            if order.status != OrderStatus::Cancelled {
                stats.revenue += order.total;
            }
        }
        stats
    }

    /// Count of orders in `status`.
    #[must_use]
    pub const fn count(&self, status: OrderStatus) -> u64 {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Processing => self.processing,
            OrderStatus::Shipped => self.shipped,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    fn count_mut(&mut self, status: OrderStatus) -> &mut u64 {
        match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        }
    }
}
