//! Wire payloads for the marketplace services.
//!
//! These mirror the JSON the services send and are never exposed outside the
//! `api` module. Optional and defaulted fields absorb the looser shapes older
//! service versions return; `conversions` turns them into core records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<ProductDto>,
}

#[derive(Debug, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: i64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default, alias = "originalPrice")]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "type")]
    pub clothing_type: Option<String>,
    #[serde(default, alias = "occasion")]
    pub occasions: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub is_new_arrival: Option<bool>,
    #[serde(default)]
    pub on_sale: Option<bool>,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "views")]
    pub view_count: u64,
    #[serde(default, alias = "sales")]
    pub sales_count: u64,
    #[serde(default)]
    pub ratings: Vec<RatingDto>,
    pub seller_id: i64,
}

/// A rating is either a bare number or an object carrying one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RatingDto {
    Value(i64),
    Review { rating: i64 },
}

impl RatingDto {
    pub const fn value(&self) -> i64 {
        match self {
            Self::Value(v) | Self::Review { rating: v } => *v,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderDto>,
    #[serde(default)]
    pub stats: Option<OrderStatsDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: i64,
    #[serde(default)]
    pub order_number: Option<String>,
    pub seller_id: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub status: String,
    #[serde(alias = "totalAmount")]
    pub total: Decimal,
    #[serde(default)]
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatsDto {
    #[serde(default, alias = "totalOrders")]
    pub total: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub shipped: u64,
    #[serde(default)]
    pub delivered: u64,
    #[serde(default)]
    pub cancelled: u64,
    #[serde(default, alias = "totalRevenue")]
    pub revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateRequest<'a> {
    pub status: &'a str,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<NotificationDto>,
    #[serde(default)]
    pub unread_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: i64,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub link: Option<String>,
}
