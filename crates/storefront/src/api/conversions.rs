//! Type conversion functions for service responses.

use std::collections::BTreeSet;

use storeline_core::price::is_discounted;
use storeline_core::{
    Category, Item, ItemId, Notification, NotificationId, NotificationKind, Order, OrderId,
    OrderStats, OrderStatus, RATING_MAX, RATING_MIN, SellerId,
};

use super::types::{NotificationDto, OrderDto, OrderStatsDto, ProductDto};

// =============================================================================
// Catalog Conversions
// =============================================================================

pub fn convert_product(product: ProductDto) -> Item {
    let ratings: Vec<u8> = product
        .ratings
        .iter()
        .filter_map(|r| u8::try_from(r.value()).ok())
        .filter(|r| (RATING_MIN..=RATING_MAX).contains(r))
        .collect();
    if ratings.len() != product.ratings.len() {
        tracing::debug!(
            item_id = product.id,
            dropped = product.ratings.len() - ratings.len(),
            "Dropped out-of-range ratings"
        );
    }

    let on_sale = product
        .on_sale
        .unwrap_or_else(|| is_discounted(product.price, product.compare_at_price));

    Item {
        id: ItemId::new(product.id),
        title: product.title,
        description: product.description.unwrap_or_default(),
        price: product.price,
        compare_at_price: product.compare_at_price,
        category: product
            .category
            .as_deref()
            .map_or(Category::Other, Category::from_wire),
        clothing_type: product.clothing_type.filter(|t| !t.trim().is_empty()),
        occasions: normalize_tags(product.occasions),
        sizes: normalize_tags(product.sizes),
        colors: normalize_tags(product.colors),
        is_new_arrival: product.is_new_arrival.unwrap_or(false),
        on_sale,
        created_at: product.created_at,
        view_count: product.view_count,
        sales_count: product.sales_count,
        ratings,
        seller_id: SellerId::new(product.seller_id),
    }
}

pub fn convert_products(products: Vec<ProductDto>) -> Vec<Item> {
    products.into_iter().map(convert_product).collect()
}

/// Trim tags and drop blanks, keeping original casing.
fn normalize_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// =============================================================================
// Order Conversions
// =============================================================================

/// Convert an order, skipping it if its status is unknown.
pub fn convert_order(order: OrderDto) -> Option<Order> {
    let status = match order.status.parse::<OrderStatus>() {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(order_id = order.id, error = %e, "Skipping order with unknown status");
            return None;
        }
    };

    Some(Order {
        id: OrderId::new(order.id),
        order_number: order
            .order_number
            .unwrap_or_else(|| format!("#{}", order.id)),
        seller_id: SellerId::new(order.seller_id),
        customer_name: order.customer_name.unwrap_or_default(),
        status,
        total: order.total,
        item_count: order.item_count,
        created_at: order.created_at,
        updated_at: order.updated_at.unwrap_or(order.created_at),
    })
}

pub fn convert_orders(orders: Vec<OrderDto>) -> Vec<Order> {
    orders.into_iter().filter_map(convert_order).collect()
}

pub const fn convert_order_stats(stats: OrderStatsDto) -> OrderStats {
    OrderStats {
        total: stats.total,
        pending: stats.pending,
        processing: stats.processing,
        shipped: stats.shipped,
        delivered: stats.delivered,
        cancelled: stats.cancelled,
        revenue: stats.revenue,
    }
}

// =============================================================================
// Notification Conversions
// =============================================================================

pub fn convert_notification(notification: NotificationDto) -> Notification {
    let kind = notification
        .kind
        .as_deref()
        .map_or(NotificationKind::Other, NotificationKind::from_wire);

    Notification {
        id: NotificationId::new(notification.id),
        kind,
        title: notification
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(kind).to_string()),
        message: notification.message,
        read: notification.read,
        created_at: notification.created_at,
        link: notification.link,
    }
}

const fn default_title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Order => "Order update",
        NotificationKind::Stock => "Stock alert",
        NotificationKind::Review => "New review",
        NotificationKind::System | NotificationKind::Other => "Notification",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::super::types::{NotificationsResponse, OrdersResponse, ProductsResponse};
    use super::*;

    #[test]
    fn test_convert_product_maps_fields() {
        let json = r#"{
            "products": [{
                "id": 12,
                "name": "Linen Shirt",
                "description": "Breathable",
                "price": 49.5,
                "originalPrice": "79.00",
                "category": "Men",
                "type": "shirt",
                "occasion": ["casual", " "],
                "sizes": ["M", "L"],
                "colors": ["White"],
                "createdAt": "2026-10-01T00:00:00Z",
                "views": 300,
                "sales": 7,
                "ratings": [5, {"rating": 4}, 9],
                "sellerId": 3
            }]
        }"#;
        let response: ProductsResponse = serde_json::from_str(json).unwrap();
        let item = convert_products(response.products).remove(0);

        assert_eq!(item.id, ItemId::new(12));
        assert_eq!(item.title, "Linen Shirt");
        assert_eq!(item.price, Decimal::new(495, 1));
        assert_eq!(item.category, Category::Men);
        assert_eq!(item.clothing_type.as_deref(), Some("shirt"));
        assert_eq!(item.occasions.len(), 1);
        assert!(item.on_sale, "compare-at price above price implies on sale");
        assert!(!item.is_new_arrival);
        assert_eq!(item.view_count, 300);
        assert_eq!(item.sales_count, 7);
        assert_eq!(item.ratings, vec![5, 4], "out-of-range rating dropped");
        assert_eq!(item.seller_id, SellerId::new(3));
    }

    #[test]
    fn test_explicit_on_sale_flag_wins() {
        let json = r#"{"id": 1, "title": "Cap", "price": 10, "originalPrice": 20,
            "onSale": false, "createdAt": "2026-10-01T00:00:00Z", "sellerId": 1}"#;
        let item = convert_product(serde_json::from_str(json).unwrap());
        assert!(!item.on_sale);
        assert_eq!(item.category, Category::Other);
    }

    #[test]
    fn test_convert_orders_skips_unknown_status() {
        let json = r#"{
            "orders": [
                {"id": 1, "sellerId": 2, "status": "pending", "total": "20.00",
                 "createdAt": "2026-10-01T00:00:00Z"},
                {"id": 2, "sellerId": 2, "status": "teleported", "total": "5",
                 "createdAt": "2026-10-01T00:00:00Z"}
            ],
            "stats": {"totalOrders": 2, "pending": 1, "totalRevenue": 25}
        }"#;
        let response: OrdersResponse = serde_json::from_str(json).unwrap();
        let orders = convert_orders(response.orders);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_number, "#1");
        assert_eq!(orders[0].updated_at, orders[0].created_at);

        let stats = convert_order_stats(response.stats.unwrap());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.revenue, Decimal::from(25));
    }

    #[test]
    fn test_convert_notification_defaults() {
        let json = r#"{"notifications": [{"id": 5, "type": "low_stock",
            "message": "Only 2 left", "isRead": false,
            "createdAt": "2026-10-01T00:00:00Z"}], "unreadCount": 1}"#;
        let response: NotificationsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.unread_count, 1);

        let notification = convert_notification(response.notifications.into_iter().next().unwrap());
        assert_eq!(notification.kind, NotificationKind::Stock);
        assert_eq!(notification.title, "Stock alert");
        assert!(!notification.read);
    }
}
