//! Fixtures and in-memory service fakes for unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use storeline_core::{
    Category, Item, ItemId, Notification, NotificationId, NotificationKind, Order, OrderId,
    OrderStatus, SellerId,
};
use tokio::sync::watch;

use crate::api::ServiceError;
use crate::catalog::{CatalogSource, ViewQuery};
use crate::notifications::{NotificationFeed, NotificationSource};
use crate::orders::{OrderPage, OrderSource};

pub fn item(id: i64) -> Item {
    Item {
        id: ItemId::new(id),
        title: format!("Item {id}"),
        description: String::new(),
        price: Decimal::from(10),
        compare_at_price: None,
        category: Category::Unisex,
        clothing_type: None,
        occasions: BTreeSet::new(),
        sizes: BTreeSet::new(),
        colors: BTreeSet::new(),
        is_new_arrival: false,
        on_sale: false,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        view_count: 0,
        sales_count: 0,
        ratings: Vec::new(),
        seller_id: SellerId::new(1),
    }
}

pub fn order(id: i64, status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(id),
        order_number: format!("#{id}"),
        seller_id: SellerId::new(1),
        customer_name: "Sam".to_string(),
        status,
        total: Decimal::from(20),
        item_count: 1,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        updated_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

pub fn notification(id: i64, read: bool) -> Notification {
    Notification {
        id: NotificationId::new(id),
        kind: NotificationKind::Order,
        title: format!("Notification {id}"),
        message: String::new(),
        read,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
        link: None,
    }
}

fn unavailable() -> ServiceError {
    ServiceError::Status {
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        body: "unavailable".to_string(),
    }
}

/// Holds fake calls until opened. Starts open.
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self { open }
    }

    pub fn close(&self) {
        self.open.send_replace(false);
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub async fn pass(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub struct FakeCatalog {
    items: Mutex<Vec<Item>>,
    server_trending: Mutex<Vec<Item>>,
    count_override: Mutex<Option<u64>>,
    failing_query: Mutex<Option<ViewQuery>>,
    fail_count: AtomicBool,
    full_fetches: AtomicUsize,
    count_calls: AtomicUsize,
    trending_calls: AtomicUsize,
    builds_in_flight: AtomicUsize,
    max_builds_in_flight: AtomicUsize,
    pub gate: Gate,
}

impl FakeCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: Mutex::new(items),
            server_trending: Mutex::new(Vec::new()),
            count_override: Mutex::new(None),
            failing_query: Mutex::new(None),
            fail_count: AtomicBool::new(false),
            full_fetches: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            trending_calls: AtomicUsize::new(0),
            builds_in_flight: AtomicUsize::new(0),
            max_builds_in_flight: AtomicUsize::new(0),
            gate: Gate::new(),
        }
    }

    pub fn set_items(&self, items: Vec<Item>) {
        *self.items.lock() = items;
    }

    pub fn set_server_trending(&self, items: Vec<Item>) {
        *self.server_trending.lock() = items;
    }

    /// Report `count` from the probe regardless of the item list.
    pub fn set_count(&self, count: Option<u64>) {
        *self.count_override.lock() = count;
    }

    /// Fail every list call for `query`.
    pub fn fail_query(&self, query: Option<ViewQuery>) {
        *self.failing_query.lock() = query;
    }

    pub fn fail_count(&self, fail: bool) {
        self.fail_count.store(fail, Ordering::SeqCst);
    }

    /// Number of unfiltered list calls, one per build.
    pub fn full_fetches(&self) -> usize {
        self.full_fetches.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn trending_calls(&self) -> usize {
        self.trending_calls.load(Ordering::SeqCst)
    }

    pub fn max_builds_in_flight(&self) -> usize {
        self.max_builds_in_flight.load(Ordering::SeqCst)
    }
}

impl CatalogSource for FakeCatalog {
    async fn list_products(&self, query: ViewQuery) -> Result<Vec<Item>, ServiceError> {
        let full = query == ViewQuery::ALL;
        if full {
            self.full_fetches.fetch_add(1, Ordering::SeqCst);
            let in_flight = self.builds_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_builds_in_flight
                .fetch_max(in_flight, Ordering::SeqCst);
        }

        self.gate.pass().await;

        if full {
            self.builds_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if *self.failing_query.lock() == Some(query) {
            return Err(unavailable());
        }
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect())
    }

    async fn trending(&self, limit: usize) -> Result<Vec<Item>, ServiceError> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .server_trending
            .lock()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn item_count(&self) -> Result<u64, ServiceError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let count = *self.count_override.lock();
        Ok(count.unwrap_or(self.items.lock().len() as u64))
    }
}

// =============================================================================
// Orders
// =============================================================================

pub struct FakeOrders {
    orders: Mutex<Vec<Order>>,
    fail: AtomicBool,
    full_fetches: AtomicUsize,
    status_updates: AtomicUsize,
    pub gate: Gate,
}

impl FakeOrders {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: Mutex::new(orders),
            fail: AtomicBool::new(false),
            full_fetches: AtomicUsize::new(0),
            status_updates: AtomicUsize::new(0),
            gate: Gate::new(),
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of unfiltered list calls, one per refresh.
    pub fn full_fetches(&self) -> usize {
        self.full_fetches.load(Ordering::SeqCst)
    }

    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }
}

impl OrderSource for FakeOrders {
    async fn list_orders(
        &self,
        _seller: SellerId,
        status: Option<OrderStatus>,
    ) -> Result<OrderPage, ServiceError> {
        if status.is_none() {
            self.full_fetches.fetch_add(1, Ordering::SeqCst);
        }
        // Read before waiting so a held call returns data from before any
        // concurrent mutation
        let orders: Vec<Order> = self
            .orders
            .lock()
            .iter()
            .filter(|order| status.is_none_or(|s| order.status == s))
            .cloned()
            .collect();

        self.gate.pass().await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(OrderPage {
            orders,
            stats: None,
        })
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), ServiceError> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut orders = self.orders.lock();
        let order = orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("api/orders/{id}/status")))?;
        order.status = status;
        Ok(())
    }
}

// =============================================================================
// Notifications
// =============================================================================

pub struct FakeNotifications {
    notifications: Mutex<Vec<Notification>>,
    fail: AtomicBool,
    list_calls: AtomicUsize,
    pub gate: Gate,
}

impl FakeNotifications {
    pub fn new(notifications: Vec<Notification>) -> Self {
        Self {
            notifications: Mutex::new(notifications),
            fail: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            gate: Gate::new(),
        }
    }

    pub fn push(&self, notification: Notification) {
        self.notifications.lock().insert(0, notification);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn is_read(&self, id: NotificationId) -> bool {
        self.notifications
            .lock()
            .iter()
            .any(|n| n.id == id && n.read)
    }
}

impl NotificationSource for FakeNotifications {
    async fn list(&self, limit: usize) -> Result<NotificationFeed, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let notifications = self.notifications.lock();
        Ok(NotificationFeed {
            unread_count: notifications.iter().filter(|n| !n.read).count() as u64,
            notifications: notifications.iter().take(limit).cloned().collect(),
        })
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), ServiceError> {
        let mut notifications = self.notifications.lock();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("api/notifications/{id}/read")))?;
        notification.read = true;
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> Result<(), ServiceError> {
        let mut notifications = self.notifications.lock();
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == before {
            return Err(ServiceError::NotFound(format!("api/notifications/{id}")));
        }
        Ok(())
    }
}
