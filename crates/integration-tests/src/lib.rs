//! Integration test harness for Storeline.
//!
//! [`FakeMarketplace`] serves the Catalog, Order and Notification services
//! in-process with `axum` on an ephemeral port. Tests seed it with JSON
//! records, point a [`ClientState`] at it, and drive the real HTTP clients
//! end to end, durable file storage included.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storeline-integration-tests
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use storeline_storefront::catalog::TrendingSource;
use storeline_storefront::clock::Clock;
use storeline_storefront::config::{ApiConfig, SyncConfig};
use storeline_storefront::state::ClientState;
use storeline_storefront::storage::FileStorage;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Timestamp every fixture is relative to: 2024-06-01T00:00:00Z.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_717_200_000, 0).unwrap_or_default()
}

// =============================================================================
// Fixtures
// =============================================================================

/// A product record as the Catalog Service sends it.
#[must_use]
pub fn product(id: i64, category: &str, price: &str, sales: u64) -> Value {
    json!({
        "id": id,
        "title": format!("Product {id}"),
        "description": "Organic cotton",
        "price": price,
        "category": category,
        "type": "tops",
        "occasions": ["casual"],
        "sizes": ["S", "M"],
        "colors": ["Black"],
        "isNewArrival": false,
        "onSale": false,
        "createdAt": "2024-05-25T00:00:00Z",
        "viewCount": 100,
        "salesCount": sales,
        "ratings": [4, { "rating": 5 }],
        "sellerId": 1
    })
}

/// An order record as the Order Service sends it.
#[must_use]
pub fn order(id: i64, seller: i64, status: &str, total: &str) -> Value {
    json!({
        "id": id,
        "orderNumber": format!("SL-{id:05}"),
        "sellerId": seller,
        "customerName": "Ada Lovelace",
        "status": status,
        "total": total,
        "itemCount": 1,
        "createdAt": "2024-05-30T12:00:00Z",
        "updatedAt": "2024-05-30T12:00:00Z"
    })
}

/// A notification record as the Notification Service sends it.
#[must_use]
pub fn notification(id: i64, kind: &str, read: bool) -> Value {
    json!({
        "id": id,
        "type": kind,
        "title": format!("Notification {id}"),
        "message": "Something happened",
        "read": read,
        "createdAt": "2024-05-31T08:00:00Z"
    })
}

// =============================================================================
// Fake services
// =============================================================================

/// A failure applied to every request while set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// `503 Service Unavailable`
    Unavailable,
    /// `429 Too Many Requests` with a `Retry-After` in seconds.
    RateLimited(u64),
}

/// A request the fake services received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

#[derive(Default)]
struct Market {
    products: Mutex<Vec<Value>>,
    orders: Mutex<Vec<Value>>,
    notifications: Mutex<Vec<Value>>,
    failure: Mutex<Option<Failure>>,
    requests: Mutex<Vec<Recorded>>,
}

/// The marketplace services, served on `127.0.0.1` at an ephemeral port.
///
/// The server task is aborted when this is dropped.
pub struct FakeMarketplace {
    addr: SocketAddr,
    market: Arc<Market>,
    task: JoinHandle<()>,
}

impl FakeMarketplace {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let market = Arc::new(Market::default());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake marketplace");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake marketplace address");

        let app = router(Arc::clone(&market));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake marketplace stopped");
            }
        });

        Self { addr, market, task }
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Configuration pointing at this server, caching under `cache_dir`.
    ///
    /// # Panics
    ///
    /// Panics if the server URL is rejected, which would be a harness bug.
    #[must_use]
    pub fn config(&self, cache_dir: &Path) -> SyncConfig {
        SyncConfig {
            api: ApiConfig::new(&self.url()).expect("Fake marketplace URL is valid"),
            cache_dir: cache_dir.to_path_buf(),
            catalog_ttl: Duration::from_secs(300),
            reconcile_interval: Duration::from_millis(50),
            notification_poll_interval: Duration::from_millis(50),
            trending_limit: 50,
            trending_source: TrendingSource::Client,
            notification_limit: 20,
            shown_notifications_cap: 500,
            sentry_dsn: None,
        }
    }

    /// Client state over per-origin file storage under `config.cache_dir`.
    ///
    /// # Panics
    ///
    /// Panics if the cache directory cannot be created.
    #[must_use]
    pub fn client(&self, config: SyncConfig, clock: Arc<dyn Clock>) -> ClientState {
        let storage = FileStorage::for_origin(&config.cache_dir, &config.api.base_url)
            .expect("Failed to open cache directory");
        ClientState::with_storage(config, Arc::new(storage), clock)
            .expect("Failed to build client state")
    }

    pub fn set_products(&self, products: Vec<Value>) {
        *self.market.products.lock() = products;
    }

    pub fn push_product(&self, product: Value) {
        self.market.products.lock().push(product);
    }

    pub fn set_orders(&self, orders: Vec<Value>) {
        *self.market.orders.lock() = orders;
    }

    /// Status of order `id` as the service currently holds it.
    #[must_use]
    pub fn order_status(&self, id: i64) -> Option<String> {
        self.market
            .orders
            .lock()
            .iter()
            .find(|o| o["id"] == id)
            .and_then(|o| o["status"].as_str().map(str::to_string))
    }

    /// Add a notification as the newest one.
    pub fn push_notification(&self, notification: Value) {
        self.market.notifications.lock().insert(0, notification);
    }

    #[must_use]
    pub fn notification(&self, id: i64) -> Option<Value> {
        self.market
            .notifications
            .lock()
            .iter()
            .find(|n| n["id"] == id)
            .cloned()
    }

    /// Fail every request with `failure` until cleared with `None`.
    pub fn fail(&self, failure: Option<Failure>) {
        *self.market.failure.lock() = failure;
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.market.requests.lock().clone()
    }

    /// Requests received with `method` on exactly `path`.
    #[must_use]
    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.market
            .requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.market.requests.lock().clear();
    }
}

impl Drop for FakeMarketplace {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(market: Arc<Market>) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/trending", get(trending_products))
        .route("/api/products/count", get(count_products))
        .route("/api/sellers/{seller}/orders", get(list_orders))
        .route("/api/orders/{order}/status", patch(update_order_status))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", patch(mark_notification_read))
        .route("/api/notifications/{id}", delete(delete_notification))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&market),
            record_and_fail,
        ))
        .with_state(market)
}

async fn record_and_fail(State(market): State<Arc<Market>>, request: Request, next: Next) -> Response {
    market.requests.lock().push(Recorded {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
    });

    let failure = *market.failure.lock();
    match failure {
        Some(Failure::Unavailable) => {
            (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response()
        }
        Some(Failure::RateLimited(secs)) => (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", secs.to_string())],
            "slow down",
        )
            .into_response(),
        None => next.run(request).await,
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductQuery {
    category: Option<String>,
    #[serde(default)]
    on_sale: bool,
    #[serde(default)]
    new_arrivals: bool,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

async fn list_products(
    State(market): State<Arc<Market>>,
    Query(query): Query<ProductQuery>,
) -> Json<Value> {
    let products: Vec<Value> = market
        .products
        .lock()
        .iter()
        .filter(|p| {
            query
                .category
                .as_deref()
                .is_none_or(|category| p["category"] == category)
                && (!query.on_sale || p["onSale"] == true)
                && (!query.new_arrivals || p["isNewArrival"] == true)
        })
        .cloned()
        .collect();
    Json(json!({ "products": products }))
}

async fn trending_products(
    State(market): State<Arc<Market>>,
    Query(query): Query<LimitQuery>,
) -> Json<Value> {
    let mut products = market.products.lock().clone();
    products.sort_by_key(|p| std::cmp::Reverse(p["salesCount"].as_u64().unwrap_or(0)));
    products.truncate(query.limit.unwrap_or(usize::MAX));
    Json(json!({ "products": products }))
}

async fn count_products(State(market): State<Arc<Market>>) -> Json<Value> {
    Json(json!({ "count": market.products.lock().len() }))
}

async fn list_orders(
    State(market): State<Arc<Market>>,
    UrlPath(seller): UrlPath<i64>,
    Query(query): Query<StatusQuery>,
) -> Json<Value> {
    let orders: Vec<Value> = market
        .orders
        .lock()
        .iter()
        .filter(|o| {
            o["sellerId"] == seller
                && query
                    .status
                    .as_deref()
                    .is_none_or(|status| o["status"] == status)
        })
        .cloned()
        .collect();
    Json(json!({ "orders": orders }))
}

async fn update_order_status(
    State(market): State<Arc<Market>>,
    UrlPath(order): UrlPath<i64>,
    Json(body): Json<StatusBody>,
) -> StatusCode {
    let mut orders = market.orders.lock();
    match orders.iter_mut().find(|o| o["id"] == order) {
        Some(record) => {
            record["status"] = json!(body.status);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_notifications(
    State(market): State<Arc<Market>>,
    Query(query): Query<LimitQuery>,
) -> Json<Value> {
    let notifications = market.notifications.lock();
    let unread = notifications.iter().filter(|n| n["read"] == false).count();
    let recent: Vec<&Value> = notifications
        .iter()
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    Json(json!({ "notifications": recent, "unreadCount": unread }))
}

async fn mark_notification_read(
    State(market): State<Arc<Market>>,
    UrlPath(id): UrlPath<i64>,
) -> StatusCode {
    let mut notifications = market.notifications.lock();
    match notifications.iter_mut().find(|n| n["id"] == id) {
        Some(record) => {
            record["read"] = json!(true);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_notification(
    State(market): State<Arc<Market>>,
    UrlPath(id): UrlPath<i64>,
) -> StatusCode {
    let mut notifications = market.notifications.lock();
    let before = notifications.len();
    notifications.retain(|n| n["id"] != id);
    if notifications.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}
