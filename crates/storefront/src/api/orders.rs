//! Order Service client.

use reqwest::Method;
use storeline_core::{OrderId, OrderStatus, SellerId};
use tracing::{debug, instrument};

use super::conversions::{convert_order_stats, convert_orders};
use super::types::{OrdersResponse, StatusUpdateRequest};
use super::{ApiClient, ServiceError};
use crate::orders::{OrderPage, OrderSource};

/// Client for a seller's order queue.
#[derive(Clone)]
pub struct OrderClient {
    api: ApiClient,
}

impl OrderClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl OrderSource for OrderClient {
    #[instrument(skip_all, fields(seller = %seller, status = ?status))]
    async fn list_orders(
        &self,
        seller: SellerId,
        status: Option<OrderStatus>,
    ) -> Result<OrderPage, ServiceError> {
        let query: Vec<(&str, String)> = status
            .map(|s| ("status", s.as_str().to_string()))
            .into_iter()
            .collect();
        let response: OrdersResponse = self
            .api
            .get(&format!("api/sellers/{seller}/orders"), &query)
            .await?;
        debug!(count = response.orders.len(), "Fetched orders");

        Ok(OrderPage {
            orders: convert_orders(response.orders),
            stats: response.stats.map(convert_order_stats),
        })
    }

    #[instrument(skip_all, fields(order = %order, status = status.as_str()))]
    async fn update_status(&self, order: OrderId, status: OrderStatus) -> Result<(), ServiceError> {
        self.api
            .send(
                Method::PATCH,
                &format!("api/orders/{order}/status"),
                Some(&StatusUpdateRequest {
                    status: status.as_str(),
                }),
            )
            .await
    }
}
