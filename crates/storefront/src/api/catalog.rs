//! Catalog Service client.

use storeline_core::Item;
use tracing::{debug, instrument};

use super::conversions::convert_products;
use super::types::{CountResponse, ProductsResponse};
use super::{ApiClient, ServiceError};
use crate::catalog::{CatalogSource, ViewQuery};

/// Client for the Catalog Service's product endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
}

impl CatalogClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

/// Query parameters for a filtered product listing.
fn list_params(query: ViewQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(category) = query.category {
        params.push(("category", category.as_str().to_string()));
    }
    if query.on_sale {
        params.push(("onSale", "true".to_string()));
    }
    if query.new_arrivals {
        params.push(("newArrivals", "true".to_string()));
    }
    params
}

impl CatalogSource for CatalogClient {
    #[instrument(skip(self))]
    async fn list_products(&self, query: ViewQuery) -> Result<Vec<Item>, ServiceError> {
        let response: ProductsResponse = self.api.get("api/products", &list_params(query)).await?;
        debug!(count = response.products.len(), "Fetched products");
        Ok(convert_products(response.products))
    }

    #[instrument(skip(self))]
    async fn trending(&self, limit: usize) -> Result<Vec<Item>, ServiceError> {
        let response: ProductsResponse = self
            .api
            .get("api/products/trending", &[("limit", limit.to_string())])
            .await?;
        Ok(convert_products(response.products))
    }

    #[instrument(skip(self))]
    async fn item_count(&self) -> Result<u64, ServiceError> {
        let response: CountResponse = self.api.get("api/products/count", &[]).await?;
        Ok(response.count)
    }
}
