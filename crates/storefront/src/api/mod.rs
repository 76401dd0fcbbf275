//! HTTP clients for the Catalog, Order and Notification services.
//!
//! # Architecture
//!
//! - Plain JSON over `reqwest`; one shared [`ApiClient`] per process
//! - Wire payloads deserialize into private DTOs (`types`) and are converted
//!   into `storeline_core` records (`conversions`) before leaving this module
//! - No caching here: the cache layers above decide when to call
//!
//! # Example
//!
//! ```rust,ignore
//! use storeline_storefront::api::{ApiClient, CatalogClient};
//!
//! let api = ApiClient::new(&config.api)?;
//! let catalog = CatalogClient::new(api.clone());
//! let count = catalog.item_count().await?;
//! ```

mod catalog;
mod conversions;
mod notifications;
mod orders;
mod types;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;

pub use catalog::CatalogClient;
pub use notifications::NotificationClient;
pub use orders::OrderClient;

/// Longest response body excerpt kept in errors and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors that can occur when calling a remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A request path could not be joined onto the base URL.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

// =============================================================================
// ApiClient
// =============================================================================

/// Shared HTTP client for all marketplace services.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                token: config
                    .token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
            }),
        })
    }

    /// Base URL all request paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// `GET` a JSON resource.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let text = self.execute(Method::GET, path, query, None::<&()>).await?;
        parse_body(path, &text)
    }

    /// Send a request with an optional JSON body and ignore the response body.
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ServiceError> {
        self.execute(method, path, &[], body).await.map(drop)
    }

    /// Execute a request and return the response body on success.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<String, ServiceError> {
        let url = self.inner.base_url.join(path)?;

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ServiceError::RateLimited(retry_after));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(path.to_string()));
        }

        // Get response body as text first for better error diagnostics
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                path,
                body = %excerpt(&text),
                "Service returned non-success status"
            );
            return Err(ServiceError::Status {
                status,
                body: excerpt(&text),
            });
        }

        Ok(text)
    }
}

fn parse_body<T: DeserializeOwned>(path: &str, text: &str) -> Result<T, ServiceError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(
            error = %e,
            path,
            body = %excerpt(text),
            "Failed to parse service response"
        );
        ServiceError::Parse(e)
    })
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::NotFound("/api/products/9".to_string());
        assert_eq!(err.to_string(), "Not found: /api/products/9");

        let err = ServiceError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ServiceError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_client_builds_from_config() {
        let mut config = ApiConfig::new("https://market.example.com").unwrap();
        config.request_timeout = std::time::Duration::from_secs(3);

        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url().host_str(), Some("market.example.com"));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(500);
        assert_eq!(excerpt(&long).chars().count(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_parse_body_reports_parse_errors() {
        let result: Result<Vec<u32>, _> = parse_body("/x", "nope");
        assert!(matches!(result, Err(ServiceError::Parse(_))));
    }
}
