//! Synchronization layer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORELINE_API_URL` - Base URL of the marketplace services
//!
//! ## Optional
//! - `STORELINE_API_TOKEN` - Bearer token sent with every request
//! - `STORELINE_CACHE_DIR` - Root of the durable cache (default: .storeline-cache)
//! - `STORELINE_CATALOG_TTL_SECS` - Catalog snapshot TTL (default: 300)
//! - `STORELINE_RECONCILE_INTERVAL_SECS` - Sentinel probe period (default: 30)
//! - `STORELINE_NOTIFICATION_POLL_SECS` - Notification poll period (default: 30)
//! - `STORELINE_TRENDING_LIMIT` - Length of the trending view (default: 50)
//! - `STORELINE_TRENDING_SOURCE` - `client` or `server` (default: client)
//! - `STORELINE_NOTIFICATION_LIMIT` - Notifications fetched per poll (default: 20)
//! - `STORELINE_SHOWN_NOTIFICATIONS_CAP` - Shown-set capacity (default: 500)
//! - `STORELINE_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::catalog::{CatalogOptions, TrendingSource};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Synchronization layer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Marketplace service access
    pub api: ApiConfig,
    /// Root directory of the durable cache; each service origin gets its own
    /// subdirectory
    pub cache_dir: PathBuf,
    /// Catalog snapshot time-to-live
    pub catalog_ttl: Duration,
    /// Period of the catalog sentinel probe
    pub reconcile_interval: Duration,
    /// Period of the notification poll
    pub notification_poll_interval: Duration,
    /// Number of items in the trending view
    pub trending_limit: usize,
    /// Where the trending view comes from
    pub trending_source: TrendingSource,
    /// Number of notifications fetched per poll
    pub notification_limit: usize,
    /// Capacity of the persisted shown-notification set
    pub shown_notifications_cap: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Marketplace service access configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL, always ending in `/` so relative paths join under it
    pub base_url: Url,
    /// Optional bearer token
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            cache_dir: PathBuf::from(get_env_or_default("STORELINE_CACHE_DIR", ".storeline-cache")),
            catalog_ttl: get_secs("STORELINE_CATALOG_TTL_SECS", 300)?,
            reconcile_interval: get_secs("STORELINE_RECONCILE_INTERVAL_SECS", 30)?,
            notification_poll_interval: get_secs("STORELINE_NOTIFICATION_POLL_SECS", 30)?,
            trending_limit: get_positive("STORELINE_TRENDING_LIMIT", 50)?,
            trending_source: get_parsed("STORELINE_TRENDING_SOURCE", "client")?,
            notification_limit: get_positive("STORELINE_NOTIFICATION_LIMIT", 20)?,
            shown_notifications_cap: get_positive("STORELINE_SHOWN_NOTIFICATIONS_CAP", 500)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// Catalog cache tunables.
    #[must_use]
    pub const fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            ttl: self.catalog_ttl,
            trending_limit: self.trending_limit,
            trending_source: self.trending_source,
        }
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("STORELINE_API_URL")?;
        Ok(Self {
            base_url: parse_base_url(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("STORELINE_API_URL".to_string(), e))?,
            token: get_optional_env("STORELINE_API_TOKEN")
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            request_timeout: get_secs("STORELINE_REQUEST_TIMEOUT_SECS", 10)?,
        })
    }

    /// Config for `base_url` with no token and the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)
                .map_err(|e| ConfigError::InvalidEnvVar("STORELINE_API_URL".to_string(), e))?,
            token: None,
            request_timeout: Duration::from_secs(10),
        })
    }
}

/// Parse and normalize the service base URL.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("URL must have a host".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a count that must be at least 1.
fn get_positive(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value: usize = get_parsed(key, &default.to_string())?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than 0".to_string(),
        ));
    }
    Ok(value)
}

/// Parse a whole number of seconds that must be at least 1.
fn get_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = get_parsed(key, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than 0".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
