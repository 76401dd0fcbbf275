//! Unified error handling for the synchronization layer.
//!
//! Provides a crate-level `SyncError` that wraps the per-layer errors. Only
//! a cold start (no cached data and a failed first fetch) is meant to reach
//! the user; every other failure is logged and the last good data is kept.

use thiserror::Error;

use crate::api::ServiceError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Application-level error type for the synchronization layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote service call failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Durable storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// There was no cached data and the first fetch failed.
    #[error("No cached data and the first fetch failed: {0}")]
    ColdStart(#[source] ServiceError),

    /// The owning cache was torn down before the result could be applied.
    #[error("Cache has been torn down")]
    TornDown,
}

impl SyncError {
    /// Whether this error should be shown to the user as a hard failure.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::ColdStart(_) | Self::Config(_))
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::TornDown;
        assert_eq!(err.to_string(), "Cache has been torn down");

        let err = SyncError::ColdStart(ServiceError::NotFound("/api/products".to_string()));
        assert_eq!(
            err.to_string(),
            "No cached data and the first fetch failed: Not found: /api/products"
        );
    }

    #[test]
    fn test_only_cold_start_and_config_are_user_visible() {
        assert!(SyncError::ColdStart(ServiceError::NotFound("x".to_string())).is_user_visible());
        assert!(!SyncError::Service(ServiceError::RateLimited(5)).is_user_visible());
        assert!(!SyncError::TornDown.is_user_visible());
    }
}
