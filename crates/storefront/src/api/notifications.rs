//! Notification Service client.

use reqwest::Method;
use storeline_core::NotificationId;
use tracing::instrument;

use super::conversions::convert_notification;
use super::types::NotificationsResponse;
use super::{ApiClient, ServiceError};
use crate::notifications::{NotificationFeed, NotificationSource};

/// Client for the signed-in user's notifications.
#[derive(Clone)]
pub struct NotificationClient {
    api: ApiClient,
}

impl NotificationClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl NotificationSource for NotificationClient {
    #[instrument(skip(self))]
    async fn list(&self, limit: usize) -> Result<NotificationFeed, ServiceError> {
        let response: NotificationsResponse = self
            .api
            .get("api/notifications", &[("limit", limit.to_string())])
            .await?;

        Ok(NotificationFeed {
            notifications: response
                .notifications
                .into_iter()
                .map(convert_notification)
                .collect(),
            unread_count: response.unread_count,
        })
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn mark_read(&self, id: NotificationId) -> Result<(), ServiceError> {
        self.api
            .send(Method::PATCH, &format!("api/notifications/{id}/read"), None::<&()>)
            .await
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete(&self, id: NotificationId) -> Result<(), ServiceError> {
        self.api
            .send(Method::DELETE, &format!("api/notifications/{id}"), None::<&()>)
            .await
    }
}
