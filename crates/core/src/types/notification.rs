//! Notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::NotificationId;
use super::status::NotificationKind;

/// A notification as returned by the Notification Service.
///
/// `read` is the server-tracked flag. Whether the client has already shown a
/// transient alert for it is tracked separately and never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// In-app link the alert points at, if any.
    pub link: Option<String>,
}
