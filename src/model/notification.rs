use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{leave_request::LeaveRequestId, user::UserId};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    /// Request that triggered the notification, when there is one.
    pub leave_request_id: Option<LeaveRequestId>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub leave_request_id: Option<LeaveRequestId>,
    pub message: String,
}
