use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{Caller, WorkflowError, bounded};
use crate::model::{LeaveRequestId, NewNotification, Notification, NotificationId, UserId};
use crate::notify::PushChannel;
use crate::store::{NotificationStore, UserStore};

/// Event name live clients listen for.
pub const NOTIFICATION_EVENT: &str = "ReceiveNotification";

/// A persisted notification and how its live push went.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub notification: Notification,
    /// Set when the push could not be handed to the channel.
    pub push_failure: Option<String>,
}

pub struct NotificationDispatcher {
    users: Arc<dyn UserStore>,
    notifications: Arc<dyn NotificationStore>,
    push: Arc<dyn PushChannel>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserStore>,
        notifications: Arc<dyn NotificationStore>,
        push: Arc<dyn PushChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            notifications,
            push,
            timeout,
        }
    }

    /// Persists first, then pushes. The row is the durable record; a failed
    /// push only shows up in [`Delivery::push_failure`].
    pub async fn notify(
        &self,
        user_id: UserId,
        message: impl Into<String>,
        leave_request_id: Option<LeaveRequestId>,
    ) -> Result<Delivery, WorkflowError> {
        let recipient = bounded(self.timeout, "user lookup", self.users.find_user(user_id)).await?;
        if recipient.is_none() {
            return Err(WorkflowError::UnknownRecipient(user_id));
        }

        let notification = bounded(
            self.timeout,
            "notification insert",
            self.notifications.insert_notification(NewNotification {
                user_id,
                leave_request_id,
                message: message.into(),
            }),
        )
        .await?;

        let payload = json!({
            "id": notification.id,
            "message": notification.message,
            "leave_request_id": notification.leave_request_id,
            "created_at": notification.created_at,
        });
        let push_failure = match tokio::time::timeout(
            self.timeout,
            self.push.send_to_user(user_id, NOTIFICATION_EVENT, &payload),
        )
        .await
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("push timed out after {}ms", self.timeout.as_millis())),
        };

        if let Some(reason) = &push_failure {
            tracing::warn!(
                user_id = user_id.0,
                notification_id = notification.id.0,
                reason = %reason,
                "Live push failed, notification kept for later reading"
            );
        }

        Ok(Delivery {
            notification,
            push_failure,
        })
    }

    /// Only the addressee may mark a notification; repeating it is a no-op.
    pub async fn mark_read(
        &self,
        caller: &Caller,
        id: NotificationId,
    ) -> Result<Notification, WorkflowError> {
        let mut notification = bounded(
            self.timeout,
            "notification lookup",
            self.notifications.find_notification(id),
        )
        .await?
        .ok_or(WorkflowError::NotFound {
            entity: "notification",
            id: id.0,
        })?;

        if notification.user_id != caller.user_id {
            return Err(WorkflowError::Forbidden(
                "Notification belongs to another user".into(),
            ));
        }

        if !notification.is_read {
            bounded(
                self.timeout,
                "notification update",
                self.notifications.mark_read(id),
            )
            .await?;
            notification.is_read = true;
        }
        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, WorkflowError> {
        bounded(
            self.timeout,
            "notification list",
            self.notifications.list_notifications(user_id),
        )
        .await
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<u64, WorkflowError> {
        bounded(
            self.timeout,
            "notification count",
            self.notifications.unread_count(user_id),
        )
        .await
    }
}
