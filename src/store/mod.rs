use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest, NewNotification, NewUser,
    Notification, NotificationId, Role, RoleSet, User, UserId,
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[cfg(test)]
pub use memory::InMemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate entry: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Users holding `role`, oldest account first.
    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
    /// Replaces the role set. `None` when the user does not exist.
    async fn set_roles(&self, id: UserId, roles: &RoleSet) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert_leave(&self, leave: NewLeaveRequest) -> Result<LeaveRequest, StoreError>;
    async fn find_leave(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError>;
    /// Newest first; `None` lists every employee's requests.
    async fn list_leaves(
        &self,
        employee_id: Option<UserId>,
    ) -> Result<Vec<LeaveRequest>, StoreError>;
    /// Compare-and-set on `status = pending`. Returns `None` when the row is
    /// missing or someone else already decided it.
    async fn decide_leave(
        &self,
        id: LeaveRequestId,
        status: LeaveStatus,
        approver_id: UserId,
        comments: Option<&str>,
    ) -> Result<Option<LeaveRequest>, StoreError>;
    /// Deletes the request only while it is still pending and owned by
    /// `employee_id`; notifications pointing at it lose the link. `false`
    /// when nothing matched.
    async fn withdraw_leave(
        &self,
        id: LeaveRequestId,
        employee_id: UserId,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;
    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StoreError>;
    async fn mark_read(&self, id: NotificationId) -> Result<(), StoreError>;
    /// Newest first.
    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError>;
    async fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError>;
}

/// The three persistence seams, usually backed by one implementation.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub leaves: Arc<dyn LeaveStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + LeaveStore + NotificationStore + 'static,
    {
        Self {
            users: store.clone(),
            leaves: store.clone(),
            notifications: store,
        }
    }
}
