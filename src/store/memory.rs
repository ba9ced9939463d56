use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{LeaveStore, NotificationStore, StoreError, UserStore};
use crate::model::{
    LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest, NewNotification, NewUser,
    Notification, NotificationId, Role, RoleSet, User, UserId,
};

#[derive(Default)]
struct State {
    users: BTreeMap<u64, User>,
    leaves: BTreeMap<u64, LeaveRequest>,
    notifications: BTreeMap<u64, Notification>,
    next_id: u64,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store used by the workflow tests. One lock guards everything, so the
/// pending check in `decide_leave` is atomic with the update.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub async fn leave_count(&self) -> usize {
        self.state.read().await.leaves.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.read().await.notifications.len()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }

        let id = state.allocate();
        let created = User {
            id: UserId(id),
            display_name: user.display_name,
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles,
            created_at: Utc::now(),
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&id.0).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.roles.contains(role))
            .cloned()
            .collect())
    }

    async fn set_roles(&self, id: UserId, roles: &RoleSet) -> Result<Option<User>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.users.get_mut(&id.0).map(|user| {
            user.roles = roles.clone();
            user.clone()
        }))
    }
}

#[async_trait]
impl LeaveStore for InMemoryStore {
    async fn insert_leave(&self, leave: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        let mut state = self.state.write().await;
        let id = state.allocate();
        let created = LeaveRequest {
            id: LeaveRequestId(id),
            employee_id: leave.employee_id,
            start_date: leave.start_date,
            end_date: leave.end_date,
            leave_type: leave.leave_type,
            comments: leave.comments,
            status: LeaveStatus::Pending,
            created_at: Utc::now(),
            approver_id: None,
        };
        state.leaves.insert(id, created.clone());
        Ok(created)
    }

    async fn find_leave(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError> {
        Ok(self.state.read().await.leaves.get(&id.0).cloned())
    }

    async fn list_leaves(
        &self,
        employee_id: Option<UserId>,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let state = self.state.read().await;
        let mut leaves: Vec<LeaveRequest> = state
            .leaves
            .values()
            .filter(|l| employee_id.is_none_or(|e| l.employee_id == e))
            .cloned()
            .collect();
        leaves.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(leaves)
    }

    async fn decide_leave(
        &self,
        id: LeaveRequestId,
        status: LeaveStatus,
        approver_id: UserId,
        comments: Option<&str>,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        let mut state = self.state.write().await;
        let Some(leave) = state.leaves.get_mut(&id.0) else {
            return Ok(None);
        };
        if leave.status != LeaveStatus::Pending {
            return Ok(None);
        }

        leave.status = status;
        leave.approver_id = Some(approver_id);
        if let Some(comments) = comments {
            leave.comments = Some(comments.to_owned());
        }
        Ok(Some(leave.clone()))
    }

    async fn withdraw_leave(
        &self,
        id: LeaveRequestId,
        employee_id: UserId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let withdrawable = state
            .leaves
            .get(&id.0)
            .is_some_and(|l| l.status == LeaveStatus::Pending && l.employee_id == employee_id);
        if !withdrawable {
            return Ok(false);
        }

        state.leaves.remove(&id.0);
        for notification in state.notifications.values_mut() {
            if notification.leave_request_id == Some(id) {
                notification.leave_request_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut state = self.state.write().await;
        let id = state.allocate();
        let created = Notification {
            id: NotificationId(id),
            user_id: notification.user_id,
            leave_request_id: notification.leave_request_id,
            message: notification.message,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.insert(id, created.clone());
        Ok(created)
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StoreError> {
        Ok(self.state.read().await.notifications.get(&id.0).cloned())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StoreError> {
        if let Some(n) = self.state.write().await.notifications.get_mut(&id.0) {
            n.is_read = true;
        }
        Ok(())
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.read().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }
}
