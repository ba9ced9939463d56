use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{LeaveStore, NotificationStore, StoreError, UserStore};
use crate::model::{
    LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest, NewNotification, NewUser,
    Notification, NotificationId, Role, RoleSet, User, UserId,
};

/// MySQL-backed persistence. Table layout lives in `db/schema.sql`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    display_name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    leave_type: String,
    comments: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    approver_id: Option<u64>,
}

#[derive(FromRow)]
struct NotificationRow {
    id: u64,
    user_id: u64,
    leave_request_id: Option<u64>,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, display_name, email, password_hash, created_at";
const LEAVE_COLUMNS: &str = "id, employee_id, start_date, end_date, leave_type, comments, \
                             status, created_at, approver_id";
const NOTIFICATION_COLUMNS: &str = "id, user_id, leave_request_id, message, is_read, created_at";

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<LeaveStatus>()
            .map_err(|_| StoreError::Decode(format!("unknown leave status `{}`", row.status)))?;

        Ok(LeaveRequest {
            id: LeaveRequestId(row.id),
            employee_id: UserId(row.employee_id),
            start_date: row.start_date,
            end_date: row.end_date,
            leave_type: row.leave_type,
            comments: row.comments,
            status,
            created_at: row.created_at,
            approver_id: row.approver_id.map(UserId),
        })
    }
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: NotificationId(row.id),
            user_id: UserId(row.user_id),
            leave_request_id: row.leave_request_id.map(LeaveRequestId),
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

impl MySqlStore {
    async fn load_roles(&self, user_id: u64) -> Result<RoleSet, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT role FROM user_roles WHERE user_id = ? ORDER BY role",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        names
            .into_iter()
            .map(|name| {
                name.parse::<Role>()
                    .map_err(|_| StoreError::Decode(format!("unknown role `{name}`")))
            })
            .collect()
    }

    async fn hydrate(&self, row: UserRow) -> Result<User, StoreError> {
        let roles = self.load_roles(row.id).await?;
        Ok(User {
            id: UserId(row.id),
            display_name: row.display_name,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (display_name, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_duplicate(&e) {
                StoreError::Conflict(format!("email {} already registered", user.email))
            } else {
                StoreError::Database(e)
            }
        })?;
        let id = result.last_insert_id();

        for role in user.roles.iter() {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(id)
                .bind(role.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_user(UserId(id))
            .await?
            .ok_or_else(|| StoreError::Decode(format!("user {id} vanished after insert")))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.display_name, u.email, u.password_hash, u.created_at
            FROM users u
            JOIN user_roles r ON r.user_id = u.id
            WHERE r.role = ?
            ORDER BY u.id ASC
            "#,
        )
        .bind(role.as_ref())
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(self.hydrate(row).await?);
        }
        Ok(users)
    }

    async fn set_roles(&self, id: UserId, roles: &RoleSet) -> Result<Option<User>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? LIMIT 1)",
        )
        .bind(id.0)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Ok(None);
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        for role in roles.iter() {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(id.0)
                .bind(role.as_ref())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.find_user(id).await
    }
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn insert_leave(&self, leave: NewLeaveRequest) -> Result<LeaveRequest, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, start_date, end_date, leave_type, comments, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(leave.employee_id.0)
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(&leave.leave_type)
        .bind(&leave.comments)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = LeaveRequestId(result.last_insert_id());
        self.find_leave(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("leave request {id} vanished after insert")))
    }

    async fn find_leave(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, StoreError> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaveRequest::try_from).transpose()
    }

    async fn list_leaves(
        &self,
        employee_id: Option<UserId>,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let rows = match employee_id {
            Some(employee_id) => {
                sqlx::query_as::<_, LeaveRow>(&format!(
                    "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = ? \
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(employee_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LeaveRow>(&format!(
                    "SELECT {LEAVE_COLUMNS} FROM leave_requests ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn decide_leave(
        &self,
        id: LeaveRequestId,
        status: LeaveStatus,
        approver_id: UserId,
        comments: Option<&str>,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approver_id = ?, comments = COALESCE(?, comments)
            WHERE id = ?
            AND status = 'pending'
            "#,
        )
        .bind(status.as_ref())
        .bind(approver_id.0)
        .bind(comments)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_leave(id).await
    }

    async fn withdraw_leave(
        &self,
        id: LeaveRequestId,
        employee_id: UserId,
    ) -> Result<bool, StoreError> {
        // notifications.leave_request_id is ON DELETE SET NULL
        let result = sqlx::query(
            r#"
            DELETE FROM leave_requests
            WHERE id = ?
            AND employee_id = ?
            AND status = 'pending'
            "#,
        )
        .bind(id.0)
        .bind(employee_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl NotificationStore for MySqlStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, leave_request_id, message, is_read, created_at)
            VALUES (?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(notification.user_id.0)
        .bind(notification.leave_request_id.map(|id| id.0))
        .bind(&notification.message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = NotificationId(result.last_insert_id());
        self.find_notification(id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("notification {id} vanished after insert")))
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Notification::from))
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StoreError> {
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = FALSE",
        )
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
