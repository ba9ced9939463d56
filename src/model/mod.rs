pub mod leave_request;
pub mod notification;
pub mod role;
pub mod user;

pub use leave_request::{Decision, LeaveRequest, LeaveRequestId, LeaveStatus, NewLeaveRequest};
pub use notification::{NewNotification, Notification, NotificationId};
pub use role::{Role, RoleSet};
pub use user::{NewUser, User, UserId};
