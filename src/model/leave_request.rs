use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};

use super::user::UserId;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeaveRequestId(pub u64);

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, StrumDisplay, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

/// Outcome an approver picks for a pending request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn status(self) -> LeaveStatus {
        match self {
            Decision::Approve => LeaveStatus::Approved,
            Decision::Reject => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub employee_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub comments: Option<String>,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,
    pub approver_id: Option<UserId>,
}

/// A validated submission, ready to be persisted as a pending request.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub comments: Option<String>,
}
