use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use super::{Caller, WorkflowError, bounded};
use crate::model::{Decision, LeaveRequest, LeaveRequestId, NewLeaveRequest, User};
use crate::store::{LeaveStore, UserStore};

const MAX_LEAVE_TYPE_LEN: usize = 50;
const MAX_COMMENTS_LEN: usize = 1000;

/// Raw submission as it arrives from the caller; nothing is trusted yet.
#[derive(Debug, Clone, Default)]
pub struct LeaveApplication {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub leave_type: Option<String>,
    pub comments: Option<String>,
}

/// A freshly persisted request together with the employee who filed it.
#[derive(Debug, Clone)]
pub struct Submission {
    pub request: LeaveRequest,
    pub employee: User,
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl LeaveApplication {
    pub fn validate(self, employee: &User) -> Result<NewLeaveRequest, WorkflowError> {
        let start_date = self
            .start_date
            .ok_or_else(|| WorkflowError::Validation("start_date is required".into()))?;
        let end_date = self
            .end_date
            .ok_or_else(|| WorkflowError::Validation("end_date is required".into()))?;
        if start_date > end_date {
            return Err(WorkflowError::Validation(
                "start_date cannot be after end_date".into(),
            ));
        }

        let leave_type = trimmed(self.leave_type)
            .ok_or_else(|| WorkflowError::Validation("leave_type is required".into()))?;
        if leave_type.chars().count() > MAX_LEAVE_TYPE_LEN {
            return Err(WorkflowError::Validation(format!(
                "leave_type must be at most {MAX_LEAVE_TYPE_LEN} characters"
            )));
        }

        let comments = trimmed(self.comments);
        if comments
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENTS_LEN)
        {
            return Err(WorkflowError::Validation(format!(
                "comments must be at most {MAX_COMMENTS_LEN} characters"
            )));
        }

        Ok(NewLeaveRequest {
            employee_id: employee.id,
            start_date,
            end_date,
            leave_type,
            comments,
        })
    }
}

/// Owns the Pending → Approved | Rejected state machine.
pub struct Lifecycle {
    users: Arc<dyn UserStore>,
    leaves: Arc<dyn LeaveStore>,
    timeout: Duration,
}

impl Lifecycle {
    pub fn new(users: Arc<dyn UserStore>, leaves: Arc<dyn LeaveStore>, timeout: Duration) -> Self {
        Self {
            users,
            leaves,
            timeout,
        }
    }

    pub async fn submit(
        &self,
        caller: &Caller,
        application: LeaveApplication,
    ) -> Result<Submission, WorkflowError> {
        let employee = self.account(caller).await?;
        if !employee.roles.is_employee() {
            return Err(WorkflowError::Forbidden(
                "Only employees can submit leave requests".into(),
            ));
        }

        let new_request = application.validate(&employee)?;
        let request = bounded(
            self.timeout,
            "leave insert",
            self.leaves.insert_leave(new_request),
        )
        .await?;

        tracing::info!(
            leave_id = request.id.0,
            employee_id = employee.id.0,
            "Leave request submitted"
        );
        Ok(Submission { request, employee })
    }

    pub async fn decide(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<LeaveRequest, WorkflowError> {
        // a token may outlive a demotion
        let approver = self.account(caller).await?;
        if !approver.roles.can_approve() {
            return Err(WorkflowError::Forbidden(
                "Manager, supervisor or admin only".into(),
            ));
        }

        let current = self.find(id).await?;
        if current.employee_id == approver.id {
            return Err(WorkflowError::Forbidden(
                "Approvers cannot decide their own leave requests".into(),
            ));
        }
        if current.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                id,
                status: current.status,
            });
        }

        // only a rejection carries the approver's reason
        let comments = match decision {
            Decision::Reject => trimmed(comments),
            Decision::Approve => None,
        };

        let decided = bounded(
            self.timeout,
            "leave decision",
            self.leaves.decide_leave(
                id,
                decision.status(),
                caller.user_id,
                comments.as_deref(),
            ),
        )
        .await?;

        match decided {
            Some(request) => {
                tracing::info!(
                    leave_id = id.0,
                    approver_id = caller.user_id.0,
                    status = %request.status,
                    "Leave request decided"
                );
                Ok(request)
            }
            // lost the race against another approver
            None => {
                let latest = self.find(id).await?;
                tracing::warn!(leave_id = id.0, status = %latest.status, "Concurrent decision rejected");
                Err(WorkflowError::InvalidState {
                    id,
                    status: latest.status,
                })
            }
        }
    }

    /// Removes a request its owner no longer needs. Only pending requests
    /// can be withdrawn.
    pub async fn withdraw(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, WorkflowError> {
        let current = self.find(id).await?;
        if current.employee_id != caller.user_id {
            return Err(WorkflowError::Forbidden(
                "Only the employee who filed a request can withdraw it".into(),
            ));
        }
        if current.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                id,
                status: current.status,
            });
        }

        let removed = bounded(
            self.timeout,
            "leave withdrawal",
            self.leaves.withdraw_leave(id, caller.user_id),
        )
        .await?;
        if removed {
            tracing::info!(leave_id = id.0, employee_id = caller.user_id.0, "Leave request withdrawn");
            return Ok(current);
        }

        // decided in the meantime
        let latest = self.find(id).await?;
        Err(WorkflowError::InvalidState {
            id,
            status: latest.status,
        })
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<LeaveRequest>, WorkflowError> {
        let owner = if caller.roles.can_approve() {
            None
        } else {
            Some(caller.user_id)
        };
        bounded(self.timeout, "leave list", self.leaves.list_leaves(owner)).await
    }

    pub async fn get(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, WorkflowError> {
        let request = self.find(id).await?;
        if request.employee_id != caller.user_id && !caller.roles.can_approve() {
            return Err(WorkflowError::Forbidden(
                "Leave request belongs to another employee".into(),
            ));
        }
        Ok(request)
    }

    /// The caller's stored account; its roles are authoritative for changes.
    async fn account(&self, caller: &Caller) -> Result<User, WorkflowError> {
        bounded(
            self.timeout,
            "user lookup",
            self.users.find_user(caller.user_id),
        )
        .await?
        .ok_or_else(|| WorkflowError::Forbidden("Caller account does not exist".into()))
    }

    async fn find(&self, id: LeaveRequestId) -> Result<LeaveRequest, WorkflowError> {
        bounded(self.timeout, "leave lookup", self.leaves.find_leave(id))
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "leave request",
                id: id.0,
            })
    }
}
