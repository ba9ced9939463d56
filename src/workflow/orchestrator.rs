use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::lifecycle::trimmed;
use super::{
    Caller, LeaveApplication, Lifecycle, NotificationDispatcher, RoleResolver, RoutingPolicy,
    WorkflowError,
};
use crate::model::{
    Decision, LeaveRequest, LeaveRequestId, Notification, NotificationId, User, UserId,
};
use crate::notify::{EmailSender, PushChannel};
use crate::store::{Stores, UserStore};

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Fixed operational mailbox receiving a copy of every decision.
    pub audit_email: String,
    pub routing: RoutingPolicy,
    pub collaborator_timeout: Duration,
}

/// A secondary effect that did not go through. The primary change it
/// belongs to is already committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryWarning {
    NoRecipient,
    RoutingFailed { reason: String },
    NotificationFailed { user_id: UserId, reason: String },
    PushFailed { user_id: UserId, reason: String },
    AuditEmailFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub request: LeaveRequest,
    pub notified: Vec<UserId>,
    pub warnings: Vec<DeliveryWarning>,
}

impl SubmitOutcome {
    pub fn degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub request: LeaveRequest,
    pub notification: Option<Notification>,
    pub audit_email_sent: bool,
    pub warnings: Vec<DeliveryWarning>,
}

impl DecisionOutcome {
    pub fn degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Entry point for every user-facing operation of the approval flow.
pub struct ApprovalWorkflow {
    lifecycle: Lifecycle,
    resolver: RoleResolver,
    dispatcher: NotificationDispatcher,
    users: Arc<dyn UserStore>,
    email: Arc<dyn EmailSender>,
    settings: WorkflowSettings,
}

impl ApprovalWorkflow {
    pub fn new(
        stores: Stores,
        push: Arc<dyn PushChannel>,
        email: Arc<dyn EmailSender>,
        settings: WorkflowSettings,
    ) -> Self {
        let timeout = settings.collaborator_timeout;
        Self {
            lifecycle: Lifecycle::new(stores.users.clone(), stores.leaves.clone(), timeout),
            resolver: RoleResolver::new(stores.users.clone(), timeout),
            dispatcher: NotificationDispatcher::new(
                stores.users.clone(),
                stores.notifications.clone(),
                push,
                timeout,
            ),
            users: stores.users,
            email,
            settings,
        }
    }

    #[tracing::instrument(name = "submit_request", skip(self, application), fields(caller = caller.user_id.0))]
    pub async fn submit_request(
        &self,
        caller: &Caller,
        application: LeaveApplication,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let submission = self.lifecycle.submit(caller, application).await?;
        let request = submission.request;
        let mut warnings = Vec::new();
        let mut notified = Vec::new();

        let recipients = match self
            .resolver
            .recipients_for(self.settings.routing, request.employee_id)
            .await
        {
            Ok(recipients) => recipients,
            Err(WorkflowError::NoRecipient) => {
                tracing::warn!(leave_id = request.id.0, "No approver available to notify");
                warnings.push(DeliveryWarning::NoRecipient);
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, leave_id = request.id.0, "Recipient routing failed");
                warnings.push(DeliveryWarning::RoutingFailed {
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };

        let message = format!("New leave request from {}", submission.employee.email);
        for recipient in recipients {
            match self
                .dispatcher
                .notify(recipient, message.as_str(), Some(request.id))
                .await
            {
                Ok(delivery) => {
                    notified.push(recipient);
                    if let Some(reason) = delivery.push_failure {
                        warnings.push(DeliveryWarning::PushFailed {
                            user_id: recipient,
                            reason,
                        });
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, user_id = recipient.0, "Failed to notify approver");
                    warnings.push(DeliveryWarning::NotificationFailed {
                        user_id: recipient,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(SubmitOutcome {
            request,
            notified,
            warnings,
        })
    }

    #[tracing::instrument(name = "decide_request", skip(self, comments), fields(caller = caller.user_id.0, leave_id = id.0))]
    pub async fn decide_request(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<DecisionOutcome, WorkflowError> {
        // the stored comments may still be the employee's own note
        let reason = match decision {
            Decision::Reject => trimmed(comments.clone()),
            Decision::Approve => None,
        };
        let request = self.lifecycle.decide(caller, id, decision, comments).await?;
        let mut warnings = Vec::new();

        let message = match (decision, reason.as_deref()) {
            (Decision::Approve, _) => "Your leave request has been approved".to_owned(),
            (Decision::Reject, Some(reason)) => {
                format!("Your leave request was rejected: {reason}")
            }
            (Decision::Reject, None) => "Your leave request was rejected".to_owned(),
        };

        let notification = match self
            .dispatcher
            .notify(request.employee_id, message, Some(request.id))
            .await
        {
            Ok(delivery) => {
                if let Some(reason) = delivery.push_failure {
                    warnings.push(DeliveryWarning::PushFailed {
                        user_id: request.employee_id,
                        reason,
                    });
                }
                Some(delivery.notification)
            }
            Err(e) => {
                tracing::error!(error = %e, employee_id = request.employee_id.0, "Failed to notify employee");
                warnings.push(DeliveryWarning::NotificationFailed {
                    user_id: request.employee_id,
                    reason: e.to_string(),
                });
                None
            }
        };

        let audit_email_sent = match self
            .send_audit_email(caller, decision, &request, reason.as_deref())
            .await
        {
            Ok(()) => true,
            Err(reason) => {
                tracing::error!(
                    audit_email = %self.settings.audit_email,
                    reason = %reason,
                    "Audit email failed, decision kept"
                );
                warnings.push(DeliveryWarning::AuditEmailFailed { reason });
                false
            }
        };

        Ok(DecisionOutcome {
            request,
            notification,
            audit_email_sent,
            warnings,
        })
    }

    /// Withdraws a pending request on behalf of its owner. Nobody is
    /// notified; the approvers' notices simply lose their link.
    pub async fn withdraw_request(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, WorkflowError> {
        self.lifecycle.withdraw(caller, id).await
    }

    pub async fn list_requests(&self, caller: &Caller) -> Result<Vec<LeaveRequest>, WorkflowError> {
        self.lifecycle.list(caller).await
    }

    pub async fn get_request(
        &self,
        caller: &Caller,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, WorkflowError> {
        self.lifecycle.get(caller, id).await
    }

    pub async fn list_notifications(
        &self,
        caller: &Caller,
    ) -> Result<Vec<Notification>, WorkflowError> {
        self.dispatcher.list_for_user(caller.user_id).await
    }

    pub async fn unread_count(&self, caller: &Caller) -> Result<u64, WorkflowError> {
        self.dispatcher.unread_count(caller.user_id).await
    }

    pub async fn mark_notification_read(
        &self,
        caller: &Caller,
        id: NotificationId,
    ) -> Result<Notification, WorkflowError> {
        self.dispatcher.mark_read(caller, id).await
    }

    async fn display_name(&self, id: UserId) -> String {
        let lookup = tokio::time::timeout(self.settings.collaborator_timeout, self.users.find_user(id));
        match lookup.await {
            Ok(Ok(Some(user))) => describe(&user),
            _ => format!("user #{id}"),
        }
    }

    async fn send_audit_email(
        &self,
        caller: &Caller,
        decision: Decision,
        request: &LeaveRequest,
        reason: Option<&str>,
    ) -> Result<(), String> {
        let employee = self.display_name(request.employee_id).await;
        let approver = self.display_name(caller.user_id).await;
        let (subject, body) = audit_message(decision, request, reason, &employee, &approver);

        match tokio::time::timeout(
            self.settings.collaborator_timeout,
            self.email.send(&self.settings.audit_email, &subject, &body),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "email timed out after {}ms",
                self.settings.collaborator_timeout.as_millis()
            )),
        }
    }
}

fn describe(user: &User) -> String {
    if user.display_name.trim().is_empty() {
        user.email.clone()
    } else {
        format!("{} <{}>", user.display_name, user.email)
    }
}

fn audit_message(
    decision: Decision,
    request: &LeaveRequest,
    reason: Option<&str>,
    employee: &str,
    approver: &str,
) -> (String, String) {
    let at = Utc::now().format("%Y-%m-%d %H:%M:%S");
    let (subject, verb) = match decision {
        Decision::Approve => ("Leave Request Approved", "approved"),
        Decision::Reject => ("Leave Request Rejected", "rejected"),
    };

    let mut body = format!(
        "Leave request from {employee} (ID: {id}, {leave_type}, {start} to {end}) has been {verb} by {approver} on {at} UTC.",
        id = request.id,
        leave_type = request.leave_type,
        start = request.start_date,
        end = request.end_date,
    );
    if let (Decision::Reject, Some(reason)) = (decision, reason) {
        body.push_str(&format!(" Reason: {reason}"));
    }
    (subject.to_owned(), body)
}
