//! Leave-request approval core: the request lifecycle, recipient routing,
//! notification dispatch and the orchestrator composing them.

use std::future::Future;
use std::time::Duration;

use crate::model::{RoleSet, UserId};

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::NotificationDispatcher;
pub use error::WorkflowError;
pub use lifecycle::{LeaveApplication, Lifecycle};
pub use orchestrator::{ApprovalWorkflow, DecisionOutcome, DeliveryWarning, WorkflowSettings};
pub use resolver::{RoleResolver, RoutingPolicy};

/// Who is calling, as established by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub roles: RoleSet,
}

/// Runs a collaborator call under `limit`; an elapsed timer is a transient
/// failure like any other unreachable collaborator.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    what: &'static str,
    call: F,
) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<WorkflowError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(WorkflowError::Transient(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
