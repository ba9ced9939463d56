use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use strum_macros::{Display, EnumString};

use super::{WorkflowError, bounded};
use crate::model::{Role, UserId};
use crate::store::UserStore;

/// Who hears about a new submission. A deployment uses exactly one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum RoutingPolicy {
    /// Every manager and supervisor.
    #[default]
    #[strum(to_string = "fanout", serialize = "fan-out")]
    FanOut,
    /// The first manager, else the first supervisor, else the first admin.
    #[strum(serialize = "escalation")]
    Escalation,
}

const ESCALATION_CHAIN: [Role; 3] = [Role::Manager, Role::Supervisor, Role::Admin];
const FAN_OUT_ROLES: [Role; 2] = [Role::Manager, Role::Supervisor];

pub struct RoleResolver {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl RoleResolver {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    /// Walks the escalation chain and returns the first holder found,
    /// skipping `submitter`.
    pub async fn resolve_recipient(&self, submitter: UserId) -> Result<UserId, WorkflowError> {
        for role in ESCALATION_CHAIN {
            let holders = bounded(self.timeout, "role lookup", self.users.users_with_role(role))
                .await?;
            if let Some(user) = holders.into_iter().find(|u| u.id != submitter) {
                return Ok(user.id);
            }
        }
        Err(WorkflowError::NoRecipient)
    }

    /// Every manager and supervisor other than `submitter`.
    pub async fn resolve_all_recipients(
        &self,
        submitter: UserId,
    ) -> Result<BTreeSet<UserId>, WorkflowError> {
        let mut recipients = BTreeSet::new();
        for role in FAN_OUT_ROLES {
            let holders = bounded(self.timeout, "role lookup", self.users.users_with_role(role))
                .await?;
            recipients.extend(holders.into_iter().map(|u| u.id).filter(|id| *id != submitter));
        }

        if recipients.is_empty() {
            return Err(WorkflowError::NoRecipient);
        }
        Ok(recipients)
    }

    pub async fn recipients_for(
        &self,
        policy: RoutingPolicy,
        submitter: UserId,
    ) -> Result<Vec<UserId>, WorkflowError> {
        match policy {
            RoutingPolicy::FanOut => Ok(self
                .resolve_all_recipients(submitter)
                .await?
                .into_iter()
                .collect()),
            RoutingPolicy::Escalation => Ok(vec![self.resolve_recipient(submitter).await?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::Harness;

    #[test]
    fn parses_policy_names() {
        assert_eq!("fanout".parse::<RoutingPolicy>().unwrap(), RoutingPolicy::FanOut);
        assert_eq!("Fan-Out".parse::<RoutingPolicy>().unwrap(), RoutingPolicy::FanOut);
        assert_eq!(
            "ESCALATION".parse::<RoutingPolicy>().unwrap(),
            RoutingPolicy::Escalation
        );
        assert!("round-robin".parse::<RoutingPolicy>().is_err());
    }

    #[actix_web::test]
    async fn fan_out_collects_managers_and_supervisors() {
        let h = Harness::new().await;
        let supervisor = h.add_user("sup@example.com", &[Role::Supervisor]).await;
        h.add_user("root@example.com", &[Role::Admin]).await;

        let recipients = h.resolver().resolve_all_recipients(h.employee.id).await.unwrap();
        assert_eq!(
            recipients,
            BTreeSet::from([h.m1.id, h.m2.id, supervisor.id])
        );
    }

    #[actix_web::test]
    async fn fan_out_without_approvers_is_no_recipient() {
        let h = Harness::bare().await;
        let err = h
            .resolver()
            .resolve_all_recipients(h.employee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NoRecipient));
    }

    #[actix_web::test]
    async fn escalation_prefers_manager_then_supervisor_then_admin() {
        let h = Harness::bare().await;
        let resolver = h.resolver();

        assert!(matches!(
            resolver.resolve_recipient(h.employee.id).await,
            Err(WorkflowError::NoRecipient)
        ));

        let admin = h.add_user("admin@example.com", &[Role::Admin, Role::Employee]).await;
        assert_eq!(resolver.resolve_recipient(h.employee.id).await.unwrap(), admin.id);

        let supervisor = h.add_user("sup@example.com", &[Role::Supervisor]).await;
        assert_eq!(
            resolver.resolve_recipient(h.employee.id).await.unwrap(),
            supervisor.id
        );

        let manager = h.add_user("mgr@example.com", &[Role::Manager]).await;
        h.add_user("mgr2@example.com", &[Role::Manager]).await;
        assert_eq!(
            resolver.resolve_recipient(h.employee.id).await.unwrap(),
            manager.id
        );
    }

    #[actix_web::test]
    async fn submitter_is_never_their_own_recipient() {
        let h = Harness::bare().await;
        let manager = h
            .add_user("mgr@example.com", &[Role::Manager, Role::Employee])
            .await;

        let err = h
            .resolver()
            .recipients_for(RoutingPolicy::FanOut, manager.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NoRecipient));
    }
}
