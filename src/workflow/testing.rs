use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    ApprovalWorkflow, Caller, Lifecycle, NotificationDispatcher, RoleResolver, RoutingPolicy,
    WorkflowSettings,
};
use crate::model::{NewUser, Role, User, UserId};
use crate::notify::{EmailError, EmailSender, PushChannel, PushError};
use crate::store::{InMemoryStore, Stores, UserStore};

const TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<(UserId, String, Value)>>,
    failing: AtomicBool,
}

impl RecordingPush {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(UserId, String, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn send_to_user(
        &self,
        user_id: UserId,
        event: &str,
        payload: &Value,
    ) -> Result<(), PushError> {
        // attempts are recorded even when the channel is down
        self.sent
            .lock()
            .unwrap()
            .push((user_id, event.to_owned(), payload.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(PushError::Unavailable("hub offline".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::Rejected(502));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_owned(), subject.to_owned(), body.to_owned()));
        Ok(())
    }
}

/// One employee and, unless built with [`Harness::bare`], two managers.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub push: Arc<RecordingPush>,
    pub mailer: Arc<RecordingMailer>,
    pub employee: User,
    pub m1: User,
    pub m2: User,
}

impl Harness {
    pub async fn new() -> Self {
        let mut h = Self::bare().await;
        h.m1 = h.add_named("Manager One", "m1@example.com", &[Role::Manager]).await;
        h.m2 = h.add_named("Manager Two", "m2@example.com", &[Role::Manager]).await;
        h
    }

    /// Only the employee exists; `m1`/`m2` point at the employee too.
    pub async fn bare() -> Self {
        let store = Arc::new(InMemoryStore::default());
        let employee = store
            .create_user(NewUser {
                display_name: "Erin Employee".into(),
                email: "employee@example.com".into(),
                password_hash: String::new(),
                roles: [Role::Employee].into(),
            })
            .await
            .unwrap();

        Self {
            store,
            push: Arc::new(RecordingPush::default()),
            mailer: Arc::new(RecordingMailer::default()),
            m1: employee.clone(),
            m2: employee.clone(),
            employee,
        }
    }

    pub async fn add_user(&self, email: &str, roles: &[Role]) -> User {
        self.add_named("", email, roles).await
    }

    async fn add_named(&self, name: &str, email: &str, roles: &[Role]) -> User {
        self.store
            .create_user(NewUser {
                display_name: name.into(),
                email: email.into(),
                password_hash: String::new(),
                roles: roles.iter().copied().collect(),
            })
            .await
            .unwrap()
    }

    pub fn caller(&self, user: &User) -> Caller {
        Caller {
            user_id: user.id,
            roles: user.roles.clone(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(self.store.clone(), self.store.clone(), TIMEOUT)
    }

    pub fn resolver(&self) -> RoleResolver {
        RoleResolver::new(self.store.clone(), TIMEOUT)
    }

    pub fn dispatcher(&self) -> NotificationDispatcher {
        NotificationDispatcher::new(
            self.store.clone(),
            self.store.clone(),
            self.push.clone(),
            TIMEOUT,
        )
    }

    pub fn workflow(&self, routing: RoutingPolicy) -> ApprovalWorkflow {
        ApprovalWorkflow::new(
            Stores::shared(self.store.clone()),
            self.push.clone(),
            self.mailer.clone(),
            WorkflowSettings {
                audit_email: "audit@example.com".into(),
                routing,
                collaborator_timeout: TIMEOUT,
            },
        )
    }
}
