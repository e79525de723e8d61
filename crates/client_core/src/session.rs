//! Session lifecycle types shared by the store and the auth synchronizer.

use serde_json::Value;
use shared::{
    domain::{BranchId, Employee, EmployeeId, Role},
    protocol::Session,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Restoring,
    Authenticated,
    Anonymous,
}

impl SessionPhase {
    pub fn is_settled(self) -> bool {
        matches!(self, SessionPhase::Authenticated | SessionPhase::Anonymous)
    }
}

/// Signed-in identity as rendered by the app: the auth user merged with its
/// employee row, plus the access token of the session it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: EmployeeId,
    pub email: String,
    pub access_token: String,
    pub profile: Employee,
}

impl CurrentUser {
    /// Auth-user fields are the base; every populated employee field wins.
    pub fn merge(session: &Session, mut profile: Employee) -> Self {
        let auth_email = session.user.email.clone().unwrap_or_default();
        if profile.email.trim().is_empty() {
            profile.email = auth_email;
        }
        if profile.full_name.trim().is_empty() {
            if let Some(Value::String(name)) = session.user.user_metadata.get("full_name") {
                profile.full_name = name.clone();
            }
        }
        Self {
            id: session.user.id,
            email: profile.email.clone(),
            access_token: session.access_token.clone(),
            profile,
        }
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn branch_id(&self) -> Option<BranchId> {
        self.profile.branch_id
    }

    pub fn full_name(&self) -> &str {
        &self.profile.full_name
    }
}

/// Handle for a registered auth-event listener. Delivery stops on
/// [`AuthSubscription::unsubscribe`] or when the handle is dropped.
#[must_use = "dropping the subscription stops the listener"]
pub struct AuthSubscription {
    task: Option<JoinHandle<()>>,
}

impl AuthSubscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
