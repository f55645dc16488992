//! Authorization context passed into every guarded operation

use crate::error::{DashError, Result};
use crate::evaluator;
use crate::model::Id;
use crate::store::Store;

/// Caller identity as resolved by the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Id,
    /// Role name. `None` holds no permissions.
    pub role: Option<String>,
}

impl Session {
    pub fn new(user_id: Id, role: impl Into<String>) -> Self {
        Session { user_id, role: Some(role.into()) }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

/// Session plus the store it is evaluated against
#[derive(Clone, Copy)]
pub struct AuthContext<'a> {
    pub session: &'a Session,
    pub store: &'a dyn Store,
}

impl<'a> AuthContext<'a> {
    pub fn new(session: &'a Session, store: &'a dyn Store) -> Self {
        AuthContext { session, store }
    }

    pub fn user_id(&self) -> Id {
        self.session.user_id
    }

    pub fn role(&self) -> Option<&'a str> {
        self.session.role.as_deref()
    }

    pub fn can(&self, module: &str, action: &str) -> Result<bool> {
        evaluator::has_permission(self.store, self.role(), module, action)
    }

    /// `Forbidden` unless the session's role holds `(module, action)`
    pub fn require(&self, module: &str, action: &str) -> Result<()> {
        if self.can(module, action)? {
            return Ok(());
        }
        tracing::debug!(user = self.user_id(), role = ?self.role(), module, action, "permission denied");
        Err(DashError::forbidden(module, action))
    }
}

impl std::fmt::Debug for AuthContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext").field("session", self.session).finish_non_exhaustive()
    }
}
