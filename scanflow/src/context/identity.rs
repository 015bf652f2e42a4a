//! Session context and run identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The session a scan was requested from.
///
/// Components that need to know who is signed in receive this explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// The session id.
    pub session_id: Uuid,
    /// The signed-in user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SessionContext {
    /// Creates an anonymous session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user: None,
        }
    }

    /// Creates a session for a signed-in user.
    #[must_use]
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user: Some(user.into()),
        }
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Identifies one scan run with its correlation ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique id of this run.
    pub run_id: Uuid,
    /// The session that requested the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// The user that requested the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new identity with a generated run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: None,
            user: None,
        }
    }

    /// Creates a new identity tied to a session.
    #[must_use]
    pub fn for_session(session: Option<&SessionContext>) -> Self {
        let mut identity = Self::new();
        if let Some(session) = session {
            identity.session_id = Some(session.session_id);
            identity.user.clone_from(&session.user);
        }
        identity
    }
}
