use serde::{Deserialize, Serialize};

/// The identity of an authenticated user as reported by the credential backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// An authenticated backend session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub user: AuthUser,
    /// UNIX timestamp (seconds) after which the session's credentials expire.
    pub expires_at: i64,
}

/// Sign-in / sign-up credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The session recovery state machine's observable state.
///
/// Recovery always terminates in `Ready`: either a resolved user or an
/// explicit absence. Readiness and the resolved user flip in the same
/// transition, so a reader can never observe "not loading" without a
/// final answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing resolved yet; recovery has not started.
    Unknown,
    /// Recovery in flight; `attempt` counts primary-strategy attempts from zero.
    Recovering { attempt: u32 },
    /// Recovery finished: a signed-in user, or explicitly nobody.
    Ready(Option<AuthUser>),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready(_))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Ready(Some(_)))
    }

    /// The resolved user, if recovery finished with one.
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            SessionState::Ready(Some(user)) => Some(user),
            _ => None,
        }
    }
}
