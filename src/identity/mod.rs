//! Identity seam
//!
//! The coordination core never manages authentication itself; it asks an
//! external provider who the current user is and which editing session this
//! is, and compares lock holders against that.

use crate::types::{SessionId, UserId};

/// Supplies the current session's user id and session id.
pub trait IdentityProvider: Send + Sync {
    fn user_id(&self) -> UserId;
    fn session_id(&self) -> SessionId;
}

/// An identity that never changes for the lifetime of the process.
pub struct FixedIdentity {
    user: UserId,
    session: SessionId,
}

impl FixedIdentity {
    pub fn new(user: impl Into<UserId>, session: impl Into<SessionId>) -> Self {
        Self {
            user: user.into(),
            session: session.into(),
        }
    }
}

impl IdentityProvider for FixedIdentity {
    fn user_id(&self) -> UserId {
        self.user.clone()
    }

    fn session_id(&self) -> SessionId {
        self.session.clone()
    }
}

/// Externally granted privilege flags consulted by the lock manager.
#[derive(Clone, Copy, Debug, Default)]
pub struct Privileges {
    /// Allows releasing a lock held by somebody else.
    pub can_force_unlock: bool,
}
