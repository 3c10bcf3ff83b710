//! User confirmation and notice seam
//!
//! The workflow controller asks a collaborator for user decisions (unsaved
//! changes, save-and-publish) and tells it about lock events caused by other
//! sessions. Rendering is somebody else's problem.

use async_trait::async_trait;

use crate::types::UserId;

/// Outcome of a user-decision prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Proceed with the proposed action (save / save-and-publish).
    Confirmed,
    /// Skip the proposed action but continue the surrounding flow.
    Declined,
    /// Abort the surrounding flow entirely.
    Cancelled,
}

#[async_trait]
pub trait UserPrompts: Send + Sync {
    /// "There are unsaved changes, save them now?"
    async fn confirm_save(&self) -> Decision;

    /// "There are unsaved changes, save and publish now?"
    async fn confirm_publish(&self) -> Decision;

    /// Informational notice: another session locked the open item.
    async fn notify_locked(&self, user_id: &UserId);

    /// Informational notice: another session unlocked the open item.
    async fn notify_unlocked(&self, user_id: &UserId);
}

/// Prompts that always answer with preconfigured decisions and swallow
/// notices. Handy for headless drivers and tests.
#[derive(Clone, Copy, Debug)]
pub struct StaticPrompts {
    pub save: Decision,
    pub publish: Decision,
}

impl StaticPrompts {
    pub fn confirming() -> Self {
        Self {
            save: Decision::Confirmed,
            publish: Decision::Confirmed,
        }
    }
}

#[async_trait]
impl UserPrompts for StaticPrompts {
    async fn confirm_save(&self) -> Decision {
        self.save
    }

    async fn confirm_publish(&self) -> Decision {
        self.publish
    }

    async fn notify_locked(&self, _user_id: &UserId) {}

    async fn notify_unlocked(&self, _user_id: &UserId) {}
}
