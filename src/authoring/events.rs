//! Cross-session lock notifications
//!
//! Other sessions locking or unlocking an item surface here as tagged events
//! on a broadcast channel. Each open edit session consumes the channel and
//! applies the events that concern its item.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{ItemId, SessionId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEventKind {
    Locked,
    Unlocked,
}

/// A lock event originating from some editing session, possibly this one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemEvent {
    pub item_id: ItemId,
    /// The user whose action triggered the event.
    pub user_id: UserId,
    /// The session the event originated from; used to drop self-originated
    /// echoes.
    pub session_id: SessionId,
    pub kind: ItemEventKind,
}

impl ItemEvent {
    pub fn locked(
        item_id: impl Into<ItemId>,
        user_id: impl Into<UserId>,
        session_id: impl Into<SessionId>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            kind: ItemEventKind::Locked,
        }
    }

    pub fn unlocked(
        item_id: impl Into<ItemId>,
        user_id: impl Into<UserId>,
        session_id: impl Into<SessionId>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            kind: ItemEventKind::Unlocked,
        }
    }
}

/// Sender half of the notification bus.
pub type EventSender = broadcast::Sender<ItemEvent>;

/// Receiver half consumed by one edit session.
pub type EventReceiver = broadcast::Receiver<ItemEvent>;

/// Create a notification bus with room for `capacity` undelivered events.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}
