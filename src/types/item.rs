//! The editable item record and its autosave side record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::fields::FieldMap;

/// Unique identifier for an item record
pub type ItemId = String;

/// Unique identifier for a user
pub type UserId = String;

/// Unique identifier for an editing session
pub type SessionId = String;

/// An item shared between the edit session and background tasks
/// (autosave timers, notification listeners).
pub type SharedItem = Arc<Mutex<Item>>;

/// The editable content record under coordination.
///
/// `lock_user`/`lock_session` identify the current lock holder as reported by
/// the record store. `locked` means the item is read-only *for this session*;
/// `editable` is the session's intent to edit (cleared when the item was
/// opened read-only or the lock was lost).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    /// Version marker used for optimistic concurrency on partial updates.
    pub etag: Option<String>,

    /// The whitelisted content fields. Absent key = unset field.
    pub fields: FieldMap,

    pub lock_user: Option<UserId>,
    pub lock_session: Option<SessionId>,

    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub read_only: bool,

    /// Pending autosave attached at open time or stamped after a persist.
    /// Client-side state, never sent over the wire.
    #[serde(skip)]
    pub autosave: Option<AutosaveRecord>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            etag: None,
            fields: FieldMap::new(),
            lock_user: None,
            lock_session: None,
            editable: false,
            locked: false,
            read_only: false,
            autosave: None,
        }
    }
}

/// A per-item snapshot of unsaved edits, stored independently of the
/// canonical record. At most one exists per item, keyed by item id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutosaveRecord {
    pub id: Uuid,
    pub item_id: ItemId,
    pub fields: FieldMap,
    pub updated_at: DateTime<Utc>,
}

impl AutosaveRecord {
    /// Snapshot the current working-copy content for persistence.
    pub fn snapshot_of(item: &Item) -> Self {
        Self {
            id: item
                .autosave
                .as_ref()
                .map(|draft| draft.id)
                .unwrap_or_else(Uuid::new_v4),
            item_id: item.id.clone(),
            fields: item.fields.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Who holds the edit lock, relative to the current identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    /// No lock holder.
    Unlocked,
    /// Held by the current user in the current session; editing allowed.
    HeldByMe,
    /// Held by another user, or by the same user in another session.
    HeldElsewhere,
}

/// Wrap an item for sharing with background tasks.
pub fn shared(item: Item) -> SharedItem {
    Arc::new(Mutex::new(item))
}

/// Lock a shared item, recovering the data from a poisoned mutex.
pub fn item_guard(item: &SharedItem) -> MutexGuard<'_, Item> {
    item.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
