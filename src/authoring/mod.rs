//! Authoring workflow controller
//!
//! Sequences the life of an editing session: open (fetch + lock + autosave
//! restore), save, publish and close, with the confirmation prompts between
//! them. [`AuthoringService`] holds the stateless operations over passed-in
//! items; [`session::EditSession`] wraps them with the working copy, the
//! baseline and the closing guard.

pub mod events;
pub mod prompts;
pub mod session;

use std::sync::Arc;
use thiserror::Error;
use tokio::task::AbortHandle;

use crate::autosave::AutosaveService;
use crate::diff;
use crate::lock::LockService;
use crate::store::{RecordStore, StoreError};
use crate::types::{ContentField, Item, ItemId, SharedItem, UserId};

pub use events::{ItemEvent, ItemEventKind};
pub use prompts::{Decision, StaticPrompts, UserPrompts};
pub use session::{EditSession, SessionPhase};

/// Editorial length limits, surfaced to input collaborators.
pub const FIELD_LIMITS: [(ContentField, usize); 3] = [
    (ContentField::Slugline, 24),
    (ContentField::Headline, 64),
    (ContentField::Abstract, 160),
];

/// Error types for save/publish workflow failures. Lock and autosave
/// hiccups never show up here; they degrade to safe states instead.
#[derive(Error, Debug)]
pub enum AuthoringError {
    #[error("unique name is not unique")]
    UniqueNameTaken,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item version is stale")]
    StaleVersion,

    #[error("item not updated")]
    SaveFailed,

    #[error("item not published")]
    PublishFailed,

    #[error(transparent)]
    Store(StoreError),
}

impl AuthoringError {
    /// Map a rejected save onto the user-facing taxonomy, pulling apart the
    /// structured issues the record store attaches.
    fn from_save_failure(err: StoreError) -> Self {
        match err {
            StoreError::Validation(issues) => {
                if issues.unique_name_taken {
                    AuthoringError::UniqueNameTaken
                } else if let Some(message) = issues.validator_exception {
                    AuthoringError::Validation(message)
                } else {
                    AuthoringError::SaveFailed
                }
            }
            StoreError::StaleVersion => AuthoringError::StaleVersion,
            _ => AuthoringError::SaveFailed,
        }
    }
}

/// How a close request ended.
#[derive(Debug)]
pub enum CloseOutcome {
    /// The session is done with the item; carries its final local state.
    Closed(Item),
    /// The user cancelled; the session keeps editing.
    Cancelled,
}

/// Whether a gated publish may proceed.
#[derive(Debug)]
pub enum PublishGate {
    Proceed(Item),
    Aborted,
}

pub struct AuthoringService {
    store: Arc<dyn RecordStore>,
    lock: Arc<LockService>,
    autosave: Arc<AutosaveService>,
    prompts: Arc<dyn UserPrompts>,
}

impl AuthoringService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        lock: Arc<LockService>,
        autosave: Arc<AutosaveService>,
        prompts: Arc<dyn UserPrompts>,
    ) -> Self {
        Self {
            store,
            lock,
            autosave,
            prompts,
        }
    }

    /// Open an item for editing: fetch it, try to acquire the lock, then
    /// look for a pending autosave. The lock outcome, success or degraded
    /// read-only, always flows into the autosave lookup.
    pub async fn open(&self, id: &ItemId, read_only: bool) -> Result<Item, AuthoringError> {
        let mut item = self
            .store
            .fetch_item(id)
            .await
            .map_err(AuthoringError::Store)?;
        item.editable = !read_only;
        item.read_only = read_only;
        let item = self.lock.lock(item, false).await;
        Ok(self.autosave.open(item).await)
    }

    /// An item is editable when it has a lock holder and that holder is this
    /// session.
    pub fn is_editable(&self, item: &Item) -> bool {
        item.lock_user.is_some() && !self.lock.is_locked(item)
    }

    /// Commit the working copy as a new canonical version.
    ///
    /// The payload is the minimal whitelist diff against `orig`; any pending
    /// autosave timer is stopped first. On success the autosave pointer is
    /// cleared and the lock state recomputed from the response.
    pub async fn save(&self, orig: Option<&Item>, item: &Item) -> Result<Item, AuthoringError> {
        let payload = diff::compute_save_diff(orig, item);
        self.autosave.stop(&item.id);
        match self.store.update_item(item, &payload).await {
            Ok(mut updated) => {
                updated.editable = item.editable;
                updated.read_only = item.read_only;
                updated.autosave = None;
                updated.locked = self.lock.is_locked(&updated);
                Ok(updated)
            }
            Err(err) => Err(AuthoringError::from_save_failure(err)),
        }
    }

    /// Close an item: save it if dirty and the user confirms, then release
    /// the lock. A no-op unless the item is editable for this session.
    ///
    /// The unlock runs whether the save branch was confirmed or declined,
    /// and even when a confirmed save failed: the autosave
    /// record still holds the edits server-side, and a close must not leave
    /// a dangling lock. Only an explicit cancel aborts the whole close.
    pub async fn close(&self, working: &Item, baseline: &Item, is_dirty: bool) -> CloseOutcome {
        if !self.is_editable(working) {
            return CloseOutcome::Closed(working.clone());
        }

        if is_dirty {
            match self.prompts.confirm_save().await {
                Decision::Confirmed => {
                    if let Err(err) = self.save(Some(baseline), working).await {
                        log::error!("save while closing item {} failed: {}", working.id, err);
                    }
                }
                Decision::Declined => {}
                Decision::Cancelled => return CloseOutcome::Cancelled,
            }
        }

        let unlocked = self.lock.unlock(working.clone()).await;
        CloseOutcome::Closed(unlocked)
    }

    /// Gate a publish behind the save-and-publish confirmation.
    ///
    /// Only bites when the item is editable and dirty: then the user either
    /// confirms (the item is saved and the saved state returned) or the
    /// publish is aborted. Clean or read-only items pass straight through
    /// unchanged, without prompting.
    pub async fn publish_confirmation(
        &self,
        baseline: &Item,
        working: &Item,
        is_dirty: bool,
    ) -> Result<PublishGate, AuthoringError> {
        if self.is_editable(working) && is_dirty {
            return match self.prompts.confirm_publish().await {
                Decision::Confirmed => {
                    let saved = self.save(Some(baseline), working).await?;
                    Ok(PublishGate::Proceed(saved))
                }
                Decision::Declined | Decision::Cancelled => Ok(PublishGate::Aborted),
            };
        }
        Ok(PublishGate::Proceed(working.clone()))
    }

    /// Commit an item to the publish sub-resource. Releases the lock on
    /// success; a failed publish keeps the lock so the author can retry.
    pub async fn publish(&self, item: &Item) -> Result<Item, AuthoringError> {
        match self.store.publish_item(item).await {
            Ok(published) => Ok(self.lock.unlock(published).await),
            Err(err) => {
                log::error!("publish failed for item {}: {}", item.id, err);
                Err(AuthoringError::PublishFailed)
            }
        }
    }

    /// Schedule a debounced autosave of the working copy.
    pub fn autosave(&self, working: &SharedItem, baseline: &SharedItem) -> AbortHandle {
        self.autosave.save(working, baseline)
    }

    /// Apply a lock event pushed from another session onto the local item.
    pub fn apply_remote_lock(&self, item: &mut Item, user_id: &UserId) {
        self.autosave.stop(&item.id);
        item.lock_user = Some(user_id.clone());
        item.locked = true;
    }

    /// Apply an unlock event pushed from another session onto the local item.
    pub fn apply_remote_unlock(&self, item: &mut Item) {
        self.autosave.stop(&item.id);
        item.lock_user = None;
        item.lock_session = None;
        item.locked = false;
    }

    pub fn prompts(&self) -> Arc<dyn UserPrompts> {
        Arc::clone(&self.prompts)
    }

    pub fn lock_service(&self) -> Arc<LockService> {
        Arc::clone(&self.lock)
    }

    pub fn autosave_service(&self) -> Arc<AutosaveService> {
        Arc::clone(&self.autosave)
    }
}
