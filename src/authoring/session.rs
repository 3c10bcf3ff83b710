//! Per-item edit session
//!
//! Owns the Baseline (last server-persisted state) and the Working Copy (the
//! live, mutable derivative) for one open item, together with the dirty and
//! closing flags. The session is the single writer of both items; the two
//! asynchronous mutation sources (the debounced autosave task and the
//! cross-session notification listener) reach them only through the shared
//! handles handed out here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};

use super::events::{EventReceiver, ItemEvent, ItemEventKind};
use super::{AuthoringError, AuthoringService, CloseOutcome, PublishGate};
use crate::autosave::AutosaveService;
use crate::diff;
use crate::identity::IdentityProvider;
use crate::lock::LockService;
use crate::types::{
    item_guard, shared, ContentField, FieldMap, FieldValue, Item, ItemId, SharedItem,
};

/// Where an edit session currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Editing,
    /// A historical version is overlaid read-only on the working copy.
    Previewing,
    /// The close sequence has started; inbound notifications are ignored.
    Closing,
    Closed,
}

/// One user's editing session for one item.
///
/// Cheap to clone; all state is behind shared handles so a clone can be
/// moved into the notification listener task.
#[derive(Clone)]
pub struct EditSession {
    authoring: Arc<AuthoringService>,
    lock: Arc<LockService>,
    autosave: Arc<AutosaveService>,
    identity: Arc<dyn IdentityProvider>,
    baseline: SharedItem,
    working: SharedItem,
    dirty: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    phase: Arc<Mutex<SessionPhase>>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EditSession {
    /// Open an item and derive its working copy.
    pub async fn open(
        authoring: Arc<AuthoringService>,
        identity: Arc<dyn IdentityProvider>,
        id: &ItemId,
        read_only: bool,
    ) -> Result<Self, AuthoringError> {
        let item = authoring.open(id, read_only).await?;
        let lock = authoring.lock_service();
        let autosave = authoring.autosave_service();

        let session = Self {
            authoring,
            lock,
            autosave,
            identity,
            baseline: shared(item.clone()),
            working: shared(item),
            dirty: Arc::new(AtomicBool::new(false)),
            closing: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(Mutex::new(SessionPhase::Editing)),
            listener: Arc::new(Mutex::new(None)),
        };
        // Initial working copy derivation, same path as leaving a preview.
        session.close_preview();
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Working copy access
    // ------------------------------------------------------------------

    pub fn working_item(&self) -> Item {
        item_guard(&self.working).clone()
    }

    pub fn baseline_item(&self) -> Item {
        item_guard(&self.baseline).clone()
    }

    /// Shared handle to the working copy, for input collaborators.
    pub fn working(&self) -> SharedItem {
        Arc::clone(&self.working)
    }

    pub fn set_field(&self, field: ContentField, value: FieldValue) {
        item_guard(&self.working).fields.insert(field, value);
    }

    pub fn field(&self, field: ContentField) -> Option<FieldValue> {
        item_guard(&self.working).fields.get(&field).cloned()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn is_editable(&self) -> bool {
        item_guard(&self.working).editable
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_guard()
    }

    /// Saving is worthwhile when there are local edits or a pending
    /// autosave to promote.
    pub fn save_enabled(&self) -> bool {
        self.is_dirty() || item_guard(&self.working).autosave.is_some()
    }

    pub fn can_unlock(&self) -> bool {
        self.lock.can_unlock(&item_guard(&self.working))
    }

    pub fn is_locked_by_me(&self) -> bool {
        self.lock.is_locked_by_me(&item_guard(&self.working))
    }

    // ------------------------------------------------------------------
    // Workflow operations
    // ------------------------------------------------------------------

    /// Mark the session dirty and schedule a debounced autosave.
    pub fn autosave(&self) -> AbortHandle {
        self.dirty.store(true, Ordering::SeqCst);
        self.autosave.save(&self.working, &self.baseline)
    }

    /// Commit the working copy as a new version. On success the baseline is
    /// replaced wholesale with the saved state and the working copy
    /// re-derived from it.
    pub async fn save(&self) -> Result<Item, AuthoringError> {
        let baseline = self.baseline_item();
        let working = self.working_item();
        let saved = self.authoring.save(Some(&baseline), &working).await?;

        *item_guard(&self.baseline) = saved.clone();
        self.dirty.store(false, Ordering::SeqCst);
        self.close_preview();
        Ok(saved)
    }

    /// Apply a historical version onto the working copy and commit it.
    pub async fn revert(&self, version: &FieldMap) -> Result<Item, AuthoringError> {
        {
            let mut item = item_guard(&self.working);
            diff::forced_extend(&mut item.fields, version);
        }
        self.save().await
    }

    /// Publish the item, saving first (behind a confirmation) when dirty.
    /// Resolves to `None` when the user aborted the publish.
    pub async fn publish(&self) -> Result<Option<Item>, AuthoringError> {
        let to_publish = if self.is_dirty() {
            let baseline = self.baseline_item();
            let working = self.working_item();
            match self
                .authoring
                .publish_confirmation(&baseline, &working, true)
                .await?
            {
                PublishGate::Proceed(saved) => saved,
                PublishGate::Aborted => return Ok(None),
            }
        } else {
            self.baseline_item()
        };

        let published = self.authoring.publish(&to_publish).await?;
        *item_guard(&self.working) = published.clone();
        self.dirty.store(false, Ordering::SeqCst);
        Ok(Some(published))
    }

    /// Run the close sequence: optional confirmed save, then unlock. Sets
    /// the closing guard first so a late notification cannot reassert the
    /// editor mid-close; a cancelled close lifts the guard again.
    pub async fn close(&self) -> CloseOutcome {
        self.closing.store(true, Ordering::SeqCst);
        *self.phase_guard() = SessionPhase::Closing;

        let baseline = self.baseline_item();
        let working = self.working_item();
        let outcome = self.authoring.close(&working, &baseline, self.is_dirty()).await;

        match &outcome {
            CloseOutcome::Closed(item) => {
                *item_guard(&self.working) = item.clone();
                self.unsubscribe();
                *self.phase_guard() = SessionPhase::Closed;
            }
            CloseOutcome::Cancelled => {
                self.closing.store(false, Ordering::SeqCst);
                *self.phase_guard() = SessionPhase::Editing;
            }
        }
        outcome
    }

    /// Overlay a historical version read-only on the working copy. The
    /// baseline is untouched; nothing is persisted.
    pub fn preview(&self, version: &FieldMap) {
        {
            let mut item = item_guard(&self.working);
            diff::forced_extend(&mut item.fields, version);
            item.editable = false;
        }
        *self.phase_guard() = SessionPhase::Previewing;
    }

    /// Leave the preview: re-derive the working copy from the baseline plus
    /// any pending autosave and recompute editability from the lock state.
    /// Also the initial derivation at open time.
    pub fn close_preview(&self) {
        let baseline = self.baseline_item();
        let mut fresh = baseline.clone();
        if let Some(draft) = &baseline.autosave {
            diff::extend(&mut fresh.fields, &draft.fields);
        }
        fresh.editable = self.authoring.is_editable(&baseline);
        *item_guard(&self.working) = fresh;
        *self.phase_guard() = SessionPhase::Editing;
    }

    /// Take the item over: release whatever lock is recorded, force-acquire
    /// it for this session, and reset the editor state from the result.
    pub async fn take_over(&self) {
        let working = self.working_item();
        let unlocked = self.lock.unlock(working).await;
        let relocked = self.lock.lock(unlocked, true).await;
        self.reset_editor_state(relocked);
    }

    /// Merge a fresh lock result into working copy and baseline and
    /// recompute editability from it.
    fn reset_editor_state(&self, result: Item) {
        {
            let mut item = item_guard(&self.working);
            diff::extend(&mut item.fields, &result.fields);
            item.lock_user = result.lock_user.clone();
            item.lock_session = result.lock_session.clone();
            item.locked = result.locked;
            item.editable = !result.locked;
            item.autosave = None;
        }
        {
            let mut baseline = item_guard(&self.baseline);
            baseline.lock_user = result.lock_user;
            baseline.lock_session = result.lock_session;
        }
        self.dirty.store(false, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Cross-session notifications
    // ------------------------------------------------------------------

    /// Start consuming lock notifications. Replaces any previous listener.
    pub fn subscribe(&self, mut events: EventReceiver) {
        let session = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => session.handle_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("notification listener lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.listener_guard().replace(task) {
            previous.abort();
        }
    }

    fn unsubscribe(&self) {
        if let Some(task) = self.listener_guard().take() {
            task.abort();
        }
    }

    /// Apply one inbound lock event. Dropped when it concerns a different
    /// item, when it is this session's own echo, or when the session has
    /// begun closing.
    pub async fn handle_event(&self, event: &ItemEvent) {
        let item_id = item_guard(&self.working).id.clone();
        if event.item_id != item_id
            || event.session_id == self.identity.session_id()
            || self.closing.load(Ordering::SeqCst)
        {
            return;
        }

        match event.kind {
            ItemEventKind::Locked => {
                {
                    let mut item = item_guard(&self.working);
                    self.authoring.apply_remote_lock(&mut item, &event.user_id);
                    item.lock_session = Some(event.session_id.clone());
                    item.editable = false;
                }
                self.authoring.prompts().notify_locked(&event.user_id).await;
            }
            ItemEventKind::Unlocked => {
                {
                    let mut item = item_guard(&self.working);
                    self.authoring.apply_remote_unlock(&mut item);
                    item.editable = false;
                }
                self.authoring
                    .prompts()
                    .notify_unlocked(&event.user_id)
                    .await;
            }
        }
    }

    fn phase_guard(&self) -> std::sync::MutexGuard<'_, SessionPhase> {
        self.phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listener_guard(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
