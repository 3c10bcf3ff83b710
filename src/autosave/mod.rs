//! Autosave coordinator
//!
//! Debounces local edits into periodic background persistence of a working
//! copy, independent of the canonical record. One trailing-edge timer per
//! item id: re-arming cancels the pending timer, but a persist whose timer
//! already fired is fire-and-forget; its response is merged back whenever it
//! arrives, last writer wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

use crate::diff;
use crate::store::RecordStore;
use crate::types::{item_guard, AutosaveRecord, Item, ItemId, SharedItem};

/// Debounce delay between the last edit and the background persist.
pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(3000);

pub struct AutosaveService {
    store: Arc<dyn RecordStore>,
    delay: Duration,
    timers: Mutex<HashMap<ItemId, JoinHandle<()>>>,
}

impl AutosaveService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_delay(store, AUTOSAVE_DELAY)
    }

    pub fn with_delay(store: Arc<dyn RecordStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Attach any pending autosave record to an item being opened.
    ///
    /// Skipped when the item is locked elsewhere or explicitly read-only:
    /// there is no autosave this session could resume. A missing record is
    /// not an error; absence is the common case.
    pub async fn open(&self, mut item: Item) -> Item {
        if item.locked || item.read_only {
            return item;
        }
        match self.store.fetch_autosave(&item.id).await {
            Ok(draft) => item.autosave = Some(draft),
            Err(err) => log::debug!("no autosave for item {}: {}", item.id, err),
        }
        item
    }

    /// Schedule a debounced persist of the working copy.
    ///
    /// Cancels any pending timer for the same item, then arms a new one.
    /// When the delay elapses uncancelled the current content fields are
    /// snapshotted and upserted as the item's autosave record; the response
    /// merges back into the working copy field by field and the new record is
    /// stamped onto both working copy and baseline, so later diffing accounts
    /// for the autosaved state. Returns a handle that cancels the timer.
    pub fn save(&self, working: &SharedItem, baseline: &SharedItem) -> AbortHandle {
        let item_id = item_guard(working).id.clone();
        self.stop(&item_id);

        let store = Arc::clone(&self.store);
        let delay = self.delay;
        let working = Arc::clone(working);
        let baseline = Arc::clone(baseline);
        let id = item_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Once the timer has fired the persist itself is fire-and-forget;
            // a later stop() no longer reaches it.
            tokio::spawn(async move {
                let draft = AutosaveRecord::snapshot_of(&item_guard(&working));
                match store.upsert_autosave(&draft).await {
                    Ok(saved) => {
                        {
                            let mut item = item_guard(&working);
                            diff::extend(&mut item.fields, &saved.fields);
                            item.autosave = Some(saved.clone());
                        }
                        item_guard(&baseline).autosave = Some(saved);
                    }
                    Err(err) => {
                        log::warn!("autosave persist failed for item {}: {}", id, err);
                    }
                }
            });
        });

        let handle = task.abort_handle();
        self.timers_guard().insert(item_id, task);
        handle
    }

    /// Cancel any pending persist timer for an item. Idempotent.
    pub fn stop(&self, item_id: &ItemId) {
        if let Some(task) = self.timers_guard().remove(item_id) {
            task.abort();
        }
    }

    /// Stop any pending persist, delete the stored autosave record and clear
    /// the in-memory pointer. Deletion failures are logged, not surfaced;
    /// the discard already happened from the session's point of view.
    pub async fn discard(&self, working: &SharedItem) {
        let (item_id, draft) = {
            let mut item = item_guard(working);
            (item.id.clone(), item.autosave.take())
        };
        self.stop(&item_id);
        if let Some(draft) = draft {
            if let Err(err) = self.store.remove_autosave(&draft).await {
                log::warn!("failed to remove autosave for item {}: {}", item_id, err);
            }
        }
    }

    fn timers_guard(&self) -> std::sync::MutexGuard<'_, HashMap<ItemId, JoinHandle<()>>> {
        self.timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
