//! In-memory record store
//!
//! A complete [`RecordStore`] implementation backed by process memory. It
//! enforces the same contracts a real backend would: conditional lock
//! acquisition, etag bumps on every committed write, stale-version rejection,
//! and autosave cleanup on a real save. Used by the integration tests and
//! useful as a harness for anything driving the workflow controller.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{LockGrant, RecordStore, StoreError};
use crate::diff;
use crate::types::{AutosaveRecord, FieldMap, Item, ItemId, SessionId, UserId};

#[derive(Default)]
struct Inner {
    items: HashMap<ItemId, Item>,
    autosaves: HashMap<ItemId, AutosaveRecord>,
    published: HashSet<ItemId>,
    etag_seq: u64,
    autosave_upserts: usize,
}

/// HashMap-backed record store behind a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, stamping a fresh etag.
    pub fn seed(&self, mut item: Item) {
        let mut inner = self.lock_inner();
        item.etag = Some(next_etag(&mut inner));
        inner.items.insert(item.id.clone(), item);
    }

    /// Current canonical state of an item.
    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.lock_inner().items.get(id).cloned()
    }

    /// Pending autosave record for an item, if any.
    pub fn autosave(&self, id: &ItemId) -> Option<AutosaveRecord> {
        self.lock_inner().autosaves.get(id).cloned()
    }

    pub fn is_published(&self, id: &ItemId) -> bool {
        self.lock_inner().published.contains(id)
    }

    /// How many autosave upserts have been persisted. Lets tests assert that
    /// the debounce collapsed repeated saves into a single persist.
    pub fn autosave_upserts(&self) -> usize {
        self.lock_inner().autosave_upserts
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn next_etag(inner: &mut Inner) -> String {
    inner.etag_seq += 1;
    format!("etag-{}", inner.etag_seq)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_item(&self, id: &ItemId) -> Result<Item, StoreError> {
        self.lock_inner()
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update_item(&self, item: &Item, diff: &FieldMap) -> Result<Item, StoreError> {
        let mut inner = self.lock_inner();
        let etag = next_etag(&mut inner);
        let stored = inner
            .items
            .get_mut(&item.id)
            .ok_or_else(|| StoreError::NotFound(item.id.clone()))?;

        if stored.etag.is_some() && stored.etag != item.etag {
            return Err(StoreError::StaleVersion);
        }

        diff::extend(&mut stored.fields, diff);
        stored.etag = Some(etag);
        let updated = stored.clone();

        // Committing a real save supersedes any pending autosave.
        inner.autosaves.remove(&item.id);
        Ok(updated)
    }

    async fn publish_item(&self, item: &Item) -> Result<Item, StoreError> {
        let mut inner = self.lock_inner();
        let etag = next_etag(&mut inner);
        let stored = inner
            .items
            .get_mut(&item.id)
            .ok_or_else(|| StoreError::NotFound(item.id.clone()))?;
        stored.etag = Some(etag);
        let published = stored.clone();
        inner.published.insert(item.id.clone());
        Ok(published)
    }

    async fn acquire_lock(
        &self,
        id: &ItemId,
        user: &UserId,
        session: &SessionId,
    ) -> Result<LockGrant, StoreError> {
        let mut inner = self.lock_inner();
        let etag = next_etag(&mut inner);
        let stored = inner
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if let Some(holder) = &stored.lock_session {
            if holder != session {
                return Err(StoreError::LockUnavailable(id.clone()));
            }
        }

        stored.lock_user = Some(user.clone());
        stored.lock_session = Some(session.clone());
        stored.etag = Some(etag.clone());
        Ok(LockGrant {
            lock_user: Some(user.clone()),
            lock_session: Some(session.clone()),
            etag: Some(etag),
        })
    }

    async fn release_lock(
        &self,
        id: &ItemId,
        session: &SessionId,
    ) -> Result<LockGrant, StoreError> {
        let mut inner = self.lock_inner();
        let etag = next_etag(&mut inner);
        let stored = inner
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if let Some(holder) = &stored.lock_session {
            if holder != session {
                return Err(StoreError::LockUnavailable(id.clone()));
            }
        }

        stored.lock_user = None;
        stored.lock_session = None;
        stored.etag = Some(etag.clone());
        Ok(LockGrant {
            lock_user: None,
            lock_session: None,
            etag: Some(etag),
        })
    }

    async fn fetch_autosave(&self, id: &ItemId) -> Result<AutosaveRecord, StoreError> {
        self.lock_inner()
            .autosaves
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn upsert_autosave(&self, draft: &AutosaveRecord) -> Result<AutosaveRecord, StoreError> {
        let mut inner = self.lock_inner();
        let mut saved = draft.clone();
        saved.updated_at = Utc::now();
        inner.autosave_upserts += 1;
        inner.autosaves.insert(saved.item_id.clone(), saved.clone());
        Ok(saved)
    }

    async fn remove_autosave(&self, draft: &AutosaveRecord) -> Result<(), StoreError> {
        self.lock_inner().autosaves.remove(&draft.item_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentField, FieldValue};

    fn article(id: &str) -> Item {
        let mut item = Item::new(id);
        item.fields
            .insert(ContentField::Headline, FieldValue::text("first take"));
        item
    }

    #[tokio::test]
    async fn update_bumps_etag_and_clears_autosave() {
        let store = MemoryStore::new();
        store.seed(article("a1"));
        let item = store.fetch_item(&"a1".to_string()).await.expect("fetch");

        let draft = AutosaveRecord::snapshot_of(&item);
        store.upsert_autosave(&draft).await.expect("upsert");
        assert!(store.autosave(&item.id).is_some());

        let mut diff = FieldMap::new();
        diff.insert(ContentField::Headline, FieldValue::text("second take"));
        let updated = store.update_item(&item, &diff).await.expect("update");

        assert_ne!(updated.etag, item.etag);
        assert_eq!(
            updated.fields.get(&ContentField::Headline),
            Some(&FieldValue::text("second take"))
        );
        assert!(store.autosave(&item.id).is_none());
    }

    #[tokio::test]
    async fn stale_etag_is_rejected() {
        let store = MemoryStore::new();
        store.seed(article("a1"));
        let mut item = store.fetch_item(&"a1".to_string()).await.expect("fetch");
        item.etag = Some("etag-stale".into());

        let err = store
            .update_item(&item, &FieldMap::new())
            .await
            .expect_err("must reject");
        assert!(matches!(err, StoreError::StaleVersion));
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_session() {
        let store = MemoryStore::new();
        store.seed(article("a1"));
        let id = "a1".to_string();

        store
            .acquire_lock(&id, &"u1".to_string(), &"s1".to_string())
            .await
            .expect("first acquire");

        let err = store
            .acquire_lock(&id, &"u2".to_string(), &"s2".to_string())
            .await
            .expect_err("second acquire must conflict");
        assert!(matches!(err, StoreError::LockUnavailable(_)));

        // Releasing from the wrong session is refused too.
        let err = store
            .release_lock(&id, &"s2".to_string())
            .await
            .expect_err("foreign release must fail");
        assert!(matches!(err, StoreError::LockUnavailable(_)));

        store
            .release_lock(&id, &"s1".to_string())
            .await
            .expect("owner release");
        assert!(store.item(&id).expect("item").lock_user.is_none());
    }
}
