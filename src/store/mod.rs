//! Record store seam
//!
//! This module defines the abstract operations the coordination core needs
//! from its persistence backend: fetching and partially updating item
//! records, the lock and publish sub-resources, and the per-item autosave
//! side records. Transport and storage engine internals live behind this
//! trait.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AutosaveRecord, FieldMap, Item, ItemId, SessionId, UserId};

pub use memory::MemoryStore;

/// Structured field-level issues returned by a rejected save.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationIssues {
    /// The item's unique name collides with another record.
    pub unique_name_taken: bool,
    /// A backend validator rejected the payload with this message.
    pub validator_exception: Option<String>,
}

/// Error types for record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(ItemId),

    #[error("lock unavailable for item {0}")]
    LockUnavailable(ItemId),

    #[error("stale item version")]
    StaleVersion,

    #[error("validation failed")]
    Validation(ValidationIssues),

    #[error("network error: {0}")]
    Network(String),
}

/// The lock payload returned by the lock sub-resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LockGrant {
    pub lock_user: Option<UserId>,
    pub lock_session: Option<SessionId>,
    pub etag: Option<String>,
}

impl LockGrant {
    /// Merge this payload into an item's lock ownership fields.
    pub fn apply_to(&self, item: &mut Item) {
        item.lock_user = self.lock_user.clone();
        item.lock_session = self.lock_session.clone();
        if let Some(etag) = &self.etag {
            item.etag = Some(etag.clone());
        }
    }
}

/// Abstract key-record store the coordination core runs against.
///
/// All operations are keyed by item id. `update_item` applies a partial
/// update under optimistic concurrency: a stale etag fails with
/// [`StoreError::StaleVersion`] and nothing is retried here.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch an item with its lock holder embedded.
    async fn fetch_item(&self, id: &ItemId) -> Result<Item, StoreError>;

    /// Apply a partial update of whitelisted content fields to an item,
    /// committing a new canonical version.
    async fn update_item(&self, item: &Item, diff: &FieldMap) -> Result<Item, StoreError>;

    /// Commit an item to the publish sub-resource.
    async fn publish_item(&self, item: &Item) -> Result<Item, StoreError>;

    /// Request exclusive lock acquisition for an item.
    async fn acquire_lock(
        &self,
        id: &ItemId,
        user: &UserId,
        session: &SessionId,
    ) -> Result<LockGrant, StoreError>;

    /// Request lock release for an item.
    async fn release_lock(&self, id: &ItemId, session: &SessionId)
        -> Result<LockGrant, StoreError>;

    /// Fetch the pending autosave record for an item, if any.
    async fn fetch_autosave(&self, id: &ItemId) -> Result<AutosaveRecord, StoreError>;

    /// Create or refresh the autosave record for an item.
    async fn upsert_autosave(&self, draft: &AutosaveRecord) -> Result<AutosaveRecord, StoreError>;

    /// Delete an autosave record.
    async fn remove_autosave(&self, draft: &AutosaveRecord) -> Result<(), StoreError>;
}
