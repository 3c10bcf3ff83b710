//! Core data model for the authoring coordination core

pub mod fields;
pub mod item;

pub use fields::{ContentField, FieldMap, FieldValue};
pub use item::{
    item_guard, shared, AutosaveRecord, Item, ItemId, LockState, SessionId, SharedItem, UserId,
};
