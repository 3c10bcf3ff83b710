// Copydesk - Collaborative Authoring Coordination Core

pub mod authoring;
pub mod autosave;
pub mod diff;
pub mod identity;
pub mod lock;
pub mod store;
pub mod types;
