//! # stash-store
//!
//! The local list store: canonical persistence for the two saved-tab lists,
//! device identity, sync settings, and the last sync status.
//!
//! Everything goes through one async interface, [`LocalStore`], which is
//! constructor-injected into providers and the orchestrator. Writes are
//! atomic per key (a crash can lose an in-flight write, never half a list),
//! and every write touching a list is announced on a push-based change feed
//! so the orchestrator can schedule a debounced sync.
//!
//! Two implementations ship here:
//! - [`MemoryStore`] - in-process, for tests and embedders that bridge to
//!   their own persistence
//! - [`JsonFileStore`] - one JSON file per key, atomic via
//!   write-temp-then-rename

#![warn(missing_docs)]
#![warn(clippy::all)]

mod file;
mod store;

pub use file::JsonFileStore;
pub use store::{ListChange, LocalStore, MemoryStore, StoreError};
