//! # stash-types
//!
//! Data and wire types for the TabStash sync engine.
//!
//! This crate provides the foundational types used across all TabStash crates:
//! - [`Item`], [`ListName`] - A saved tab and the list it lives in
//! - [`ItemId`], [`DeviceId`] - Identity types
//! - [`SnapshotLists`], [`SyncSnapshot`] - The units exchanged with remote stores
//! - [`SyncSettings`], [`Token`] - Sync configuration
//! - [`SyncStatus`] - Last-run outcome record
//!
//! Everything here serializes as camelCase JSON, the format the extension
//! already stores and exchanges.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ids;
mod item;
mod settings;
mod snapshot;
mod status;

pub use ids::{DeviceId, ItemId};
pub use item::{Item, ListName};
pub use settings::{BuiltinSyncSettings, GistSyncSettings, SyncSettings, Token};
pub use snapshot::{SnapshotLists, SyncSnapshot};
pub use status::SyncStatus;
