//! # stash-core
//!
//! Pure sync logic for TabStash (no I/O, instant tests).
//!
//! This crate implements the algorithms behind synchronization without any
//! network or disk access:
//! - [`merge`] - reconcile two copies of the saved-tab lists
//! - [`plan_push`] - truncate a snapshot until it fits a remote quota
//! - [`scan_payload`] - refuse to upload anything credential-shaped
//! - [`ScheduleState`] - the debounce/interval/manual trigger state machine
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (remote stores, the local list store, timers) is performed
//! by `stash-sync`, which interprets the plans and actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod guard;
pub mod merge;
pub mod quota;
pub mod schedule;

pub use guard::{scan_payload, SecretLeak};
pub use merge::{merge, merge_list};
pub use quota::{
    plan_push, PushPlan, QuotaError, DEFAULT_MAX_ITEMS, FALLBACK_MAX_ITEMS, ITEM_BYTE_CEILING,
    SYNC_QUOTA_BYTES,
};
pub use schedule::{ScheduleAction, ScheduleEvent, ScheduleState, SyncTrigger};
