//! Quota planning for the built-in remote store.
//!
//! The built-in remote store enforces a hard total budget and a per-item
//! ceiling, so every push is planned first: truncate each list to the
//! configured cap (newest first), serialize, and keep halving the cap until
//! the payload fits. The serialized form that passed the check is returned
//! so the provider uploads exactly the bytes that were measured.

use stash_types::SyncSnapshot;
use thiserror::Error;

/// Total budget of the built-in remote store, in bytes.
pub const SYNC_QUOTA_BYTES: usize = 102_400;

/// Per-entry ceiling of the built-in remote store, in bytes.
pub const ITEM_BYTE_CEILING: usize = 8_192;

/// Default per-list item cap applied before a push.
pub const DEFAULT_MAX_ITEMS: usize = 50;

/// First fallback cap when the default payload exceeds the quota.
pub const FALLBACK_MAX_ITEMS: usize = DEFAULT_MAX_ITEMS / 2;

/// Errors from push planning.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Even with both lists emptied the envelope exceeds the quota.
    #[error("payload of {size} bytes exceeds the {quota}-byte quota even with empty lists")]
    EnvelopeTooLarge {
        /// Serialized size of the empty-list envelope.
        size: usize,
        /// The quota it was measured against.
        quota: usize,
    },
    /// The snapshot could not be serialized at all.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A push-ready snapshot and the serialized form that fit the quota.
#[derive(Debug, Clone)]
pub struct PushPlan {
    /// The snapshot after truncation.
    pub snapshot: SyncSnapshot,
    /// Serialized JSON whose size passed the quota check.
    pub payload: String,
    /// Per-list cap that made it fit.
    pub cap: usize,
    /// Items remaining across both lists.
    pub items_kept: usize,
}

impl PushPlan {
    /// True when the plan dropped items below the configured cap.
    pub fn fell_back(&self, configured_cap: usize) -> bool {
        self.cap < configured_cap
    }
}

/// Truncate `snapshot` until its serialized form fits `quota_bytes`.
///
/// Lists are cut to `max_items` first (they are stored newest-first, so
/// cutting the tail keeps the newest). If the payload is still too large
/// the cap halves per round (50 → 25 → 12 → …) down to zero; an envelope
/// that exceeds the quota with empty lists is a hard error.
pub fn plan_push(
    mut snapshot: SyncSnapshot,
    max_items: usize,
    quota_bytes: usize,
) -> Result<PushPlan, QuotaError> {
    let mut cap = max_items;

    loop {
        snapshot.lists.read_later.truncate(cap);
        snapshot.lists.tasks.truncate(cap);

        let payload = serde_json::to_string(&snapshot)?;
        if payload.len() <= quota_bytes {
            let items_kept = snapshot.lists.total_items();
            return Ok(PushPlan {
                snapshot,
                payload,
                cap,
                items_kept,
            });
        }

        if cap == 0 {
            return Err(QuotaError::EnvelopeTooLarge {
                size: payload.len(),
                quota: quota_bytes,
            });
        }
        cap /= 2;
    }
}
