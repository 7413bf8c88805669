//! The built-in provider: sync through the browser's own replicated
//! key-value area.
//!
//! Everything lives in one document under a single shared key, so the
//! whole snapshot replaces atomically; older builds spread the same data
//! over flat per-list keys, and the pull path migrates that layout on
//! first contact.
//!
//! Settings travel inside the snapshot. The remote area is scoped to the
//! user's own account, so carrying the settings block (credential
//! included) hands a fresh install its configuration and lets it recover
//! gist data on its own.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let provider = BuiltinProvider::new(MemoryRemoteKv::new(), store);
//! let report = provider.perform_sync().await;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use stash_core::{merge, plan_push, SYNC_QUOTA_BYTES};
use stash_store::LocalStore;
use stash_types::{ListName, SyncSettings, SyncSnapshot};

use crate::error::ProviderError;
use crate::provider::{PullOutcome, PushOutcome, SkipReason, SyncProvider};
use crate::transport::RemoteKv;

/// The one key every installation reads and writes.
pub const SHARED_SYNC_KEY: &str = "tabstash_extension_data";

/// Flat keys older builds wrote, migrated away on first pull.
const LEGACY_KEYS: [&str; 4] = ["readLater", "tasks", "lastSyncedAt", "deviceId"];

/// Scratch key for the availability probe.
const PROBE_KEY: &str = "tabstash_sync_probe";

/// Sync provider over a [`RemoteKv`] area.
pub struct BuiltinProvider<K> {
    remote: K,
    store: Arc<dyn LocalStore>,
}

impl<K: RemoteKv> BuiltinProvider<K> {
    /// Build a provider over `remote`, persisting through `store`.
    pub fn new(remote: K, store: Arc<dyn LocalStore>) -> Self {
        Self { remote, store }
    }

    /// Check that the remote area actually stores data: write a probe
    /// value, read it back, clean up. Never errors; an unusable area
    /// reports `false`.
    pub async fn probe_remote(&self) -> bool {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Err(error) = self.remote.set(PROBE_KEY, stamp.clone()).await {
            tracing::warn!(%error, "remote area probe write failed");
            return false;
        }
        let read = self.remote.get(PROBE_KEY).await;
        if let Err(error) = self.remote.remove(&[PROBE_KEY]).await {
            tracing::debug!(%error, "probe key cleanup failed");
        }
        match read {
            Ok(Some(value)) if value == stamp => true,
            Ok(_) => {
                tracing::warn!("remote area probe read back a different value");
                false
            }
            Err(error) => {
                tracing::warn!(%error, "remote area probe read failed");
                false
            }
        }
    }

    /// The remote snapshot, if one exists in either layout.
    ///
    /// A shared-key document without a timestamp is treated the same as an
    /// absent one: both fall through to the legacy-layout check.
    async fn read_remote_snapshot(&self) -> Result<Option<SyncSnapshot>, ProviderError> {
        if let Some(raw) = self.remote.get(SHARED_SYNC_KEY).await? {
            let snapshot = parse_snapshot(&raw)?;
            if snapshot.last_synced_at.is_some() {
                return Ok(Some(snapshot));
            }
        }
        self.migrate_legacy().await
    }

    /// Read the flat-key layout, rewrite it under the shared key, and
    /// remove the old keys. Gated on the legacy timestamp: without one
    /// there is nothing worth migrating.
    async fn migrate_legacy(&self) -> Result<Option<SyncSnapshot>, ProviderError> {
        let raw_stamp = match self.remote.get("lastSyncedAt").await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let last_synced_at: String = serde_json::from_str(&raw_stamp)
            .map_err(|error| ProviderError::Format(format!("legacy lastSyncedAt: {error}")))?;

        let mut snapshot = SyncSnapshot {
            last_synced_at: Some(last_synced_at),
            ..Default::default()
        };
        for name in ListName::ALL {
            if let Some(raw) = self.remote.get(name.as_str()).await? {
                *snapshot.lists.list_mut(name) = serde_json::from_str(&raw)
                    .map_err(|error| ProviderError::Format(format!("legacy {name}: {error}")))?;
            }
        }
        if let Some(raw) = self.remote.get("deviceId").await? {
            snapshot.device_id = serde_json::from_str(&raw)
                .map_err(|error| ProviderError::Format(format!("legacy deviceId: {error}")))?;
        }

        let payload = serde_json::to_string(&snapshot)?;
        self.remote.set(SHARED_SYNC_KEY, payload).await?;
        self.remote.remove(&LEGACY_KEYS).await?;
        tracing::info!("migrated legacy flat-key layout to the shared sync key");
        Ok(Some(snapshot))
    }
}

fn parse_snapshot(raw: &str) -> Result<SyncSnapshot, ProviderError> {
    serde_json::from_str(raw)
        .map_err(|error| ProviderError::Format(format!("shared sync key: {error}")))
}

#[async_trait]
impl<K: RemoteKv> SyncProvider for BuiltinProvider<K> {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn enabled(&self, settings: &SyncSettings) -> bool {
        settings.builtin.enabled
    }

    async fn pull(&self) -> Result<PullOutcome, ProviderError> {
        let remote = match self.read_remote_snapshot().await? {
            Some(snapshot) => snapshot,
            None => return Ok(PullOutcome::Skipped(SkipReason::NothingToMerge)),
        };

        let device = self.store.device_id().await?;
        if remote.is_from(&device) {
            tracing::debug!("remote snapshot is our own write, skipping merge");
            return Ok(PullOutcome::Skipped(SkipReason::SameDevice));
        }
        if remote.lists.is_empty() {
            return Ok(PullOutcome::Skipped(SkipReason::NothingToMerge));
        }

        let local = self.store.read_lists(&ListName::ALL).await?;
        let merged = merge(&local, &remote.lists);
        let items_merged = merged.total_items();
        self.store.replace_lists(&merged).await?;

        // The snapshot's settings block replaces ours wholesale, so a
        // fresh install inherits config (and the gist credential) from
        // the user's other devices.
        if let Some(settings) = remote.settings {
            tracing::debug!("applying settings carried in the remote snapshot");
            self.store.write_settings(&settings).await?;
        }

        tracing::info!(items = items_merged, "merged remote snapshot");
        Ok(PullOutcome::Merged { items_merged })
    }

    async fn push(&self) -> Result<PushOutcome, ProviderError> {
        let settings = self.store.read_settings().await?;
        let lists = self.store.read_lists(&ListName::ALL).await?;
        let device = self.store.device_id().await?;

        let max_items = settings.builtin.max_items;
        let snapshot = SyncSnapshot::new(lists, device).with_settings(settings);
        let plan = plan_push(snapshot, max_items, SYNC_QUOTA_BYTES)?;
        let truncated = plan.fell_back(max_items);
        if truncated {
            tracing::warn!(
                cap = plan.cap,
                configured = max_items,
                "quota pressure forced the per-list cap down"
            );
        }

        self.remote.set(SHARED_SYNC_KEY, plan.payload).await?;
        tracing::debug!(items = plan.items_kept, "pushed snapshot to the shared key");
        Ok(PushOutcome {
            items_pushed: plan.items_kept,
            truncated,
            document_url: None,
        })
    }
}
