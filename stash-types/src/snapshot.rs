//! Snapshot types exchanged with remote stores.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, Item, ListName, SyncSettings};

/// The two lists as one unit.
///
/// This is what the merge engine operates on and what providers read from
/// and write back to the local store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLists {
    /// The read-later list.
    #[serde(default)]
    pub read_later: Vec<Item>,
    /// The tasks list.
    #[serde(default)]
    pub tasks: Vec<Item>,
}

impl SnapshotLists {
    /// Borrow one list by name.
    pub fn list(&self, name: ListName) -> &[Item] {
        match name {
            ListName::ReadLater => &self.read_later,
            ListName::Tasks => &self.tasks,
        }
    }

    /// Mutably borrow one list by name.
    pub fn list_mut(&mut self, name: ListName) -> &mut Vec<Item> {
        match name {
            ListName::ReadLater => &mut self.read_later,
            ListName::Tasks => &mut self.tasks,
        }
    }

    /// Total number of items across both lists.
    pub fn total_items(&self) -> usize {
        self.read_later.len() + self.tasks.len()
    }

    /// True when both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.read_later.is_empty() && self.tasks.is_empty()
    }
}

/// The unit exchanged with a remote store.
///
/// Recomputed on every push, never persisted locally. The `settings` block
/// only travels through the built-in provider; `synced_from`/`app_version`
/// only through the gist provider's data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    /// The two lists, flattened to top-level `readLater`/`tasks` keys.
    #[serde(flatten)]
    pub lists: SnapshotLists,
    /// When the originating device pushed this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<String>,
    /// Which device pushed this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Sync settings, carried between a user's own devices (built-in
    /// provider only; never written to the gist document).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SyncSettings>,
    /// Fixed application label (gist data file only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_from: Option<String>,
    /// Application version that wrote the snapshot (gist data file only).
    #[serde(default, rename = "version", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl SyncSnapshot {
    /// Build a snapshot of `lists` stamped with the current UTC time and
    /// the originating device.
    pub fn new(lists: SnapshotLists, device_id: DeviceId) -> Self {
        Self {
            lists,
            last_synced_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            device_id: Some(device_id),
            settings: None,
            synced_from: None,
            app_version: None,
        }
    }

    /// Attach a settings block (built-in provider pushes).
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Attach the application label and version (gist pushes).
    pub fn with_origin(mut self, label: impl Into<String>, version: impl Into<String>) -> Self {
        self.synced_from = Some(label.into());
        self.app_version = Some(version.into());
        self
    }

    /// True when this snapshot was pushed by `device`.
    pub fn is_from(&self, device: &DeviceId) -> bool {
        self.device_id.as_ref() == Some(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_flatten_to_top_level_keys() {
        let mut lists = SnapshotLists::default();
        lists.read_later.push(Item::new("https://a.example"));
        let snapshot = SyncSnapshot::new(lists, DeviceId::generate());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"readLater\""));
        assert!(json.contains("\"tasks\""));
        assert!(json.contains("\"lastSyncedAt\""));
        assert!(json.contains("\"deviceId\""));
        // Fields for the other provider stay off the wire.
        assert!(!json.contains("\"settings\""));
        assert!(!json.contains("\"syncedFrom\""));
    }

    #[test]
    fn app_version_serializes_as_version() {
        let snapshot = SyncSnapshot::new(SnapshotLists::default(), DeviceId::generate())
            .with_origin("TabStash", "0.1.0");
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"version\":\"0.1.0\""));
        assert!(json.contains("\"syncedFrom\":\"TabStash\""));
    }

    #[test]
    fn empty_remote_object_parses() {
        let snapshot: SyncSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.lists.is_empty());
        assert!(snapshot.last_synced_at.is_none());
        assert!(snapshot.device_id.is_none());
    }

    #[test]
    fn is_from_matches_device() {
        let mine = DeviceId::generate();
        let theirs = DeviceId::generate();
        let snapshot = SyncSnapshot::new(SnapshotLists::default(), mine.clone());
        assert!(snapshot.is_from(&mine));
        assert!(!snapshot.is_from(&theirs));

        let untagged = SyncSnapshot::default();
        assert!(!untagged.is_from(&mine));
    }

    #[test]
    fn list_accessors_select_by_name() {
        let mut lists = SnapshotLists::default();
        lists
            .list_mut(ListName::Tasks)
            .push(Item::new("https://t.example"));
        assert_eq!(lists.list(ListName::Tasks).len(), 1);
        assert!(lists.list(ListName::ReadLater).is_empty());
        assert_eq!(lists.total_items(), 1);
    }
}
