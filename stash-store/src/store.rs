//! The `LocalStore` interface and the in-memory implementation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use stash_types::{DeviceId, Item, ItemId, ListName, SnapshotLists, SyncSettings, SyncStatus};

/// Capacity of the change feed. A lagged receiver only loses coalescable
/// "something changed" hints, never data.
const CHANGE_FEED_CAPACITY: usize = 64;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted value could not be parsed.
    #[error("stored value for {key} is not valid JSON: {source}")]
    Corrupt {
        /// The storage key that failed to parse.
        key: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for writing.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Emitted on the change feed after a write touched one or both lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange {
    /// The lists the write touched.
    pub lists: Vec<ListName>,
}

impl ListChange {
    fn one(name: ListName) -> Self {
        Self { lists: vec![name] }
    }

    fn both() -> Self {
        Self {
            lists: ListName::ALL.to_vec(),
        }
    }
}

/// Canonical persistence for lists, device identity, settings, and status.
///
/// The store exclusively owns the lists; providers read a copy, merge, and
/// write the result back as a whole-list replace. There is no cross-caller
/// locking: two read-modify-write sequences can interleave and the later
/// write wins wholesale. That is the documented concurrency model, not a
/// bug to fix here.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read the named lists. An absent key reads as an empty list; lists
    /// that were not requested stay empty in the result.
    async fn read_lists(&self, names: &[ListName]) -> Result<SnapshotLists, StoreError>;

    /// Replace one list wholesale.
    async fn replace_list(&self, name: ListName, items: Vec<Item>) -> Result<(), StoreError>;

    /// Replace both lists. Each list write is atomic on its own key.
    async fn replace_lists(&self, lists: &SnapshotLists) -> Result<(), StoreError>;

    /// The persisted device identity, generated and persisted on first use.
    async fn device_id(&self) -> Result<DeviceId, StoreError>;

    /// Read settings; an absent or partial object merges with defaults.
    async fn read_settings(&self) -> Result<SyncSettings, StoreError>;

    /// Persist settings.
    async fn write_settings(&self, settings: &SyncSettings) -> Result<(), StoreError>;

    /// Read the last sync status, if any cycle has run yet.
    async fn read_status(&self) -> Result<Option<SyncStatus>, StoreError>;

    /// Persist the sync status for UI consumption.
    async fn write_status(&self, status: &SyncStatus) -> Result<(), StoreError>;

    /// Subscribe to list-change notifications. Every write that touches
    /// `readLater`/`tasks` is announced, including writes made by sync
    /// providers.
    fn subscribe(&self) -> broadcast::Receiver<ListChange>;

    /// Prepend a freshly saved item (lists are kept newest-first).
    async fn save_item(&self, name: ListName, item: Item) -> Result<(), StoreError> {
        let mut lists = self.read_lists(&[name]).await?;
        let list = lists.list_mut(name);
        list.insert(0, item);
        self.replace_list(name, std::mem::take(list)).await
    }

    /// Delete an item by its local id. Returns whether anything was removed.
    async fn delete_item(&self, name: ListName, id: &ItemId) -> Result<bool, StoreError> {
        let mut lists = self.read_lists(&[name]).await?;
        let list = lists.list_mut(name);
        let before = list.len();
        list.retain(|item| &item.id != id);
        if list.len() == before {
            return Ok(false);
        }
        self.replace_list(name, std::mem::take(list)).await?;
        Ok(true)
    }
}

#[derive(Default)]
struct MemoryInner {
    lists: SnapshotLists,
    device_id: Option<DeviceId>,
    settings: Option<SyncSettings>,
    status: Option<SyncStatus>,
}

/// In-memory store.
///
/// Thread-safe and cheap to clone (clones share state). Used by tests and
/// by embedders that bridge persistence themselves.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    changes: broadcast::Sender<ListChange>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            changes,
        }
    }

    fn announce(&self, change: ListChange) {
        // No receivers is fine; the feed is best-effort.
        let _ = self.changes.send(change);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn read_lists(&self, names: &[ListName]) -> Result<SnapshotLists, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out = SnapshotLists::default();
        for &name in names {
            *out.list_mut(name) = inner.lists.list(name).to_vec();
        }
        Ok(out)
    }

    async fn replace_list(&self, name: ListName, items: Vec<Item>) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            *inner.lists.list_mut(name) = items;
        }
        self.announce(ListChange::one(name));
        Ok(())
    }

    async fn replace_lists(&self, lists: &SnapshotLists) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.lists = lists.clone();
        }
        self.announce(ListChange::both());
        Ok(())
    }

    async fn device_id(&self) -> Result<DeviceId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .device_id
            .get_or_insert_with(DeviceId::generate)
            .clone())
    }

    async fn read_settings(&self) -> Result<SyncSettings, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.settings.clone().unwrap_or_default())
    }

    async fn write_settings(&self, settings: &SyncSettings) -> Result<(), StoreError> {
        self.inner.lock().unwrap().settings = Some(settings.clone());
        Ok(())
    }

    async fn read_status(&self) -> Result<Option<SyncStatus>, StoreError> {
        Ok(self.inner.lock().unwrap().status.clone())
    }

    async fn write_status(&self, status: &SyncStatus) -> Result<(), StoreError> {
        self.inner.lock().unwrap().status = Some(status.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ListChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str) -> Item {
        Item::new(url)
    }

    // ====== Lists ======

    #[tokio::test]
    async fn absent_lists_read_as_empty() {
        let store = MemoryStore::new();
        let lists = store.read_lists(&ListName::ALL).await.unwrap();
        assert!(lists.is_empty());
    }

    #[tokio::test]
    async fn unrequested_lists_stay_empty_in_the_result() {
        let store = MemoryStore::new();
        store
            .replace_list(ListName::Tasks, vec![item("https://t.example")])
            .await
            .unwrap();

        let lists = store.read_lists(&[ListName::ReadLater]).await.unwrap();
        assert!(lists.read_later.is_empty());
        assert!(lists.tasks.is_empty());

        let lists = store.read_lists(&[ListName::Tasks]).await.unwrap();
        assert_eq!(lists.tasks.len(), 1);
    }

    #[tokio::test]
    async fn replace_lists_overwrites_both() {
        let store = MemoryStore::new();
        store
            .replace_list(ListName::ReadLater, vec![item("https://old.example")])
            .await
            .unwrap();

        let mut fresh = SnapshotLists::default();
        fresh.tasks.push(item("https://new.example"));
        store.replace_lists(&fresh).await.unwrap();

        let lists = store.read_lists(&ListName::ALL).await.unwrap();
        assert!(lists.read_later.is_empty());
        assert_eq!(lists.tasks.len(), 1);
    }

    // ====== Item helpers ======

    #[tokio::test]
    async fn save_item_prepends_newest_first() {
        let store = MemoryStore::new();
        store
            .save_item(ListName::ReadLater, item("https://first.example"))
            .await
            .unwrap();
        store
            .save_item(ListName::ReadLater, item("https://second.example"))
            .await
            .unwrap();

        let lists = store.read_lists(&[ListName::ReadLater]).await.unwrap();
        assert_eq!(lists.read_later[0].url, "https://second.example");
        assert_eq!(lists.read_later[1].url, "https://first.example");
    }

    #[tokio::test]
    async fn delete_item_removes_by_id_only() {
        let store = MemoryStore::new();
        let keep = item("https://keep.example");
        let drop = item("https://drop.example");
        let drop_id = drop.id.clone();
        store.save_item(ListName::Tasks, keep).await.unwrap();
        store.save_item(ListName::Tasks, drop).await.unwrap();

        assert!(store.delete_item(ListName::Tasks, &drop_id).await.unwrap());
        // Second delete is a no-op.
        assert!(!store.delete_item(ListName::Tasks, &drop_id).await.unwrap());

        let lists = store.read_lists(&[ListName::Tasks]).await.unwrap();
        assert_eq!(lists.tasks.len(), 1);
        assert_eq!(lists.tasks[0].url, "https://keep.example");
    }

    // ====== Device identity ======

    #[tokio::test]
    async fn device_id_is_generated_once_and_stable() {
        let store = MemoryStore::new();
        let first = store.device_id().await.unwrap();
        let second = store.device_id().await.unwrap();
        assert_eq!(first, second);

        // Clones share the same identity.
        let clone = store.clone();
        assert_eq!(clone.device_id().await.unwrap(), first);
    }

    // ====== Settings and status ======

    #[tokio::test]
    async fn settings_default_until_written() {
        let store = MemoryStore::new();
        assert_eq!(store.read_settings().await.unwrap(), SyncSettings::default());

        let settings = SyncSettings {
            gist: stash_types::GistSyncSettings {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        store.write_settings(&settings).await.unwrap();
        assert!(store.read_settings().await.unwrap().gist.enabled);
    }

    #[tokio::test]
    async fn status_starts_absent_and_overwrites() {
        let store = MemoryStore::new();
        assert!(store.read_status().await.unwrap().is_none());

        store
            .write_status(&SyncStatus::now(true, true, 5, 10))
            .await
            .unwrap();
        store
            .write_status(&SyncStatus::now(false, true, 1, 2))
            .await
            .unwrap();

        let status = store.read_status().await.unwrap().unwrap();
        assert!(!status.pull_success);
        assert_eq!(status.items_merged, 2);
    }

    // ====== Change feed ======

    #[tokio::test]
    async fn list_writes_are_announced() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();

        store
            .replace_list(ListName::ReadLater, vec![item("https://a.example")])
            .await
            .unwrap();
        assert_eq!(
            feed.recv().await.unwrap(),
            ListChange {
                lists: vec![ListName::ReadLater]
            }
        );

        store.replace_lists(&SnapshotLists::default()).await.unwrap();
        assert_eq!(
            feed.recv().await.unwrap(),
            ListChange {
                lists: ListName::ALL.to_vec()
            }
        );
    }

    #[tokio::test]
    async fn settings_and_status_writes_are_not_announced() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();

        store
            .write_settings(&SyncSettings::default())
            .await
            .unwrap();
        store
            .write_status(&SyncStatus::now(true, true, 0, 0))
            .await
            .unwrap();

        assert!(matches!(
            feed.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn helpers_announce_through_the_replace_path() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();

        store
            .save_item(ListName::Tasks, item("https://t.example"))
            .await
            .unwrap();
        assert_eq!(feed.recv().await.unwrap().lists, vec![ListName::Tasks]);
    }

    // ====== Documented concurrency hazard ======

    #[tokio::test]
    async fn stale_whole_list_replace_resurrects_a_concurrent_delete() {
        // A provider's pull reads the lists, merges, then writes the merged
        // copy back. A delete landing between that read and write is
        // overwritten: last writer wins at whole-list granularity. This is
        // the accepted best-effort model, demonstrated here on the raw
        // store interface.
        let store = MemoryStore::new();
        let doomed = item("https://doomed.example");
        let doomed_id = doomed.id.clone();
        store.save_item(ListName::ReadLater, doomed).await.unwrap();

        // "Pull" reads its snapshot...
        let snapshot = store.read_lists(&ListName::ALL).await.unwrap();

        // ...the user deletes the item meanwhile...
        assert!(store
            .delete_item(ListName::ReadLater, &doomed_id)
            .await
            .unwrap());

        // ...and the pull's merged write brings it back.
        store.replace_lists(&snapshot).await.unwrap();
        let lists = store.read_lists(&[ListName::ReadLater]).await.unwrap();
        assert_eq!(lists.read_later.len(), 1);
        assert_eq!(lists.read_later[0].url, "https://doomed.example");
    }
}
