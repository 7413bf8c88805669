//! File-backed store: one JSON file per top-level key.
//!
//! Layout inside the data directory:
//!
//! ```text
//! readLater.json   tasks.json   deviceId.json   settings.json   syncStatus.json
//! ```
//!
//! Each write lands in a `.tmp` sibling first and is renamed into place, so
//! a crash mid-write leaves the previous value intact. Writes serialize
//! through a store-level lock, one write+rename in flight at a time.
//! Atomicity is per key; replacing both lists is two independent renames.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use stash_types::{DeviceId, Item, ListName, SnapshotLists, SyncSettings, SyncStatus};

use crate::store::{ListChange, LocalStore, StoreError};

const DEVICE_ID_KEY: &str = "deviceId";
const SETTINGS_KEY: &str = "settings";
const STATUS_KEY: &str = "syncStatus";

/// A [`LocalStore`] persisting each key as a JSON file in one directory.
#[derive(Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    changes: broadcast::Sender<ListChange>,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            dir,
            changes,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The directory this store persists into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_owned(),
                    source,
                }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_file(key, value).await
    }

    /// Serialize and publish one key. Caller holds `write_lock`; the temp
    /// name is shared, so only one write may be in flight.
    async fn write_file<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(value)?;
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, self.path_for(key)).await?;
        Ok(())
    }

    fn announce(&self, change: ListChange) {
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn read_lists(&self, names: &[ListName]) -> Result<SnapshotLists, StoreError> {
        let mut out = SnapshotLists::default();
        for &name in names {
            if let Some(items) = self.read_value::<Vec<Item>>(name.as_str()).await? {
                *out.list_mut(name) = items;
            }
        }
        Ok(out)
    }

    async fn replace_list(&self, name: ListName, items: Vec<Item>) -> Result<(), StoreError> {
        self.write_value(name.as_str(), &items).await?;
        self.announce(ListChange {
            lists: vec![name],
        });
        Ok(())
    }

    async fn replace_lists(&self, lists: &SnapshotLists) -> Result<(), StoreError> {
        for name in ListName::ALL {
            self.write_value(name.as_str(), lists.list(name)).await?;
        }
        self.announce(ListChange {
            lists: ListName::ALL.to_vec(),
        });
        Ok(())
    }

    async fn device_id(&self) -> Result<DeviceId, StoreError> {
        // Read-or-create under the write lock; concurrent first calls must
        // all return the one persisted id.
        let _guard = self.write_lock.lock().await;
        if let Some(id) = self.read_value::<DeviceId>(DEVICE_ID_KEY).await? {
            return Ok(id);
        }
        let id = DeviceId::generate();
        self.write_file(DEVICE_ID_KEY, &id).await?;
        Ok(id)
    }

    async fn read_settings(&self) -> Result<SyncSettings, StoreError> {
        Ok(self
            .read_value::<SyncSettings>(SETTINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn write_settings(&self, settings: &SyncSettings) -> Result<(), StoreError> {
        self.write_value(SETTINGS_KEY, settings).await
    }

    async fn read_status(&self) -> Result<Option<SyncStatus>, StoreError> {
        self.read_value(STATUS_KEY).await
    }

    async fn write_status(&self, status: &SyncStatus) -> Result<(), StoreError> {
        self.write_value(STATUS_KEY, status).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ListChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(url: &str) -> Item {
        Item::new(url)
    }

    #[tokio::test]
    async fn lists_round_trip_through_files() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        let mut lists = SnapshotLists::default();
        lists.read_later.push(item("https://a.example").with_note("n"));
        lists.tasks.push(item("https://b.example"));
        store.replace_lists(&lists).await.unwrap();

        let loaded = store.read_lists(&ListName::ALL).await.unwrap();
        assert_eq!(loaded, lists);

        assert!(dir.path().join("readLater.json").exists());
        assert!(dir.path().join("tasks.json").exists());
    }

    #[tokio::test]
    async fn missing_files_read_as_empty_lists() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let lists = store.read_lists(&ListName::ALL).await.unwrap();
        assert!(lists.is_empty());
    }

    #[tokio::test]
    async fn device_id_survives_reopen() {
        let dir = tempdir().unwrap();
        let first = {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.device_id().await.unwrap()
        };
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.device_id().await.unwrap(), first);
    }

    #[tokio::test]
    async fn settings_merge_with_defaults_on_read() {
        let dir = tempdir().unwrap();
        // A partial object written by an older build.
        tokio::fs::write(
            dir.path().join("settings.json"),
            r#"{"docSync":{"enabled":true,"token":"ghp_x"}}"#,
        )
        .await
        .unwrap();

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let settings = store.read_settings().await.unwrap();
        assert!(settings.gist.enabled);
        assert_eq!(settings.builtin.max_items, 50);
    }

    #[tokio::test]
    async fn corrupt_file_reports_its_key() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("tasks.json"), "{not json")
            .await
            .unwrap();

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let err = store.read_lists(&[ListName::Tasks]).await.unwrap_err();
        match err {
            StoreError::Corrupt { key, .. } => assert_eq!(key, "tasks"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn leftover_tmp_file_is_ignored() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store
            .replace_list(ListName::ReadLater, vec![item("https://a.example")])
            .await
            .unwrap();

        // Simulate a crash that left a half-written temp file behind.
        tokio::fs::write(dir.path().join("readLater.json.tmp"), "{trunc")
            .await
            .unwrap();

        let lists = store.read_lists(&[ListName::ReadLater]).await.unwrap();
        assert_eq!(lists.read_later.len(), 1);
    }

    #[tokio::test]
    async fn writes_announce_on_the_change_feed() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let mut feed = store.subscribe();

        store
            .save_item(ListName::Tasks, item("https://t.example"))
            .await
            .unwrap();
        assert_eq!(feed.recv().await.unwrap().lists, vec![ListName::Tasks]);
    }

    #[tokio::test]
    async fn status_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.read_status().await.unwrap().is_none());

        let status = SyncStatus::now(true, false, 3, 7);
        store.write_status(&status).await.unwrap();
        assert_eq!(store.read_status().await.unwrap(), Some(status));
    }

    // ===== Concurrent writers =====

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_to_one_key_never_tear_the_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());

        let red: Vec<Item> = (0..40)
            .map(|i| item(&format!("https://red.example/{i}")))
            .collect();
        let blue: Vec<Item> = (0..60)
            .map(|i| item(&format!("https://blue.example/{i}")))
            .collect();

        for _ in 0..50 {
            let a = tokio::spawn({
                let store = Arc::clone(&store);
                let red = red.clone();
                async move { store.replace_list(ListName::ReadLater, red).await }
            });
            let b = tokio::spawn({
                let store = Arc::clone(&store);
                let blue = blue.clone();
                async move { store.replace_list(ListName::ReadLater, blue).await }
            });
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            // Whichever write landed last, the file holds one whole list.
            let lists = store.read_lists(&[ListName::ReadLater]).await.unwrap();
            assert!(lists.read_later == red || lists.read_later == blue);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_first_device_id_calls_agree() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).await.unwrap());

        let calls: Vec<_> = (0..8)
            .map(|_| {
                tokio::spawn({
                    let store = Arc::clone(&store);
                    async move { store.device_id().await }
                })
            })
            .collect();
        let mut ids = Vec::new();
        for call in calls {
            ids.push(call.await.unwrap().unwrap());
        }

        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(store.device_id().await.unwrap(), ids[0]);
    }
}
