//! The key-value remote behind the built-in provider.
//!
//! Models a browser's synchronized extension storage: a small shared
//! key-value area with a hard total quota, replicated between a user's own
//! devices by the browser itself. [`RemoteKv`] is the seam; the engine only
//! ever gets, sets, and removes string values by key.
//!
//! [`MemoryRemoteKv`] is the in-process implementation. It enforces the
//! same quota the real storage area does, so tests and embedders that
//! bridge their own replication see identical limits.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use stash_core::SYNC_QUOTA_BYTES;

/// Errors from the key-value remote.
#[derive(Debug, Error)]
pub enum KvError {
    /// The write would push the storage area past its quota.
    #[error("remote quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The storage area could not be reached.
    #[error("remote storage unavailable: {0}")]
    Unavailable(String),
}

/// A quota-limited remote key-value area.
#[async_trait]
pub trait RemoteKv: Send + Sync {
    /// Read one value. `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write one value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

    /// Remove the given keys. Absent keys are not an error.
    async fn remove(&self, keys: &[&str]) -> Result<(), KvError>;
}

#[derive(Default)]
struct MemoryKvInner {
    entries: BTreeMap<String, String>,
    quota_bytes: usize,
    item_ceiling: Option<usize>,
    fail_next_get: Option<KvError>,
    fail_next_set: Option<KvError>,
    fail_next_remove: Option<KvError>,
}

impl MemoryKvInner {
    /// Bytes the area would hold after writing `value` under `key`.
    fn size_with(&self, key: &str, value: &str) -> usize {
        let others: usize = self
            .entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        others + key.len() + value.len()
    }
}

/// In-memory [`RemoteKv`] with real quota enforcement.
///
/// Thread-safe and cheap to clone (clones share state), so one instance can
/// stand in for the storage area shared between "devices" in tests. The
/// `fail_next_*` switches inject one failure each for error-path tests.
#[derive(Clone)]
pub struct MemoryRemoteKv {
    inner: Arc<Mutex<MemoryKvInner>>,
}

impl MemoryRemoteKv {
    /// Create an empty area with the standard total quota.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryKvInner {
                quota_bytes: SYNC_QUOTA_BYTES,
                ..Default::default()
            })),
        }
    }

    /// Override the total quota, in bytes.
    pub fn with_quota(self, quota_bytes: usize) -> Self {
        self.inner.lock().unwrap().quota_bytes = quota_bytes;
        self
    }

    /// Additionally enforce a per-entry byte ceiling, as some storage
    /// areas do on top of the total quota.
    pub fn with_item_ceiling(self, ceiling: usize) -> Self {
        self.inner.lock().unwrap().item_ceiling = Some(ceiling);
        self
    }

    /// Make the next `get` fail with `error`.
    pub fn fail_next_get(&self, error: KvError) {
        self.inner.lock().unwrap().fail_next_get = Some(error);
    }

    /// Make the next `set` fail with `error`.
    pub fn fail_next_set(&self, error: KvError) {
        self.inner.lock().unwrap().fail_next_set = Some(error);
    }

    /// Make the next `remove` fail with `error`.
    pub fn fail_next_remove(&self, error: KvError) {
        self.inner.lock().unwrap().fail_next_remove = Some(error);
    }

    /// Peek at a stored value without going through the trait.
    pub fn entry(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().entries.get(key).cloned()
    }

    /// The stored keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().entries.keys().cloned().collect()
    }

    /// Bytes currently stored (keys plus values).
    pub fn used_bytes(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Default for MemoryRemoteKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteKv for MemoryRemoteKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_get.take() {
            return Err(error);
        }
        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_set.take() {
            return Err(error);
        }
        let entry_bytes = key.len() + value.len();
        if let Some(ceiling) = inner.item_ceiling {
            if entry_bytes > ceiling {
                return Err(KvError::QuotaExceeded(format!(
                    "entry {key} is {entry_bytes} bytes, per-entry ceiling is {ceiling}"
                )));
            }
        }
        let total = inner.size_with(key, &value);
        if total > inner.quota_bytes {
            return Err(KvError::QuotaExceeded(format!(
                "area would hold {total} bytes, quota is {} bytes",
                inner.quota_bytes
            )));
        }
        inner.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), KvError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_remove.take() {
            return Err(error);
        }
        for key in keys {
            inner.entries.remove(*key);
        }
        Ok(())
    }
}
