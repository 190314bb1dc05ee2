//! Storage medium abstraction.
//!
//! The core persists JSON text blobs through a [`StorageBackend`], the
//! synchronous size-bounded medium the original tool finds in the
//! browser. [`MemoryBackend`] is the in-memory implementation used for
//! testing and for quota emulation; a file-based medium lives in
//! [`super::FileBackend`].

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::StorageError;

/// A synchronous key-value medium storing text blobs.
///
/// Implementations must be safe to share across components; all methods
/// take `&self` and run to completion on the calling thread.
pub trait StorageBackend: Send + Sync {
    /// Read a value. `None` when the key is absent.
    fn read(&self, key: &str) -> Option<String>;

    /// Write a value. Fails with [`StorageError::QuotaExceeded`] when the
    /// medium is out of capacity; no partial write may occur.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> bool;

    /// All keys currently present, unordered.
    fn keys(&self) -> Vec<String>;

    /// Stored size of one entry in bytes, `None` when absent.
    fn entry_size(&self, key: &str) -> Option<usize>;
}

#[derive(Default)]
struct MemoryBackendInner {
    entries: RwLock<BTreeMap<String, String>>,
}

/// In-memory medium with an optional byte quota.
///
/// The quota bounds the sum of stored value sizes, emulating the
/// capacity behavior of a browser-style medium. Cloning shares the
/// underlying entries.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Create an unbounded in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that rejects writes once the total stored bytes
    /// would exceed `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            inner: Arc::new(MemoryBackendInner::default()),
            quota: Some(quota_bytes),
        }
    }

    fn total_bytes(entries: &BTreeMap<String, String>) -> usize {
        entries.values().map(String::len).sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.inner.entries.read().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.inner.entries.write().unwrap();
        if let Some(quota) = self.quota {
            let existing = entries.get(key).map_or(0, String::len);
            let projected = Self::total_bytes(&entries) - existing + value.len();
            if projected > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        self.inner.entries.write().unwrap().remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.inner.entries.read().unwrap().keys().cloned().collect()
    }

    fn entry_size(&self, key: &str) -> Option<usize> {
        self.inner.entries.read().unwrap().get(key).map(String::len)
    }
}
