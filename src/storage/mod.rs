//! Namespaced persistence over a size-bounded key-value medium.
//!
//! [`KeyValueStore`] serializes values to JSON text, prefixes every key
//! with the configured namespace, and enforces a per-entry size cap
//! before anything touches the medium. Persistence is best-effort:
//! save-side callers get a boolean failure signal plus a diagnostic
//! event, never an exception, and in-memory state stays authoritative.
//!
//! # Events
//!
//! - `storage:saved`, `storage:loaded`, `storage:removed`,
//!   `storage:cleared` on success
//! - `storage:error` with `type` in `size_exceeded`, `save_failed`,
//!   `load_failed`, `import_failed`
//! - `storage:quota_exceeded` with per-key size diagnostics

mod backend;
mod file;

pub use backend::{MemoryBackend, StorageBackend};
pub use file::FileBackend;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::events::EventBus;

/// Errors raised by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The serialized entry exceeds the per-entry size cap.
    #[error("Entry '{key}' is {size} bytes, over the {limit} byte cap")]
    EntryTooLarge {
        /// Un-namespaced key.
        key: String,
        /// Serialized size in bytes.
        size: usize,
        /// Configured cap in bytes.
        limit: usize,
    },

    /// The medium refused the write for lack of capacity.
    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded {
        /// Key as presented to the medium.
        key: String,
    },

    /// Serialization to JSON failed.
    #[error("Serialization failed for '{key}': {source}")]
    Serialization {
        /// Un-namespaced key.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The medium itself failed.
    #[error("Storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Namespaced JSON persistence over a [`StorageBackend`].
///
/// # Example
///
/// ```rust
/// use microbill::{CoreConfig, EventBus};
/// use microbill::storage::{KeyValueStore, MemoryBackend};
///
/// let store = KeyValueStore::new(
///     MemoryBackend::new(),
///     EventBus::new(),
///     &CoreConfig::default(),
/// );
/// assert!(store.save("theme", &"dark"));
/// let theme: String = store.load("theme", String::from("light"));
/// assert_eq!(theme, "dark");
/// ```
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StorageBackend>,
    bus: EventBus,
    namespace: String,
    max_entry_size: usize,
}

impl KeyValueStore {
    /// Create a store over a backend, taking the namespace prefix and
    /// entry size cap from the configuration.
    pub fn new(
        backend: impl StorageBackend + 'static,
        bus: EventBus,
        config: &CoreConfig,
    ) -> Self {
        Self {
            backend: Arc::new(backend),
            bus,
            namespace: config.namespace.clone(),
            max_entry_size: config.max_entry_size,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Serialize and persist a value under a namespaced key.
    ///
    /// Returns `false` (after emitting a diagnostic event) when the entry
    /// exceeds the size cap, the medium is out of capacity, or
    /// serialization fails. No partial write occurs in any failure case.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> bool {
        match self.try_save(key, data) {
            Ok(()) => {
                self.bus.publish("storage:saved", json!({ "key": key }));
                true
            }
            Err(error) => {
                warn!(key, %error, "save failed");
                match &error {
                    StorageError::EntryTooLarge { size, limit, .. } => {
                        self.bus.publish(
                            "storage:error",
                            json!({
                                "type": "size_exceeded",
                                "key": key,
                                "size": size,
                                "limit": limit,
                            }),
                        );
                    }
                    StorageError::QuotaExceeded { .. } => {
                        self.bus.publish(
                            "storage:quota_exceeded",
                            json!({ "key": key, "sizes": self.diagnostics_json() }),
                        );
                    }
                    _ => {
                        self.bus.publish(
                            "storage:error",
                            json!({ "type": "save_failed", "key": key }),
                        );
                    }
                }
                false
            }
        }
    }

    fn try_save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let serialized =
            serde_json::to_string(data).map_err(|source| StorageError::Serialization {
                key: key.to_string(),
                source,
            })?;
        if serialized.len() > self.max_entry_size {
            return Err(StorageError::EntryTooLarge {
                key: key.to_string(),
                size: serialized.len(),
                limit: self.max_entry_size,
            });
        }
        self.backend.write(&self.namespaced(key), &serialized)?;
        debug!(key, bytes = serialized.len(), "entry saved");
        Ok(())
    }

    /// Load and deserialize a value, falling back to `default` when the
    /// key is absent or the stored text does not deserialize.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.backend.read(&self.namespaced(key)) else {
            return default;
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.bus.publish("storage:loaded", json!({ "key": key }));
                value
            }
            Err(error) => {
                warn!(key, %error, "stored entry failed to deserialize");
                self.bus.publish(
                    "storage:error",
                    json!({ "type": "load_failed", "key": key }),
                );
                default
            }
        }
    }

    /// Load the raw JSON value stored under a key, if any.
    ///
    /// Used by the export bundle, which carries entries verbatim.
    #[must_use]
    pub fn load_raw(&self, key: &str) -> Option<serde_json::Value> {
        let raw = self.backend.read(&self.namespaced(key))?;
        serde_json::from_str(&raw).ok()
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let existed = self.backend.delete(&self.namespaced(key));
        if existed {
            self.bus.publish("storage:removed", json!({ "key": key }));
        }
        existed
    }

    /// Whether a namespaced entry exists.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.backend.read(&self.namespaced(key)).is_some()
    }

    /// All namespaced keys, prefix stripped.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.backend
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.namespace).map(str::to_string))
            .collect()
    }

    /// Remove every namespaced entry. Keys outside the namespace are
    /// untouched.
    pub fn clear(&self) {
        for key in self.keys() {
            self.backend.delete(&self.namespaced(&key));
        }
        self.bus.publish("storage:cleared", json!({}));
    }

    /// Total stored size of namespaced entries, in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.keys()
            .iter()
            .filter_map(|key| self.backend.entry_size(&self.namespaced(key)))
            .sum()
    }

    /// Per-key stored sizes, largest first. Computed on quota failures
    /// for the diagnostic event, and available to callers that want to
    /// show the user what is taking space.
    #[must_use]
    pub fn storage_diagnostics(&self) -> Vec<(String, usize)> {
        let mut sizes: Vec<(String, usize)> = self
            .keys()
            .into_iter()
            .filter_map(|key| {
                let size = self.backend.entry_size(&self.namespaced(&key))?;
                Some((key, size))
            })
            .collect();
        sizes.sort_by(|a, b| b.1.cmp(&a.1));
        sizes
    }

    fn diagnostics_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, size) in self.storage_diagnostics() {
            map.insert(key, json!(size));
        }
        serde_json::Value::Object(map)
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("namespace", &self.namespace)
            .field("max_entry_size", &self.max_entry_size)
            .finish()
    }
}
