//! In-memory nested key-value tree with change subscription.
//!
//! The tree is the application's source of truth; persistence through a
//! [`KeyValueStore`] is best-effort and never invalidates in-memory
//! state. Mutations notify subscribers first, then persist, so listeners
//! react to logical state before the persistence side effect.
//!
//! Two subscription shapes exist deliberately (they carry different
//! payloads): [`StateStore::subscribe`] watches one concrete path and
//! receives `(new, old, key)`; [`StateStore::subscribe_all`] receives a
//! [`ChangeEvent`] for every change.
//!
//! # Example
//!
//! ```rust
//! use microbill::StateStore;
//! use serde_json::json;
//!
//! let state = StateStore::new();
//! state.set("config.theme", json!("dark"));
//! assert_eq!(state.get("config.theme"), Some(json!("dark")));
//! assert_eq!(state.get("config.missing"), None);
//! ```

pub(crate) mod path;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::events::SubscriptionId;
use crate::storage::KeyValueStore;

/// Key the full tree snapshot is persisted under.
pub const STATE_KEY: &str = "state";

/// Change notification payload for wildcard subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Dotted path that changed.
    pub key: String,
    /// Value after the change; `None` on removal.
    pub new_value: Option<Value>,
    /// Value before the change; `None` when the path was absent.
    pub old_value: Option<Value>,
}

type PathHandler =
    Arc<dyn Fn(Option<&Value>, Option<&Value>, &str) -> anyhow::Result<()> + Send + Sync>;
type AllHandler = Arc<dyn Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct StateStoreInner {
    tree: RwLock<Value>,
    path_subs: RwLock<HashMap<String, Vec<(SubscriptionId, PathHandler)>>>,
    all_subs: RwLock<Vec<(SubscriptionId, AllHandler)>>,
    persistence: Option<KeyValueStore>,
}

/// Nested key-value tree with dotted-path access and change subscription.
///
/// Cloning is cheap; clones share the same tree and subscriptions.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StateStoreInner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create an empty store with no persistence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StateStoreInner {
                tree: RwLock::new(Value::Object(Map::new())),
                ..Default::default()
            }),
        }
    }

    /// Create a store that persists the full tree snapshot after every
    /// successful mutation, and restores any previously persisted
    /// snapshot now.
    #[must_use]
    pub fn with_persistence(kv: KeyValueStore) -> Self {
        let restored: Value = kv.load(STATE_KEY, Value::Object(Map::new()));
        let tree = if restored.is_object() {
            restored
        } else {
            warn!("persisted state snapshot is not an object, starting empty");
            Value::Object(Map::new())
        };
        Self {
            inner: Arc::new(StateStoreInner {
                tree: RwLock::new(tree),
                persistence: Some(kv),
                ..Default::default()
            }),
        }
    }

    /// Value at a dotted path, deep-copied. `None` when traversal hits a
    /// missing or non-object segment.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let tree = self.inner.tree.read().unwrap();
        path::get_path(&tree, path).cloned()
    }

    /// Value at a path, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Deserialize the value at a path. `None` when absent or when the
    /// stored value does not match `T`.
    #[must_use]
    pub fn get_typed<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        serde_json::from_value(self.get(path)?).ok()
    }

    /// Set the value at a path, auto-creating intermediate objects.
    ///
    /// Old and new values are compared structurally; an equal write is a
    /// no-op that returns `false` and notifies nobody. Returns `true`
    /// when the value actually changed.
    pub fn set(&self, path: &str, value: Value) -> bool {
        let old = {
            let mut tree = self.inner.tree.write().unwrap();
            let old = path::get_path(&tree, path).cloned();
            if old.as_ref() == Some(&value) {
                return false;
            }
            path::set_path(&mut tree, path, value.clone());
            old
        };
        debug!(path, "state changed");
        self.notify(path, Some(&value), old.as_ref());
        self.persist();
        true
    }

    /// Serialize a value and set it at a path.
    ///
    /// A value that fails to serialize is logged and dropped; the tree is
    /// untouched and `false` is returned.
    pub fn set_typed<T: Serialize>(&self, path: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(path, value),
            Err(error) => {
                warn!(path, %error, "value failed to serialize, state untouched");
                false
            }
        }
    }

    /// Remove the value at a path. Returns whether anything was removed.
    pub fn remove(&self, path: &str) -> bool {
        let old = {
            let mut tree = self.inner.tree.write().unwrap();
            path::remove_path(&mut tree, path)
        };
        match old {
            None => false,
            Some(old) => {
                debug!(path, "state entry removed");
                self.notify(path, None, Some(&old));
                self.persist();
                true
            }
        }
    }

    /// Subscribe to changes at one concrete path.
    ///
    /// The callback receives `(new, old, key)`; `new` is `None` on
    /// removal. Callback errors are logged and never prevent other
    /// subscribers from running.
    pub fn subscribe<F>(&self, path: &str, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>, Option<&Value>, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.inner
            .path_subs
            .write()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Subscribe to every change, receiving a [`ChangeEvent`].
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.inner
            .all_subs
            .write()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription of either shape. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        {
            let mut all_subs = self.inner.all_subs.write().unwrap();
            let before = all_subs.len();
            all_subs.retain(|(sub_id, _)| *sub_id != id);
            if all_subs.len() != before {
                return true;
            }
        }
        let mut path_subs = self.inner.path_subs.write().unwrap();
        let mut removed = false;
        for list in path_subs.values_mut() {
            let before = list.len();
            list.retain(|(sub_id, _)| *sub_id != id);
            removed |= list.len() != before;
        }
        // Paths accumulate over a long session; drop emptied lists so
        // the table does not grow without bound.
        path_subs.retain(|_, list| !list.is_empty());
        removed
    }

    /// Deep copy of the whole tree. Later mutations never touch the
    /// returned value.
    #[must_use]
    pub fn get_all(&self) -> Value {
        self.inner.tree.read().unwrap().clone()
    }

    /// Replace the whole tree with a snapshot (e.g. a restored export).
    ///
    /// No per-path notifications fire; this is a wholesale restore, not
    /// an incremental change. The new tree is persisted.
    pub fn set_all(&self, tree: Value) {
        let tree = if tree.is_object() {
            tree
        } else {
            warn!("set_all called with a non-object tree, storing empty object");
            Value::Object(Map::new())
        };
        *self.inner.tree.write().unwrap() = tree;
        self.persist();
    }

    /// Destroy everything: empty the tree, drop all subscriptions, and
    /// clear the persisted snapshot. Irreversible; callers own any
    /// confirm-with-the-user step.
    pub fn reset(&self) {
        *self.inner.tree.write().unwrap() = Value::Object(Map::new());
        self.inner.path_subs.write().unwrap().clear();
        self.inner.all_subs.write().unwrap().clear();
        if let Some(kv) = &self.inner.persistence {
            kv.remove(STATE_KEY);
        }
    }

    fn notify(&self, key: &str, new: Option<&Value>, old: Option<&Value>) {
        // Snapshot handlers so callbacks can (un)subscribe reentrantly.
        let path_handlers: Vec<PathHandler> = self
            .inner
            .path_subs
            .read()
            .unwrap()
            .get(key)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in path_handlers {
            if let Err(error) = handler(new, old, key) {
                warn!(key, %error, "state subscriber failed");
            }
        }

        let all_handlers: Vec<AllHandler> = {
            let all_subs = self.inner.all_subs.read().unwrap();
            all_subs.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        if all_handlers.is_empty() {
            return;
        }
        let event = ChangeEvent {
            key: key.to_string(),
            new_value: new.cloned(),
            old_value: old.cloned(),
        };
        for handler in all_handlers {
            if let Err(error) = handler(&event) {
                warn!(key, %error, "state subscriber failed");
            }
        }
    }

    fn persist(&self) {
        let Some(kv) = &self.inner.persistence else {
            return;
        };
        let snapshot = self.get_all();
        if !kv.save(STATE_KEY, &snapshot) {
            // Persistence is best-effort; in-memory state stays correct.
            warn!("state snapshot persistence failed");
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("persisted", &self.inner.persistence.is_some())
            .finish()
    }
}
