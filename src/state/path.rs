//! Dotted-path traversal over a JSON tree.
//!
//! Paths are `.`-delimited segment lists (`config.tarifs.microscopes`).
//! Reads that hit a missing or non-object segment miss without error;
//! writes auto-create intermediate objects, replacing any non-object
//! value standing in the way.

use serde_json::{Map, Value};

/// Resolve a path to a reference into the tree.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set the value at a path, creating intermediate objects as needed.
///
/// Returns the previous value at the path, if any.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = root;
    for segment in parents {
        ensure_object(current);
        current = current
            .as_object_mut()
            .expect("ensure_object guarantees an object")
            .entry((*segment).to_string())
            .or_insert(Value::Null);
    }
    ensure_object(current);
    current
        .as_object_mut()
        .expect("ensure_object guarantees an object")
        .insert((*last).to_string(), value)
}

/// Remove the value at a path. Returns it, or `None` when absent.
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = root;
    for segment in parents {
        current = current.as_object_mut()?.get_mut(*segment)?;
    }
    current.as_object_mut()?.remove(*last)
}

fn ensure_object(value: &mut Value) {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
}
