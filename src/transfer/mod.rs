//! Export/import of the full application state as a versioned bundle,
//! plus CSV encoding for teams and reports.
//!
//! A bundle carries the live state tree and every other namespaced
//! storage entry, so an export file restores a deployment wholesale.
//! Import is atomic: the bundle is parsed and validated in full before
//! anything is applied, and a malformed bundle changes nothing.

pub mod csv;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::events::EventBus;
use crate::state::{StateStore, STATE_KEY};
use crate::storage::KeyValueStore;

pub use csv::{
    escape_field, parse_csv, report_to_csv, teams_from_csv, teams_to_csv, write_csv, CsvDocument,
};

/// Bundle format version written by this crate.
pub const BUNDLE_VERSION: &str = "1.0";

/// Errors raised while importing a bundle or CSV payload.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The bundle has no `version` field; unversioned payloads are
    /// rejected without mutation.
    #[error("Bundle is missing the 'version' field")]
    MissingVersion,

    /// The payload is not valid JSON.
    #[error("Malformed bundle: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The payload parsed but does not have the bundle shape.
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    /// The CSV payload has no content at all.
    #[error("CSV input is empty")]
    EmptyCsv,

    /// The CSV header does not match the expected columns.
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),
}

/// Versioned snapshot of the whole application state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Bundle format version.
    pub version: String,
    /// When the bundle was produced.
    pub timestamp: DateTime<Utc>,
    /// Full state tree at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Every other namespaced storage entry (the `state` key is omitted
    /// to avoid duplicating the tree).
    #[serde(default)]
    pub storage: BTreeMap<String, Value>,
}

/// Produce a bundle covering the live tree and every namespaced storage
/// entry except the tree's own snapshot.
#[must_use]
pub fn export(state: &StateStore, kv: &KeyValueStore) -> ExportBundle {
    let mut storage = BTreeMap::new();
    for key in kv.keys() {
        if key == STATE_KEY {
            continue;
        }
        if let Some(value) = kv.load_raw(&key) {
            storage.insert(key, value);
        }
    }

    ExportBundle {
        version: BUNDLE_VERSION.to_string(),
        timestamp: Utc::now(),
        state: Some(state.get_all()),
        storage,
    }
}

/// Apply a bundle from its JSON text form.
///
/// The whole payload is parsed and validated first; when anything is
/// wrong, a `storage:error{type:import_failed}` event fires and no state
/// is touched. A present `state` replaces the entire tree; each
/// `storage` entry replays through the key-value store.
pub fn import(
    state: &StateStore,
    kv: &KeyValueStore,
    bus: &EventBus,
    text: &str,
) -> Result<(), TransferError> {
    let bundle = match parse_bundle(text) {
        Ok(bundle) => bundle,
        Err(error) => {
            warn!(%error, "bundle import rejected");
            bus.publish(
                "storage:error",
                json!({ "type": "import_failed", "reason": error.to_string() }),
            );
            return Err(error);
        }
    };

    if let Some(tree) = bundle.state {
        state.set_all(tree);
    }
    for (key, value) in &bundle.storage {
        kv.save(key, value);
    }
    info!(version = %bundle.version, entries = bundle.storage.len(), "bundle imported");
    Ok(())
}

fn parse_bundle(text: &str) -> Result<ExportBundle, TransferError> {
    let raw: Value = serde_json::from_str(text)?;
    let Some(object) = raw.as_object() else {
        return Err(TransferError::InvalidBundle(
            "top level must be an object".to_string(),
        ));
    };
    if !object.contains_key("version") {
        return Err(TransferError::MissingVersion);
    }
    if let Some(state) = object.get("state") {
        if !state.is_object() {
            return Err(TransferError::InvalidBundle(
                "'state' must be an object".to_string(),
            ));
        }
    }

    Ok(serde_json::from_value(raw)?)
}
