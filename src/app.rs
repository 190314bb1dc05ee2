//! Application wiring: one constructor that assembles the whole stack.
//!
//! [`Facility`] owns the event bus, the storage and state layers, and
//! the domain managers built on top of them. Embedding callers build one
//! `Facility` and reach every operation through its accessors instead of
//! wiring the layers by hand.
//!
//! # Example
//!
//! ```rust
//! use microbill::Facility;
//! use microbill::teams::Team;
//!
//! let facility = Facility::in_memory();
//! facility.teams().add(Team {
//!     name: "Équipe Alpha".to_string(),
//!     laboratory: "CBI".to_string(),
//!     ..Team::default()
//! }).unwrap();
//! assert_eq!(facility.teams().count(), 1);
//! ```

use tracing::{info, instrument};

use crate::billing::{InvoiceLedger, TariffManager};
use crate::config::CoreConfig;
use crate::events::EventBus;
use crate::state::StateStore;
use crate::storage::{KeyValueStore, MemoryBackend, StorageBackend};
use crate::teams::{Team, TeamRegistry};
use crate::transfer::{self, ExportBundle, TransferError};
use crate::Result;

/// Fully wired application core.
///
/// Construction order matters: the bus first, then the key-value store
/// over the backend, then the state store (restoring any persisted
/// snapshot), then the managers that share them. Cloning is cheap; all
/// clones share the same underlying state.
#[derive(Clone)]
pub struct Facility {
    config: CoreConfig,
    bus: EventBus,
    kv: KeyValueStore,
    state: StateStore,
    tariffs: TariffManager,
    teams: TeamRegistry,
    invoices: InvoiceLedger,
}

impl Facility {
    /// Wire the full stack over a storage backend.
    ///
    /// With `auto_persist` enabled (the default) the state store restores
    /// the persisted snapshot and writes back after every change;
    /// otherwise the tree is memory-only and the key-value store is still
    /// available for direct use.
    #[instrument(skip_all)]
    pub fn new(config: CoreConfig, backend: impl StorageBackend + 'static) -> Self {
        let bus = EventBus::new();
        let kv = KeyValueStore::new(backend, bus.clone(), &config);
        let state = if config.auto_persist {
            StateStore::with_persistence(kv.clone())
        } else {
            StateStore::new()
        };
        let tariffs = TariffManager::new(state.clone(), bus.clone());
        let teams = TeamRegistry::new(state.clone(), bus.clone());
        let invoices = InvoiceLedger::new(state.clone(), bus.clone(), tariffs.clone(), &config);
        info!(
            namespace = %config.namespace,
            auto_persist = config.auto_persist,
            "facility initialized"
        );

        Self {
            config,
            bus,
            kv,
            state,
            tariffs,
            teams,
            invoices,
        }
    }

    /// A facility over an unbounded in-memory backend, with defaults.
    /// Handy in tests and ephemeral sessions.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(CoreConfig::default(), MemoryBackend::new())
    }

    /// Configuration this facility was built with.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The shared event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Direct access to namespaced key-value storage.
    #[must_use]
    pub fn storage(&self) -> &KeyValueStore {
        &self.kv
    }

    /// The hierarchical state tree.
    #[must_use]
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Tariff configuration manager.
    #[must_use]
    pub fn tariffs(&self) -> &TariffManager {
        &self.tariffs
    }

    /// Team registry.
    #[must_use]
    pub fn teams(&self) -> &TeamRegistry {
        &self.teams
    }

    /// Invoice ledger.
    #[must_use]
    pub fn invoices(&self) -> &InvoiceLedger {
        &self.invoices
    }

    /// Snapshot the whole application state as a versioned bundle.
    #[must_use]
    pub fn export(&self) -> ExportBundle {
        transfer::export(&self.state, &self.kv)
    }

    /// [`export`](Self::export) serialized to pretty JSON, ready to write
    /// to a backup file.
    pub fn export_json(&self) -> Result<String> {
        let bundle = self.export();
        Ok(serde_json::to_string_pretty(&bundle).map_err(TransferError::MalformedJson)?)
    }

    /// Restore a bundle from its JSON text. Nothing is applied when the
    /// payload is malformed or unversioned.
    pub fn import(&self, text: &str) -> Result<()> {
        transfer::import(&self.state, &self.kv, &self.bus, text)?;
        Ok(())
    }

    /// Current teams rendered as CSV, one session column per configured
    /// microscope.
    #[must_use]
    pub fn teams_csv(&self) -> String {
        transfer::teams_to_csv(
            &self.teams.list(),
            &self.tariffs.config(),
            self.config.csv_delimiter,
        )
    }

    /// Parse a teams CSV against the current microscope configuration.
    /// Rows that cannot be interpreted are skipped, not fatal.
    pub fn teams_from_csv(&self, text: &str) -> Result<Vec<Team>> {
        let teams = transfer::teams_from_csv(text, &self.tariffs.config(), self.config.csv_delimiter)?;
        Ok(teams)
    }
}

impl Default for Facility {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_facility_seeds_tariff_defaults() {
        let facility = Facility::in_memory();
        assert!(!facility.tariffs().config().microscopes.is_empty());
        assert_eq!(facility.teams().count(), 0);
    }

    #[test]
    fn test_state_changes_persist_through_storage() {
        let facility = Facility::in_memory();
        facility.state().set("ui.theme", json!("dark"));

        let snapshot = facility
            .storage()
            .load_raw(crate::state::STATE_KEY)
            .expect("snapshot present");
        assert_eq!(snapshot["ui"]["theme"], "dark");
    }

    #[test]
    fn test_auto_persist_disabled_keeps_storage_untouched() {
        let config = CoreConfig::builder().auto_persist(false).build();
        let facility = Facility::new(config, MemoryBackend::new());
        facility.state().set("ui.theme", json!("dark"));

        assert!(facility.storage().load_raw(crate::state::STATE_KEY).is_none());
    }

    #[test]
    fn test_export_import_restores_teams() {
        let source = Facility::in_memory();
        source
            .teams()
            .add(Team {
                name: "Équipe Alpha".to_string(),
                laboratory: "CBI".to_string(),
                ..Team::default()
            })
            .unwrap();
        let backup = source.export_json().unwrap();

        let target = Facility::in_memory();
        target.import(&backup).unwrap();
        assert_eq!(target.teams().count(), 1);
        assert!(target.teams().get("équipe alpha").is_some());
    }
}
