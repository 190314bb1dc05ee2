//! Tariff configuration: billable items and per-client-type unit prices.
//!
//! The configuration is versioned data living in the state store under
//! the `config` path. An item present in the ordered lists but absent
//! from the price table costs 0, never an error, and removal keeps the
//! two in sync so no dangling price entry survives.
//!
//! # Example
//!
//! ```rust
//! use microbill::{EventBus, StateStore};
//! use microbill::billing::{ItemCategory, TariffManager, TariffRates};
//! use microbill::teams::ClientType;
//!
//! let tariffs = TariffManager::new(StateStore::new(), EventBus::new());
//! tariffs.add_item(
//!     ItemCategory::Microscopes,
//!     "Titan Krios",
//!     Some(TariffRates { interne: 90.0, externe: 180.0, prive: 270.0 }),
//! );
//! tariffs.update_tariff(ItemCategory::Microscopes, "Titan Krios", ClientType::Prive, 300.0);
//! assert_eq!(tariffs.config().microscope_rates("Titan Krios").prive, 300.0);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::events::EventBus;
use crate::state::StateStore;
use crate::teams::ClientType;

/// State path the tariff configuration lives under.
pub const CONFIG_PATH: &str = "config";

/// The two categories of billable items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    /// Microscopes, billed per session.
    Microscopes,
    /// Services (manipulations), billed per sample.
    Services,
}

impl ItemCategory {
    /// Key used in the persisted price table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Microscopes => "microscopes",
            Self::Services => "services",
        }
    }

    /// Singular event scope (`microscope:add`, `service:remove`, ...).
    fn event_scope(&self) -> &'static str {
        match self {
            Self::Microscopes => "microscope",
            Self::Services => "service",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unit prices of one item, per client type, in currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffRates {
    /// Price for internal laboratories.
    #[serde(default)]
    pub interne: f64,
    /// Price for external academic clients.
    #[serde(default)]
    pub externe: f64,
    /// Price for private-sector clients.
    #[serde(default)]
    pub prive: f64,
}

impl TariffRates {
    /// Rate applying to a client type.
    #[must_use]
    pub fn for_client(&self, client_type: ClientType) -> f64 {
        match client_type {
            ClientType::Interne => self.interne,
            ClientType::Externe => self.externe,
            ClientType::Prive => self.prive,
        }
    }

    fn set_for_client(&mut self, client_type: ClientType, value: f64) {
        match client_type {
            ClientType::Interne => self.interne = value,
            ClientType::Externe => self.externe = value,
            ClientType::Prive => self.prive = value,
        }
    }
}

/// A billable service with its display icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    /// Unique service name.
    pub name: String,
    /// Display icon carried through to the UI layer.
    #[serde(default)]
    pub icon: String,
}

/// Price table keyed by item name, one map per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffTable {
    /// Per-session microscope prices.
    #[serde(default)]
    pub microscopes: HashMap<String, TariffRates>,
    /// Per-sample service prices.
    #[serde(default)]
    pub services: HashMap<String, TariffRates>,
}

impl TariffTable {
    fn for_category(&self, category: ItemCategory) -> &HashMap<String, TariffRates> {
        match category {
            ItemCategory::Microscopes => &self.microscopes,
            ItemCategory::Services => &self.services,
        }
    }

    fn for_category_mut(&mut self, category: ItemCategory) -> &mut HashMap<String, TariffRates> {
        match category {
            ItemCategory::Microscopes => &mut self.microscopes,
            ItemCategory::Services => &mut self.services,
        }
    }
}

/// Versioned configuration of billable items and their prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffConfig {
    /// Ordered microscope names; team session counts align positionally.
    #[serde(default)]
    pub microscopes: Vec<String>,
    /// Ordered services.
    #[serde(default)]
    pub manipulations: Vec<ServiceItem>,
    /// Lab codes classified as internal (case-insensitive comparison).
    #[serde(default)]
    pub internal_laboratories: Vec<String>,
    /// Unit price table.
    #[serde(default)]
    pub tarifs: TariffTable,
}

impl Default for TariffConfig {
    /// Built-in seed used when no configuration has been persisted yet.
    fn default() -> Self {
        let mut tarifs = TariffTable::default();
        let microscopes = [
            ("Tecnai 200 KV", 60.0, 120.0, 180.0),
            ("CM 100", 40.0, 80.0, 120.0),
            ("MEB Quanta 250", 50.0, 100.0, 150.0),
        ];
        let services = [
            ("Inclusion", "🧪", 25.0, 50.0, 75.0),
            ("Coupe ultrafine", "🔪", 20.0, 40.0, 60.0),
            ("Coloration négative", "💧", 10.0, 20.0, 30.0),
            ("Cryofixation", "❄️", 30.0, 60.0, 90.0),
        ];

        for (name, interne, externe, prive) in microscopes {
            tarifs.microscopes.insert(
                name.to_string(),
                TariffRates {
                    interne,
                    externe,
                    prive,
                },
            );
        }
        for (name, _, interne, externe, prive) in services {
            tarifs.services.insert(
                name.to_string(),
                TariffRates {
                    interne,
                    externe,
                    prive,
                },
            );
        }

        Self {
            microscopes: microscopes.iter().map(|(n, ..)| n.to_string()).collect(),
            manipulations: services
                .iter()
                .map(|(name, icon, ..)| ServiceItem {
                    name: name.to_string(),
                    icon: icon.to_string(),
                })
                .collect(),
            internal_laboratories: ["CBI", "LBME", "LMGM", "IPBS"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            tarifs,
        }
    }
}

impl TariffConfig {
    /// An empty configuration with no items at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            microscopes: Vec::new(),
            manipulations: Vec::new(),
            internal_laboratories: Vec::new(),
            tarifs: TariffTable::default(),
        }
    }

    /// Rates of a microscope; zero rates when no price entry exists.
    #[must_use]
    pub fn microscope_rates(&self, name: &str) -> TariffRates {
        self.tarifs.microscopes.get(name).copied().unwrap_or_default()
    }

    /// Rates of a service; zero rates when no price entry exists.
    #[must_use]
    pub fn service_rates(&self, name: &str) -> TariffRates {
        self.tarifs.services.get(name).copied().unwrap_or_default()
    }

    /// Whether a lab code belongs to an internal laboratory
    /// (case-insensitive comparison).
    #[must_use]
    pub fn is_internal(&self, lab_code: &str) -> bool {
        let wanted = lab_code.trim().to_lowercase();
        self.internal_laboratories
            .iter()
            .any(|lab| lab.to_lowercase() == wanted)
    }

    fn names(&self, category: ItemCategory) -> Vec<&str> {
        match category {
            ItemCategory::Microscopes => self.microscopes.iter().map(String::as_str).collect(),
            ItemCategory::Services => self
                .manipulations
                .iter()
                .map(|s| s.name.as_str())
                .collect(),
        }
    }

    fn contains(&self, category: ItemCategory, name: &str) -> bool {
        self.names(category).contains(&name)
    }
}

/// Mutating operations over the persisted tariff configuration.
///
/// Every mutation persists the whole configuration through the state
/// store and emits a scoped event with enough detail for dependent views
/// to re-render selectively.
#[derive(Clone)]
pub struct TariffManager {
    state: StateStore,
    bus: EventBus,
}

impl TariffManager {
    /// Create a manager, seeding the built-in default configuration when
    /// none has been persisted yet.
    #[must_use]
    pub fn new(state: StateStore, bus: EventBus) -> Self {
        let manager = Self { state, bus };
        if manager.state.get(CONFIG_PATH).is_none() {
            debug!("no tariff configuration present, seeding defaults");
            manager.state.set_typed(CONFIG_PATH, &TariffConfig::default());
        }
        manager
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> TariffConfig {
        self.state
            .get_typed(CONFIG_PATH)
            .unwrap_or_else(TariffConfig::default)
    }

    /// Replace the whole configuration (used by settings import).
    pub fn replace(&self, config: TariffConfig) {
        self.state.set_typed(CONFIG_PATH, &config);
        self.bus.publish("config:replace", json!({}));
    }

    /// Append a billable item with the given rates (zeros when `None`).
    ///
    /// No-op returning `false` when the name is empty or already present
    /// in the category.
    #[instrument(skip(self, tariffs))]
    pub fn add_item(
        &self,
        category: ItemCategory,
        name: &str,
        tariffs: Option<TariffRates>,
    ) -> bool {
        let name = name.trim();
        let mut config = self.config();
        if name.is_empty() || config.contains(category, name) {
            return false;
        }

        match category {
            ItemCategory::Microscopes => config.microscopes.push(name.to_string()),
            ItemCategory::Services => config.manipulations.push(ServiceItem {
                name: name.to_string(),
                icon: String::new(),
            }),
        }
        config
            .tarifs
            .for_category_mut(category)
            .insert(name.to_string(), tariffs.unwrap_or_default());

        self.store(&config);
        self.publish(category, "add", json!({ "name": name }));
        true
    }

    /// Remove an item from the ordered list and its price entry together.
    ///
    /// Both are removed or neither; a dangling price entry for a removed
    /// item is a data inconsistency this operation must never produce.
    #[instrument(skip(self))]
    pub fn remove_item(&self, category: ItemCategory, name: &str) -> bool {
        let mut config = self.config();
        if !config.contains(category, name) {
            return false;
        }

        match category {
            ItemCategory::Microscopes => config.microscopes.retain(|n| n != name),
            ItemCategory::Services => config.manipulations.retain(|s| s.name != name),
        }
        config.tarifs.for_category_mut(category).remove(name);

        self.store(&config);
        self.publish(category, "remove", json!({ "name": name }));
        true
    }

    /// Rename an item, moving its price entry to the new key with values
    /// preserved. No-op returning `false` when `old_name` is absent or
    /// `new_name` already names another item in the category; idempotent
    /// when the names are equal.
    #[instrument(skip(self))]
    pub fn rename_item(&self, category: ItemCategory, old_name: &str, new_name: &str) -> bool {
        let new_name = new_name.trim();
        let mut config = self.config();
        if !config.contains(category, old_name) || new_name.is_empty() {
            return false;
        }
        if old_name == new_name {
            return true;
        }
        // Accepting a taken name would duplicate it in the ordered list
        // and clobber the other item's rates when the price entry moves.
        if config.contains(category, new_name) {
            return false;
        }

        match category {
            ItemCategory::Microscopes => {
                for name in &mut config.microscopes {
                    if name == old_name {
                        *name = new_name.to_string();
                    }
                }
            }
            ItemCategory::Services => {
                for service in &mut config.manipulations {
                    if service.name == old_name {
                        service.name = new_name.to_string();
                    }
                }
            }
        }
        let rates = config.tarifs.for_category_mut(category).remove(old_name);
        if let Some(rates) = rates {
            config
                .tarifs
                .for_category_mut(category)
                .insert(new_name.to_string(), rates);
        }

        self.store(&config);
        self.publish(
            category,
            "rename",
            json!({ "oldName": old_name, "newName": new_name }),
        );
        true
    }

    /// Set one unit price.
    ///
    /// Non-finite or negative input coerces to 0. A zero-rate entry is
    /// created first when the item has no price entry yet. No-op
    /// returning `false` when the name is absent from the category's
    /// ordered list; a price entry with no corresponding item is a data
    /// inconsistency this operation must never produce.
    #[instrument(skip(self))]
    pub fn update_tariff(
        &self,
        category: ItemCategory,
        name: &str,
        client_type: ClientType,
        value: f64,
    ) -> bool {
        let value = if value.is_finite() && value >= 0.0 {
            value
        } else {
            0.0
        };

        let mut config = self.config();
        if !config.contains(category, name) {
            return false;
        }
        config
            .tarifs
            .for_category_mut(category)
            .entry(name.to_string())
            .or_default()
            .set_for_client(client_type, value);

        self.store(&config);
        self.bus.publish(
            "tarif:update",
            json!({
                "category": category.as_str(),
                "name": name,
                "clientType": client_type.as_str(),
                "value": value,
            }),
        );
        true
    }

    /// Case-insensitive membership test against the internal-lab list.
    #[must_use]
    pub fn is_internal(&self, lab_code: &str) -> bool {
        self.config().is_internal(lab_code)
    }

    /// Classify a laboratory: internal labs bill as `Interne`, everything
    /// else keeps the caller's choice.
    #[must_use]
    pub fn classify_client(&self, laboratory: &str, declared: ClientType) -> ClientType {
        if self.is_internal(laboratory) {
            ClientType::Interne
        } else {
            declared
        }
    }

    fn store(&self, config: &TariffConfig) {
        self.state.set_typed(CONFIG_PATH, config);
    }

    fn publish(&self, category: ItemCategory, action: &str, payload: serde_json::Value) {
        self.bus
            .publish(&format!("{}:{action}", category.event_scope()), payload);
    }
}
