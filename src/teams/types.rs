//! Team record types.
//!
//! Serialized field names stay camelCase so persisted state and export
//! bundles written by earlier deployments keep loading.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Billing category of a client team.
///
/// `Interne` and `Externe` (academic) clients are VAT-exempt under the
/// French public-research rule; only `Prive` clients are charged VAT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Internal laboratory of the facility.
    #[default]
    Interne,
    /// External academic client.
    Externe,
    /// Private-sector client (VAT applies).
    Prive,
}

impl ClientType {
    /// All client types, in the fixed order used by aggregate breakdowns.
    pub const ALL: [ClientType; 3] = [Self::Interne, Self::Externe, Self::Prive];

    /// String form matching the persisted representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interne => "interne",
            Self::Externe => "externe",
            Self::Prive => "prive",
        }
    }
}

/// Error returned when parsing a client type string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseClientTypeError {
    invalid_value: String,
}

impl fmt::Display for ParseClientTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid client type: '{}' (expected: interne, externe, or prive)",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseClientTypeError {}

impl FromStr for ClientType {
    type Err = ParseClientTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interne" => Ok(Self::Interne),
            "externe" => Ok(Self::Externe),
            "prive" | "privé" => Ok(Self::Prive),
            _ => Err(ParseClientTypeError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One billable service performed for a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationEntry {
    /// Service name, matching an entry in the tariff configuration.
    pub name: String,
    /// Number of samples processed.
    #[serde(default)]
    pub samples: u32,
    /// Day the work was done, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Free-form session label, carried through to invoices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// A billable client group whose microscope and service usage is tracked.
///
/// `microscope_sessions[i]` counts sessions on the `i`-th microscope of
/// the tariff configuration; indices past either list's end default to
/// zero when the configuration grows or shrinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Unique team name (case-insensitive uniqueness, case preserved).
    pub name: String,
    /// Home laboratory code or name.
    pub laboratory: String,
    /// Billing category.
    pub client_type: ClientType,
    /// Optional project label shown on invoices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Session counts aligned positionally with the configured microscopes.
    #[serde(default)]
    pub microscope_sessions: Vec<u32>,
    /// Services performed for this team.
    #[serde(default)]
    pub manipulations: Vec<ManipulationEntry>,
    /// Reference date for cost projections, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}
