//! Tariff-driven cost calculation.
//!
//! Pure functions mapping team records and a tariff configuration to
//! line-item costs and aggregate breakdowns. Monetary values keep full
//! floating-point precision throughout accumulation; rounding to two
//! decimals happens only at display or export time, so rounding error
//! never compounds across teams.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::tariffs::TariffConfig;
use crate::teams::{ClientType, Team};

/// VAT rate applied to private-sector clients. Internal and external
/// academic clients are VAT-exempt under the French public-research
/// rule; this is a domain constant, not a configuration knob.
pub const VAT_RATE: f64 = 0.20;

/// Breakdown key for teams without a laboratory.
pub const UNSPECIFIED_LABORATORY: &str = "Non spécifié";

/// One microscope line on a cost sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroscopeLine {
    /// Microscope name, resolved positionally from the configuration.
    pub name: String,
    /// Sessions billed.
    pub sessions: u32,
    /// Unit price for the team's client type.
    pub unit_price: f64,
    /// `sessions * unit_price`.
    pub total: f64,
}

/// One service line on a cost sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    /// Service name.
    pub name: String,
    /// Samples billed.
    pub samples: u32,
    /// Unit price for the team's client type.
    pub unit_price: f64,
    /// `samples * unit_price`.
    pub total: f64,
    /// Work date, carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Session label, carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// Full cost sheet for one team against one tariff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCost {
    /// Microscope lines with non-zero sessions.
    pub microscopes: Vec<MicroscopeLine>,
    /// Service lines with non-zero samples.
    pub services: Vec<ServiceLine>,
    /// Subtotal before VAT.
    pub total: f64,
    /// VAT amount; zero unless the client type is `prive`.
    pub vat: f64,
    /// `total + vat`.
    pub total_with_vat: f64,
}

/// Count-and-amount cell of an aggregate breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTotal {
    /// Number of teams in the group.
    pub count: usize,
    /// Amount billed to the group, VAT included.
    pub amount: f64,
}

/// Quantity-and-amount cell of a per-item breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemTotal {
    /// Sessions or samples billed for the item.
    pub quantity: u64,
    /// Amount billed for the item, before VAT.
    pub amount: f64,
}

/// Costs summed across a collection of teams.
///
/// Breakdown maps carry no iteration-order contract; callers that need
/// "top laboratories by amount" must sort explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCost {
    /// Sum of team subtotals.
    pub subtotal: f64,
    /// Sum of team VAT amounts.
    pub vat: f64,
    /// `subtotal + vat`.
    pub total: f64,
    /// Per client type; always carries all three fixed keys.
    pub by_type: HashMap<ClientType, GroupTotal>,
    /// Per laboratory; blank laboratories group under
    /// [`UNSPECIFIED_LABORATORY`].
    pub by_laboratory: HashMap<String, GroupTotal>,
    /// Per microscope.
    pub by_microscope: HashMap<String, ItemTotal>,
    /// Per service.
    pub by_service: HashMap<String, ItemTotal>,
}

/// Projected revenue derived from per-month cost buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Projections {
    /// Average cost of the observed (year, month) buckets.
    pub monthly: f64,
    /// `monthly * 3`.
    pub quarterly: f64,
    /// `monthly * 12`.
    pub yearly: f64,
}

/// Compute the cost sheet of one team.
///
/// Microscope names resolve positionally from the configuration; indices
/// beyond either list are ignored (a grown or shrunk configuration
/// defaults missing counts to zero). An item without a price entry costs
/// zero, never errors.
#[must_use]
pub fn calculate_team_cost(team: &Team, config: &TariffConfig) -> TeamCost {
    let mut microscopes = Vec::new();
    let mut services = Vec::new();
    let mut subtotal = 0.0_f64;

    for (index, &sessions) in team.microscope_sessions.iter().enumerate() {
        if sessions == 0 {
            continue;
        }
        let Some(name) = config.microscopes.get(index) else {
            continue;
        };
        let unit_price = config.microscope_rates(name).for_client(team.client_type);
        let total = f64::from(sessions) * unit_price;
        subtotal += total;
        microscopes.push(MicroscopeLine {
            name: name.clone(),
            sessions,
            unit_price,
            total,
        });
    }

    for manipulation in &team.manipulations {
        if manipulation.samples == 0 {
            continue;
        }
        let unit_price = config
            .service_rates(&manipulation.name)
            .for_client(team.client_type);
        let total = f64::from(manipulation.samples) * unit_price;
        subtotal += total;
        services.push(ServiceLine {
            name: manipulation.name.clone(),
            samples: manipulation.samples,
            unit_price,
            total,
            date: manipulation.date,
            session: manipulation.session.clone(),
        });
    }

    let vat = if team.client_type == ClientType::Prive {
        subtotal * VAT_RATE
    } else {
        0.0
    };

    TeamCost {
        microscopes,
        services,
        total: subtotal,
        vat,
        total_with_vat: subtotal + vat,
    }
}

/// Sum costs across teams with per-type, per-laboratory and per-item
/// breakdowns.
#[must_use]
pub fn calculate_total(teams: &[Team], config: &TariffConfig) -> AggregateCost {
    let mut aggregate = AggregateCost::default();
    for client_type in ClientType::ALL {
        aggregate.by_type.insert(client_type, GroupTotal::default());
    }

    for team in teams {
        let cost = calculate_team_cost(team, config);
        aggregate.subtotal += cost.total;
        aggregate.vat += cost.vat;

        let by_type = aggregate.by_type.entry(team.client_type).or_default();
        by_type.count += 1;
        by_type.amount += cost.total_with_vat;

        let laboratory = if team.laboratory.trim().is_empty() {
            UNSPECIFIED_LABORATORY.to_string()
        } else {
            team.laboratory.clone()
        };
        let by_lab = aggregate.by_laboratory.entry(laboratory).or_default();
        by_lab.count += 1;
        by_lab.amount += cost.total_with_vat;

        for line in &cost.microscopes {
            let cell = aggregate.by_microscope.entry(line.name.clone()).or_default();
            cell.quantity += u64::from(line.sessions);
            cell.amount += line.total;
        }
        for line in &cost.services {
            let cell = aggregate.by_service.entry(line.name.clone()).or_default();
            cell.quantity += u64::from(line.samples);
            cell.amount += line.total;
        }
    }

    aggregate.total = aggregate.subtotal + aggregate.vat;
    aggregate
}

/// Project monthly, quarterly and yearly revenue.
///
/// Team costs bucket by the (year, month) of each team's reference date,
/// falling back to today when absent; `monthly` is the average bucket
/// total. Zero teams yield all-zero projections.
#[must_use]
pub fn calculate_projections(teams: &[Team], config: &TariffConfig) -> Projections {
    let mut buckets: HashMap<(i32, u32), f64> = HashMap::new();
    let today = Utc::now().date_naive();

    for team in teams {
        let date = team.date.unwrap_or(today);
        let cost = calculate_team_cost(team, config);
        *buckets.entry((date.year(), date.month())).or_default() += cost.total_with_vat;
    }

    if buckets.is_empty() {
        return Projections::default();
    }

    let monthly = buckets.values().sum::<f64>() / buckets.len() as f64;
    Projections {
        monthly,
        quarterly: monthly * 3.0,
        yearly: monthly * 12.0,
    }
}

/// Round to two decimals for display or export. Never used during
/// accumulation.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed two-decimal display form of an amount.
#[must_use]
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", round2(value))
}
