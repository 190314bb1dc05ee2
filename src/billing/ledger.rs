//! Invoice ledger: numbered, frozen cost snapshots with a lifecycle.
//!
//! An invoice freezes the team's cost sheet at creation time; later
//! tariff edits never touch an existing invoice. Status moves through
//! the monotonic flow `draft → sent → paid`, with cancellation possible
//! until payment; paid and cancelled are terminal.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use super::costs::{calculate_team_cost, TeamCost};
use super::error::BillingError;
use super::tariffs::TariffManager;
use crate::config::CoreConfig;
use crate::events::EventBus;
use crate::state::StateStore;
use crate::teams::{ClientType, Team};

/// State path the invoice collection lives under.
pub const INVOICES_PATH: &str = "invoices";

/// Days until a new invoice falls due.
const PAYMENT_TERM_DAYS: i64 = 30;

/// Lifecycle status of an invoice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Created, not yet sent to the client.
    #[default]
    Draft,
    /// Sent, awaiting payment.
    Sent,
    /// Paid. Terminal.
    Paid,
    /// Cancelled before payment. Terminal.
    Cancelled,
}

impl InvoiceStatus {
    /// String form matching the persisted representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the monotonic flow allows moving to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent)
                | (Self::Draft, Self::Paid)
                | (Self::Sent, Self::Paid)
                | (Self::Draft, Self::Cancelled)
                | (Self::Sent, Self::Cancelled)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client identity frozen into an invoice at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    /// Team name at creation time.
    pub name: String,
    /// Laboratory at creation time.
    pub laboratory: String,
    /// Billing category at creation time.
    #[serde(rename = "type")]
    pub client_type: ClientType,
    /// Project label, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

/// Billing period covered by an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePeriod {
    /// First day covered.
    pub start: NaiveDate,
    /// Last day covered.
    pub end: NaiveDate,
}

/// A frozen cost snapshot for a team over a billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Unique generated number, `PREFIX-YYYYMM-NNNN`.
    pub number: String,
    /// Issue date.
    pub date: NaiveDate,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Client identity at creation time.
    pub client: ClientSnapshot,
    /// Billing period.
    pub period: InvoicePeriod,
    /// Cost sheet frozen at creation time.
    pub details: TeamCost,
    /// Lifecycle status.
    #[serde(default)]
    pub status: InvoiceStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status-change timestamp.
    pub updated_at: DateTime<Utc>,
    /// Day the invoice was paid, once paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
}

/// Sequentially-numbered invoice records over the state store.
#[derive(Clone)]
pub struct InvoiceLedger {
    state: StateStore,
    bus: EventBus,
    tariffs: TariffManager,
    prefix: String,
    /// Next sequence number. Seeded from the highest stored suffix so
    /// numbers are never reused, even across sessions.
    counter: Arc<AtomicU32>,
}

impl InvoiceLedger {
    /// Create a ledger, seeding the number counter from stored invoices.
    #[must_use]
    pub fn new(
        state: StateStore,
        bus: EventBus,
        tariffs: TariffManager,
        config: &CoreConfig,
    ) -> Self {
        let ledger = Self {
            state,
            bus,
            tariffs,
            prefix: config.invoice_prefix.clone(),
            counter: Arc::new(AtomicU32::new(1)),
        };
        let highest = ledger
            .list()
            .iter()
            .filter_map(|invoice| parse_sequence(&invoice.number))
            .max()
            .unwrap_or(0);
        ledger.counter.store(highest + 1, Ordering::SeqCst);
        ledger
    }

    /// All invoices, in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<Invoice> {
        self.state.get_typed(INVOICES_PATH).unwrap_or_default()
    }

    /// Find an invoice by number.
    #[must_use]
    pub fn get(&self, number: &str) -> Option<Invoice> {
        self.list().into_iter().find(|i| i.number == number)
    }

    /// Next invoice number, `PREFIX-YYYYMM-NNNN`. Each call consumes a
    /// sequence number; numbers are never reissued.
    #[must_use]
    pub fn generate_invoice_number(&self) -> String {
        let now = Utc::now();
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        format!(
            "{}-{:04}{:02}-{:04}",
            self.prefix,
            now.year(),
            now.month(),
            sequence
        )
    }

    /// Create a draft invoice from a team, freezing its cost sheet
    /// against the current tariff configuration.
    #[instrument(skip(self, team), fields(team.name = %team.name))]
    pub fn create_invoice(&self, team: &Team, period: InvoicePeriod) -> Invoice {
        let now = Utc::now();
        let date = now.date_naive();
        let invoice = Invoice {
            number: self.generate_invoice_number(),
            date,
            due_date: date + Duration::days(PAYMENT_TERM_DAYS),
            client: ClientSnapshot {
                name: team.name.clone(),
                laboratory: team.laboratory.clone(),
                client_type: team.client_type,
                project_name: team.project_name.clone(),
            },
            period,
            details: calculate_team_cost(team, &self.tariffs.config()),
            status: InvoiceStatus::Draft,
            created_at: now,
            updated_at: now,
            paid_date: None,
        };

        let mut invoices = self.list();
        invoices.push(invoice.clone());
        self.store(&invoices);
        info!(invoice.number = %invoice.number, "invoice created");
        self.bus.publish(
            "invoice:created",
            json!({ "number": invoice.number, "total": invoice.details.total_with_vat }),
        );
        invoice
    }

    /// Mark an invoice as sent.
    pub fn mark_as_sent(&self, number: &str) -> Result<Invoice, BillingError> {
        self.transition(number, InvoiceStatus::Sent)
    }

    /// Mark an invoice as paid, stamping the payment date.
    pub fn mark_as_paid(&self, number: &str) -> Result<Invoice, BillingError> {
        self.transition(number, InvoiceStatus::Paid)
    }

    /// Cancel an unpaid invoice.
    pub fn cancel(&self, number: &str) -> Result<Invoice, BillingError> {
        self.transition(number, InvoiceStatus::Cancelled)
    }

    /// Delete an invoice and return its final record.
    ///
    /// Deletion is unconditional once invoked; asking the user for
    /// confirmation is the caller's responsibility. The number is never
    /// reissued.
    #[instrument(skip(self))]
    pub fn delete_invoice(&self, number: &str) -> Result<Invoice, BillingError> {
        let mut invoices = self.list();
        let Some(position) = invoices.iter().position(|i| i.number == number) else {
            return Err(BillingError::InvoiceNotFound {
                number: number.to_string(),
            });
        };

        let removed = invoices.remove(position);
        self.store(&invoices);
        info!(invoice.number = %number, "invoice deleted");
        self.bus
            .publish("invoice:deleted", json!({ "number": number }));
        Ok(removed)
    }

    #[instrument(skip(self))]
    fn transition(&self, number: &str, to: InvoiceStatus) -> Result<Invoice, BillingError> {
        let mut invoices = self.list();
        let Some(invoice) = invoices.iter_mut().find(|i| i.number == number) else {
            return Err(BillingError::InvoiceNotFound {
                number: number.to_string(),
            });
        };

        if !invoice.status.can_transition_to(to) {
            return Err(BillingError::InvalidStatusTransition {
                number: number.to_string(),
                from: invoice.status,
                to,
            });
        }

        let now = Utc::now();
        invoice.status = to;
        invoice.updated_at = now;
        if to == InvoiceStatus::Paid {
            invoice.paid_date = Some(now.date_naive());
        }
        let updated = invoice.clone();

        self.store(&invoices);
        info!(invoice.number = %number, status = %to, "invoice status changed");
        self.bus.publish(
            &format!("invoice:{}", to.as_str()),
            json!({ "number": number }),
        );
        Ok(updated)
    }

    fn store(&self, invoices: &[Invoice]) {
        self.state.set_typed(INVOICES_PATH, &invoices);
    }
}

/// Parse the `NNNN` suffix of an invoice number.
fn parse_sequence(number: &str) -> Option<u32> {
    number.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::tariffs::ItemCategory;
    use crate::teams::ClientType;

    fn ledger() -> InvoiceLedger {
        let state = StateStore::new();
        let bus = EventBus::new();
        let tariffs = TariffManager::new(state.clone(), bus.clone());
        InvoiceLedger::new(state, bus, tariffs, &CoreConfig::default())
    }

    fn team(sessions: Vec<u32>) -> Team {
        Team {
            name: "Imagerie".to_string(),
            laboratory: "CBI".to_string(),
            client_type: ClientType::Interne,
            project_name: None,
            microscope_sessions: sessions,
            manipulations: Vec::new(),
            date: None,
        }
    }

    fn period() -> InvoicePeriod {
        InvoicePeriod {
            start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        }
    }

    #[test]
    fn test_number_format_and_monotonic_sequence() {
        let ledger = ledger();
        let first = ledger.generate_invoice_number();
        let second = ledger.generate_invoice_number();
        assert!(first.starts_with("FAC-"));
        assert!(first.ends_with("-0001"));
        assert!(second.ends_with("-0002"));
    }

    #[test]
    fn test_counter_seeds_from_stored_invoices() {
        let state = StateStore::new();
        let bus = EventBus::new();
        let tariffs = TariffManager::new(state.clone(), bus.clone());
        {
            let ledger =
                InvoiceLedger::new(state.clone(), bus.clone(), tariffs.clone(), &CoreConfig::default());
            ledger.create_invoice(&team(vec![1]), period());
            ledger.create_invoice(&team(vec![2]), period());
        }

        // A fresh ledger over the same state continues the sequence.
        let ledger = InvoiceLedger::new(state, bus, tariffs, &CoreConfig::default());
        assert!(ledger.generate_invoice_number().ends_with("-0003"));
    }

    #[test]
    fn test_invoice_cost_is_frozen_at_creation() {
        let state = StateStore::new();
        let bus = EventBus::new();
        let tariffs = TariffManager::new(state.clone(), bus.clone());
        let ledger = InvoiceLedger::new(state, bus, tariffs.clone(), &CoreConfig::default());

        let invoice = ledger.create_invoice(&team(vec![3]), period());
        assert_eq!(invoice.details.total, 180.0);

        tariffs.update_tariff(
            ItemCategory::Microscopes,
            "Tecnai 200 KV",
            ClientType::Interne,
            999.0,
        );
        assert_eq!(ledger.get(&invoice.number).unwrap().details.total, 180.0);
    }

    #[test]
    fn test_vat_consistency_invariant() {
        let ledger = ledger();
        let mut prive = team(vec![2]);
        prive.client_type = ClientType::Prive;
        let invoice = ledger.create_invoice(&prive, period());
        assert_eq!(
            invoice.details.total_with_vat,
            invoice.details.total + invoice.details.vat
        );
        assert_eq!(invoice.details.vat, 72.0);
    }

    #[test]
    fn test_monotonic_status_flow() {
        let ledger = ledger();
        let invoice = ledger.create_invoice(&team(vec![1]), period());

        ledger.mark_as_sent(&invoice.number).unwrap();
        let paid = ledger.mark_as_paid(&invoice.number).unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_date.is_some());

        // Paid is terminal.
        let err = ledger.cancel(&invoice.number).unwrap_err();
        assert!(matches!(err, BillingError::InvalidStatusTransition { .. }));
        let err = ledger.mark_as_sent(&invoice.number).unwrap_err();
        assert!(matches!(err, BillingError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn test_draft_can_be_paid_directly() {
        let ledger = ledger();
        let invoice = ledger.create_invoice(&team(vec![1]), period());
        assert!(ledger.mark_as_paid(&invoice.number).is_ok());
    }

    #[test]
    fn test_unknown_number_is_surfaced() {
        let ledger = ledger();
        let err = ledger.mark_as_paid("FAC-209901-9999").unwrap_err();
        assert!(matches!(err, BillingError::InvoiceNotFound { .. }));
    }

    #[test]
    fn test_delete_removes_but_never_reissues_number() {
        let ledger = ledger();
        let first = ledger.create_invoice(&team(vec![1]), period());
        ledger.delete_invoice(&first.number).unwrap();
        assert!(ledger.get(&first.number).is_none());

        let second = ledger.create_invoice(&team(vec![1]), period());
        assert_ne!(first.number, second.number);
    }
}
