//! Billing: tariff configuration, cost calculation and the invoice
//! ledger.

pub mod costs;
mod error;
pub mod ledger;
pub mod tariffs;

pub use costs::{
    calculate_projections, calculate_team_cost, calculate_total, format_amount, round2,
    AggregateCost, GroupTotal, ItemTotal, MicroscopeLine, Projections, ServiceLine, TeamCost,
    UNSPECIFIED_LABORATORY, VAT_RATE,
};
pub use error::BillingError;
pub use ledger::{
    ClientSnapshot, Invoice, InvoiceLedger, InvoicePeriod, InvoiceStatus, INVOICES_PATH,
};
pub use tariffs::{
    ItemCategory, ServiceItem, TariffConfig, TariffManager, TariffRates, TariffTable, CONFIG_PATH,
};
