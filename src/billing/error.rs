//! Billing-specific error types.

use thiserror::Error;

use super::ledger::InvoiceStatus;

/// Errors that can occur during invoice operations.
#[derive(Debug, Error)]
pub enum BillingError {
    /// No invoice with this number exists.
    #[error("Invoice not found: {number}")]
    InvoiceNotFound {
        /// The number that was looked up.
        number: String,
    },

    /// The requested status change breaks the monotonic invoice flow.
    #[error("Invoice {number}: cannot go from '{from}' to '{to}'")]
    InvalidStatusTransition {
        /// Invoice number.
        number: String,
        /// Current status.
        from: InvoiceStatus,
        /// Requested status.
        to: InvoiceStatus,
    },
}
