use crate::billing::BillingError;
use crate::storage::StorageError;
use crate::teams::TeamError;
use crate::transfer::TransferError;

/// The main error type for microbill operations.
///
/// Expected failure modes (validation, not-found, storage, import) are
/// modeled explicitly; callers can match on the variant to decide how to
/// surface the failure. Genuinely unexpected errors travel through the
/// `Anyhow` variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input failed validation. Carries every message, not just the first.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A named team or invoice does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence failed. In-memory state remains correct.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A backup bundle or CSV payload could not be applied.
    #[error(transparent)]
    Import(#[from] TransferError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Team(#[from] TeamError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience Result type for microbill operations.
pub type Result<T> = std::result::Result<T, Error>;
