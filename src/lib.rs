//! Microbill - billing core for an electron-microscopy facility
//!
//! Microbill tracks the teams using a microscopy platform, prices their
//! microscope sessions and sample-preparation services against a
//! configurable tariff table, and issues invoices with frozen costs. It
//! is a pure library: no UI, no server, just the state, storage, and
//! billing layers an embedding application builds on.
//!
//! # Features
//!
//! - **State**: hierarchical dotted-path state tree with change
//!   subscriptions and optional persistence
//! - **Storage**: namespaced key-value persistence over pluggable
//!   backends (in-memory, file-per-key)
//! - **Events**: synchronous topic bus with wildcard subscriptions
//! - **Tariffs**: per-client-type unit prices for microscopes and
//!   services, seeded with facility defaults
//! - **Billing**: per-team costs, facility-wide aggregates, monthly
//!   projections, VAT for private-sector clients only
//! - **Invoices**: sequential numbering, frozen cost snapshots, an
//!   enforced status lifecycle
//! - **Transfer**: versioned export/import bundles and CSV encoding
//!
//! # Quick Start
//!
//! ```rust
//! use microbill::{Facility, init_tracing};
//! use microbill::teams::{ClientType, Team};
//!
//! init_tracing();
//!
//! let facility = Facility::in_memory();
//! facility.teams().add(Team {
//!     name: "Équipe Cryo".to_string(),
//!     laboratory: "CBI".to_string(),
//!     client_type: ClientType::Interne,
//!     microscope_sessions: vec![3, 0, 0],
//!     ..Team::default()
//! }).unwrap();
//!
//! let team = facility.teams().get("Équipe Cryo").unwrap();
//! let cost = microbill::billing::calculate_team_cost(&team, &facility.tariffs().config());
//! assert_eq!(cost.total, 180.0);
//! ```

mod app;
pub mod billing;
mod config;
mod error;
pub mod events;
pub mod state;
pub mod storage;
pub mod teams;
pub mod transfer;

pub use app::Facility;
pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{Event, EventBus, SubscriptionId};
pub use state::{ChangeEvent, StateStore};
pub use storage::{FileBackend, KeyValueStore, MemoryBackend, StorageBackend, StorageError};
pub use transfer::{ExportBundle, TransferError, BUNDLE_VERSION};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with sensible defaults
///
/// Reads the log level from the `RUST_LOG` environment variable,
/// defaulting to `info`. Set `MICROBILL_LOG_JSON=true` for JSON output.
///
/// # Example
///
/// ```rust,no_run
/// fn main() {
///     microbill::init_tracing();
///     // ... rest of your app
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("MICROBILL_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
