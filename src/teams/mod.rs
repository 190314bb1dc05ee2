//! Teams: billable client groups and their CRUD registry.

mod error;
mod registry;
mod types;
mod validation;

pub use error::TeamError;
pub use registry::{TeamRegistry, TEAMS_PATH};
pub use types::{ClientType, ManipulationEntry, ParseClientTypeError, Team};
pub use validation::validate_team;
