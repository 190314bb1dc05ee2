//! Team error types.

use thiserror::Error;

/// Errors that can occur during team operations.
#[derive(Debug, Error)]
pub enum TeamError {
    /// The submitted record failed validation. Every problem is listed.
    #[error("Team validation failed: {}", errors.join("; "))]
    ValidationFailed {
        /// Human-readable messages, one per problem.
        errors: Vec<String>,
    },

    /// No team with this name exists.
    #[error("Team not found: {name}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A team with this name (ignoring case) already exists.
    #[error("A team named '{name}' already exists")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },
}
