//! Team input validation.
//!
//! Validation aggregates every problem into a message list instead of
//! stopping at the first, so the caller can show the user everything to
//! fix at once.

use super::types::Team;

/// Minimum length for team and laboratory names.
const MIN_NAME_LEN: usize = 2;

/// Validate a team record. Empty result means the record is acceptable.
#[must_use]
pub fn validate_team(team: &Team) -> Vec<String> {
    let mut errors = Vec::new();

    if team.name.trim().chars().count() < MIN_NAME_LEN {
        errors.push(format!(
            "team name must be at least {MIN_NAME_LEN} characters"
        ));
    }
    if team.laboratory.trim().chars().count() < MIN_NAME_LEN {
        errors.push(format!(
            "laboratory must be at least {MIN_NAME_LEN} characters"
        ));
    }
    for (index, manipulation) in team.manipulations.iter().enumerate() {
        if manipulation.name.trim().is_empty() {
            errors.push(format!("manipulation {} has an empty name", index + 1));
        }
    }

    errors
}
