//! Team CRUD layered on the state store.
//!
//! Duplicate detection is case-insensitive while storage preserves the
//! submitted casing. Every successful mutation rewrites the `teams`
//! path (which triggers persistence and state subscribers) and emits a
//! semantic event (`team:added`, `team:updated`, `team:removed`)
//! carrying the affected record.

use serde_json::json;
use tracing::{info, instrument};

use super::error::TeamError;
use super::types::Team;
use super::validation::validate_team;
use crate::events::EventBus;
use crate::state::StateStore;

/// State path the team collection lives under.
pub const TEAMS_PATH: &str = "teams";

/// CRUD over the team collection.
#[derive(Clone)]
pub struct TeamRegistry {
    state: StateStore,
    bus: EventBus,
}

impl TeamRegistry {
    /// Create a registry over a state store and event bus.
    #[must_use]
    pub fn new(state: StateStore, bus: EventBus) -> Self {
        Self { state, bus }
    }

    /// All teams, in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Team> {
        self.state.get_typed(TEAMS_PATH).unwrap_or_default()
    }

    /// Find a team by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Team> {
        let wanted = name.to_lowercase();
        self.list()
            .into_iter()
            .find(|team| team.name.to_lowercase() == wanted)
    }

    /// Number of registered teams.
    #[must_use]
    pub fn count(&self) -> usize {
        self.list().len()
    }

    /// Register a new team.
    ///
    /// Rejects invalid records with the full list of validation messages
    /// and rejects names already taken by another team (ignoring case).
    #[instrument(skip(self, team), fields(team.name = %team.name))]
    pub fn add(&self, team: Team) -> Result<Team, TeamError> {
        let errors = validate_team(&team);
        if !errors.is_empty() {
            return Err(TeamError::ValidationFailed { errors });
        }

        let mut teams = self.list();
        let wanted = team.name.to_lowercase();
        if teams.iter().any(|t| t.name.to_lowercase() == wanted) {
            return Err(TeamError::DuplicateName { name: team.name });
        }

        teams.push(team.clone());
        self.store(&teams);
        info!(team.name = %team.name, "team added");
        self.bus.publish(
            "team:added",
            json!({ "team": serde_json::to_value(&team).unwrap_or_default() }),
        );
        Ok(team)
    }

    /// Replace the team registered under `old_name` with `team`.
    ///
    /// The old record is fully replaced, never field-merged. Renaming to
    /// a name held by a *different* existing team is rejected.
    #[instrument(skip(self, team), fields(team.old_name = %old_name))]
    pub fn update(&self, old_name: &str, team: Team) -> Result<Team, TeamError> {
        let errors = validate_team(&team);
        if !errors.is_empty() {
            return Err(TeamError::ValidationFailed { errors });
        }

        let mut teams = self.list();
        let old_lower = old_name.to_lowercase();
        let Some(position) = teams
            .iter()
            .position(|t| t.name.to_lowercase() == old_lower)
        else {
            return Err(TeamError::NotFound {
                name: old_name.to_string(),
            });
        };

        let new_lower = team.name.to_lowercase();
        let collision = teams
            .iter()
            .enumerate()
            .any(|(i, t)| i != position && t.name.to_lowercase() == new_lower);
        if collision {
            return Err(TeamError::DuplicateName { name: team.name });
        }

        teams[position] = team.clone();
        self.store(&teams);
        info!(team.name = %team.name, "team updated");
        self.bus.publish(
            "team:updated",
            json!({
                "oldName": old_name,
                "team": serde_json::to_value(&team).unwrap_or_default(),
            }),
        );
        Ok(team)
    }

    /// Delete a team and return its final record.
    ///
    /// Deletion is unconditional once invoked; asking the user for
    /// confirmation is the caller's responsibility. The name becomes
    /// available for reuse by a brand-new team.
    #[instrument(skip(self))]
    pub fn remove(&self, name: &str) -> Result<Team, TeamError> {
        let mut teams = self.list();
        let wanted = name.to_lowercase();
        let Some(position) = teams.iter().position(|t| t.name.to_lowercase() == wanted) else {
            return Err(TeamError::NotFound {
                name: name.to_string(),
            });
        };

        let removed = teams.remove(position);
        self.store(&teams);
        info!(team.name = %removed.name, "team removed");
        self.bus.publish(
            "team:removed",
            json!({ "team": serde_json::to_value(&removed).unwrap_or_default() }),
        );
        Ok(removed)
    }

    fn store(&self, teams: &[Team]) {
        self.state.set_typed(TEAMS_PATH, &teams);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::ClientType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn registry() -> (TeamRegistry, EventBus) {
        let bus = EventBus::new();
        let registry = TeamRegistry::new(StateStore::new(), bus.clone());
        (registry, bus)
    }

    fn team(name: &str) -> Team {
        Team {
            name: name.to_string(),
            laboratory: "CBI".to_string(),
            client_type: ClientType::Interne,
            project_name: None,
            microscope_sessions: vec![2],
            manipulations: Vec::new(),
            date: None,
        }
    }

    #[test]
    fn test_add_then_get() {
        let (registry, _) = registry();
        registry.add(team("Imagerie")).unwrap();
        assert_eq!(registry.get("imagerie").unwrap().name, "Imagerie");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected_case_insensitively() {
        let (registry, _) = registry();
        registry.add(team("Imagerie")).unwrap();
        let err = registry.add(team("IMAGERIE")).unwrap_err();
        assert!(matches!(err, TeamError::DuplicateName { .. }));
        assert_eq!(registry.count(), 1);
        // Stored casing is the one submitted first.
        assert_eq!(registry.list()[0].name, "Imagerie");
    }

    #[test]
    fn test_invalid_team_reports_all_errors() {
        let (registry, _) = registry();
        let mut bad = team("X");
        bad.laboratory = "Y".to_string();
        match registry.add(bad).unwrap_err() {
            TeamError::ValidationFailed { errors } => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_update_replaces_record_fully() {
        let (registry, _) = registry();
        registry.add(team("Imagerie")).unwrap();
        let mut updated = team("Imagerie");
        updated.project_name = Some("Cryo-EM".to_string());
        updated.microscope_sessions = vec![5, 1];
        registry.update("imagerie", updated).unwrap();

        let stored = registry.get("Imagerie").unwrap();
        assert_eq!(stored.project_name.as_deref(), Some("Cryo-EM"));
        assert_eq!(stored.microscope_sessions, vec![5, 1]);
    }

    #[test]
    fn test_update_rename_collision_rejected() {
        let (registry, _) = registry();
        registry.add(team("Alpha")).unwrap();
        registry.add(team("Beta")).unwrap();
        let err = registry.update("Alpha", team("beta")).unwrap_err();
        assert!(matches!(err, TeamError::DuplicateName { .. }));
    }

    #[test]
    fn test_update_rename_to_self_allowed() {
        let (registry, _) = registry();
        registry.add(team("Alpha")).unwrap();
        // Recasing the same team is not a collision.
        registry.update("Alpha", team("ALPHA")).unwrap();
        assert_eq!(registry.list()[0].name, "ALPHA");
    }

    #[test]
    fn test_remove_frees_the_name() {
        let (registry, _) = registry();
        registry.add(team("Imagerie")).unwrap();
        registry.remove("Imagerie").unwrap();
        assert_eq!(registry.count(), 0);
        registry.add(team("Imagerie")).unwrap();
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let (registry, _) = registry();
        let err = registry.remove("Ghost").unwrap_err();
        assert!(matches!(err, TeamError::NotFound { .. }));
    }

    #[test]
    fn test_mutations_emit_events() {
        let (registry, bus) = registry();
        let added = Arc::new(AtomicUsize::new(0));
        let added_clone = Arc::clone(&added);
        bus.subscribe("team:added", move |event| {
            assert_eq!(event.payload["team"]["name"], "Imagerie");
            added_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        registry.add(team("Imagerie")).unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 1);
    }
}
