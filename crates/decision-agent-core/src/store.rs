//! Snapshot persistence seam.
//!
//! The agent persists its full state as three named snapshots rather than
//! appending deltas; each save replaces the previous snapshot wholesale.
//! Backends implement [`StateStore`]; the in-memory implementation here
//! backs tests and ephemeral runs.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::experience::{Experience, Insight};
use crate::params::{AdaptationRecord, Parameter, ParameterName};
use crate::AgentError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExperienceLogSnapshot {
    pub experiences: Vec<Experience>,
    pub insights: Vec<Insight>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterSetSnapshot {
    pub parameters: BTreeMap<ParameterName, Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AdaptationHistorySnapshot {
    pub history: BTreeMap<ParameterName, Vec<AdaptationRecord>>,
}

/// Storage backend for the agent's three state snapshots.
///
/// Loads return `Ok(None)` when no snapshot has been saved yet, so a fresh
/// backend starts the agent from defaults.
pub trait StateStore {
    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be read.
    fn load_experience_log(&self) -> Result<Option<ExperienceLogSnapshot>, AgentError>;

    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be written.
    fn save_experience_log(&self, snapshot: &ExperienceLogSnapshot) -> Result<(), AgentError>;

    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be read.
    fn load_parameter_set(&self) -> Result<Option<ParameterSetSnapshot>, AgentError>;

    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be written.
    fn save_parameter_set(&self, snapshot: &ParameterSetSnapshot) -> Result<(), AgentError>;

    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be read.
    fn load_adaptation_history(&self) -> Result<Option<AdaptationHistorySnapshot>, AgentError>;

    /// # Errors
    /// Returns [`AgentError::Storage`] when the backend cannot be written.
    fn save_adaptation_history(
        &self,
        snapshot: &AdaptationHistorySnapshot,
    ) -> Result<(), AgentError>;
}

/// Volatile backend for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    experience_log: RefCell<Option<ExperienceLogSnapshot>>,
    parameter_set: RefCell<Option<ParameterSetSnapshot>>,
    adaptation_history: RefCell<Option<AdaptationHistorySnapshot>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn load_experience_log(&self) -> Result<Option<ExperienceLogSnapshot>, AgentError> {
        Ok(self.experience_log.borrow().clone())
    }

    fn save_experience_log(&self, snapshot: &ExperienceLogSnapshot) -> Result<(), AgentError> {
        *self.experience_log.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }

    fn load_parameter_set(&self) -> Result<Option<ParameterSetSnapshot>, AgentError> {
        Ok(self.parameter_set.borrow().clone())
    }

    fn save_parameter_set(&self, snapshot: &ParameterSetSnapshot) -> Result<(), AgentError> {
        *self.parameter_set.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }

    fn load_adaptation_history(&self) -> Result<Option<AdaptationHistorySnapshot>, AgentError> {
        Ok(self.adaptation_history.borrow().clone())
    }

    fn save_adaptation_history(
        &self,
        snapshot: &AdaptationHistorySnapshot,
    ) -> Result<(), AgentError> {
        *self.adaptation_history.borrow_mut() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    #[test]
    fn fresh_store_loads_nothing() {
        let store = InMemoryStateStore::new();
        assert!(must_ok(store.load_experience_log()).is_none());
        assert!(must_ok(store.load_parameter_set()).is_none());
        assert!(must_ok(store.load_adaptation_history()).is_none());
    }

    #[test]
    fn save_replaces_the_previous_snapshot() {
        let store = InMemoryStateStore::new();

        let first = ParameterSetSnapshot {
            parameters: ParameterSet::defaults().parameters().clone(),
        };
        must_ok(store.save_parameter_set(&first));

        let mut second = first.clone();
        second.parameters.clear();
        must_ok(store.save_parameter_set(&second));

        let loaded = must_ok(store.load_parameter_set());
        assert_eq!(loaded, Some(second));
    }

    #[test]
    fn snapshots_round_trip_through_json() {
        let snapshot = ParameterSetSnapshot {
            parameters: ParameterSet::defaults().parameters().clone(),
        };
        let encoded = must_ok(serde_json::to_string(&snapshot));
        let decoded: ParameterSetSnapshot = must_ok(serde_json::from_str(&encoded));
        assert_eq!(decoded, snapshot);
    }
}
