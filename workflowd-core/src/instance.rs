//! Instance state management.

use crate::definition::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An audit record of one executed transition.
///
/// The action name is snapshotted at execution time so history stays stable
/// even if definitions were ever made editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action_id: String,
    pub action_name: String,
    pub from_state_id: String,
    pub to_state_id: String,
    pub at: DateTime<Utc>,
}

/// One live execution of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Generated id, globally unique.
    pub id: Uuid,

    /// Back-reference to the definition, lookup only.
    pub definition_id: Uuid,

    /// Id of the state the instance currently occupies. Always names a
    /// state in the referenced definition.
    pub current_state_id: String,

    /// Append-only transition history.
    pub history: Vec<HistoryEntry>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Creates a new instance positioned on the given initial state.
    pub fn new(definition_id: Uuid, initial_state_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            definition_id,
            current_state_id: initial_state_id.into(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the instance along the given action and records the transition.
    pub fn apply_transition(&mut self, action: &Action) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            from_state_id: std::mem::replace(&mut self.current_state_id, action.to_state.clone()),
            to_state_id: action.to_state.clone(),
            at: now,
        });
        self.updated_at = now;
    }
}
