//! Workflow definition types and admission validation.
//!
//! A definition is submitted as a draft:
//!
//! ```json
//! {
//!   "name": "document approval",
//!   "states": [
//!     {"id": "draft", "name": "Draft", "is_initial": true},
//!     {"id": "review", "name": "In review"},
//!     {"id": "approved", "name": "Approved", "is_final": true}
//!   ],
//!   "actions": [
//!     {"id": "submit", "name": "Submit", "from_states": ["draft"], "to_state": "review"},
//!     {"id": "approve", "name": "Approve", "from_states": ["review"], "to_state": "approved"}
//!   ]
//! }
//! ```

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

fn default_enabled() -> bool {
    true
}

/// A state in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Unique id within the definition.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether new instances start here. Exactly one per definition.
    #[serde(default)]
    pub is_initial: bool,

    /// Whether this state terminates an instance.
    #[serde(default)]
    pub is_final: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A directed, possibly multi-source transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Unique id within the definition.
    pub id: String,

    /// Display name, also snapshotted into instance history on execution.
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Source state ids. Must be non-empty.
    pub from_states: Vec<String>,

    /// Target state id.
    pub to_state: String,
}

/// Unvalidated admission input, deserialized straight from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDraft {
    pub name: String,

    #[serde(default)]
    pub states: Vec<State>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A validated workflow definition. Immutable after admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Generated id, globally unique.
    pub id: Uuid,

    pub name: String,

    pub states: Vec<State>,

    pub actions: Vec<Action>,

    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Validates a draft and promotes it to a definition.
    ///
    /// Checks run in a fixed order and the first failure wins: non-empty
    /// name, at least one state, distinct state ids, distinct action ids,
    /// exactly one initial state, then per-action source/target references.
    pub fn from_draft(draft: DefinitionDraft) -> Result<Self, EngineError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidName);
        }

        if draft.states.is_empty() {
            return Err(EngineError::NoStates);
        }

        let mut state_ids: HashSet<&str> = HashSet::with_capacity(draft.states.len());
        for state in &draft.states {
            if !state_ids.insert(state.id.as_str()) {
                return Err(EngineError::DuplicateStateId {
                    state_id: state.id.clone(),
                });
            }
        }

        let mut action_ids: HashSet<&str> = HashSet::with_capacity(draft.actions.len());
        for action in &draft.actions {
            if !action_ids.insert(action.id.as_str()) {
                return Err(EngineError::DuplicateActionId {
                    action_id: action.id.clone(),
                });
            }
        }

        let initial_count = draft.states.iter().filter(|s| s.is_initial).count();
        if initial_count != 1 {
            return Err(EngineError::InitialStateCount {
                count: initial_count,
            });
        }

        for action in &draft.actions {
            if action.from_states.is_empty() {
                return Err(EngineError::EmptyFromStates {
                    action_id: action.id.clone(),
                });
            }
            if !state_ids.contains(action.to_state.as_str()) {
                return Err(EngineError::UnknownStateReference {
                    action_id: action.id.clone(),
                    state_id: action.to_state.clone(),
                });
            }
            for from in &action.from_states {
                if !state_ids.contains(from.as_str()) {
                    return Err(EngineError::UnknownStateReference {
                        action_id: action.id.clone(),
                        state_id: from.clone(),
                    });
                }
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            states: draft.states,
            actions: draft.actions,
            created_at: Utc::now(),
        })
    }

    /// Looks up a state by id.
    pub fn state(&self, state_id: &str) -> Option<&State> {
        self.states.iter().find(|s| s.id == state_id)
    }

    /// Looks up an action by id.
    pub fn action(&self, action_id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    /// Returns the state flagged initial, if any.
    ///
    /// Admission guarantees exactly one, but callers constructing
    /// definitions through other paths get `None` rather than a panic.
    pub fn initial_state(&self) -> Option<&State> {
        self.states.iter().find(|s| s.is_initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str) -> State {
        State {
            id: id.to_string(),
            name: id.to_string(),
            is_initial: false,
            is_final: false,
            enabled: true,
            description: None,
        }
    }

    fn initial(id: &str) -> State {
        State {
            is_initial: true,
            ..state(id)
        }
    }

    fn action(id: &str, from: &[&str], to: &str) -> Action {
        Action {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            from_states: from.iter().map(|s| s.to_string()).collect(),
            to_state: to.to_string(),
        }
    }

    fn sample_draft() -> DefinitionDraft {
        DefinitionDraft {
            name: "order".to_string(),
            states: vec![initial("created"), state("paid"), state("shipped")],
            actions: vec![
                action("pay", &["created"], "paid"),
                action("ship", &["paid"], "shipped"),
            ],
        }
    }

    #[test]
    fn test_admit_valid_draft() {
        let def = WorkflowDefinition::from_draft(sample_draft()).unwrap();
        assert_eq!(def.name, "order");
        assert_eq!(def.states.len(), 3);
        assert_eq!(def.actions.len(), 2);
        assert_eq!(def.initial_state().unwrap().id, "created");
    }

    #[test]
    fn test_name_is_trimmed() {
        let mut draft = sample_draft();
        draft.name = "  order  ".to_string();
        let def = WorkflowDefinition::from_draft(draft).unwrap();
        assert_eq!(def.name, "order");
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut draft = sample_draft();
        draft.name = "   ".to_string();
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(result, Err(EngineError::InvalidName)));
    }

    #[test]
    fn test_no_states_rejected() {
        let mut draft = sample_draft();
        draft.states.clear();
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(result, Err(EngineError::NoStates)));
    }

    #[test]
    fn test_duplicate_state_id_rejected() {
        let mut draft = sample_draft();
        draft.states.push(state("paid"));
        let result = WorkflowDefinition::from_draft(draft);
        assert!(
            matches!(result, Err(EngineError::DuplicateStateId { state_id }) if state_id == "paid")
        );
    }

    #[test]
    fn test_duplicate_action_id_rejected() {
        let mut draft = sample_draft();
        draft.actions.push(action("pay", &["paid"], "shipped"));
        let result = WorkflowDefinition::from_draft(draft);
        assert!(
            matches!(result, Err(EngineError::DuplicateActionId { action_id }) if action_id == "pay")
        );
    }

    #[test]
    fn test_zero_initial_states_rejected() {
        let mut draft = sample_draft();
        draft.states[0].is_initial = false;
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(
            result,
            Err(EngineError::InitialStateCount { count: 0 })
        ));
    }

    #[test]
    fn test_multiple_initial_states_rejected() {
        let mut draft = sample_draft();
        draft.states[1].is_initial = true;
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(
            result,
            Err(EngineError::InitialStateCount { count: 2 })
        ));
    }

    #[test]
    fn test_unknown_target_state_rejected() {
        let mut draft = sample_draft();
        draft.actions.push(action("lose", &["paid"], "lost"));
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(
            result,
            Err(EngineError::UnknownStateReference { action_id, state_id })
                if action_id == "lose" && state_id == "lost"
        ));
    }

    #[test]
    fn test_unknown_source_state_rejected() {
        let mut draft = sample_draft();
        draft.actions.push(action("redo", &["returned"], "paid"));
        let result = WorkflowDefinition::from_draft(draft);
        assert!(matches!(
            result,
            Err(EngineError::UnknownStateReference { action_id, state_id })
                if action_id == "redo" && state_id == "returned"
        ));
    }

    #[test]
    fn test_empty_from_states_rejected() {
        let mut draft = sample_draft();
        draft.actions.push(action("nowhere", &[], "paid"));
        let result = WorkflowDefinition::from_draft(draft);
        assert!(
            matches!(result, Err(EngineError::EmptyFromStates { action_id }) if action_id == "nowhere")
        );
    }

    #[test]
    fn test_draft_deserialization_defaults() {
        let draft: DefinitionDraft = serde_json::from_value(serde_json::json!({
            "name": "minimal",
            "states": [{"id": "only", "name": "Only", "is_initial": true}]
        }))
        .unwrap();

        assert!(draft.actions.is_empty());
        assert!(draft.states[0].enabled);
        assert!(!draft.states[0].is_final);

        let def = WorkflowDefinition::from_draft(draft).unwrap();
        assert_eq!(def.initial_state().unwrap().id, "only");
    }

    #[test]
    fn test_lookup_helpers() {
        let def = WorkflowDefinition::from_draft(sample_draft()).unwrap();
        assert_eq!(def.state("paid").unwrap().name, "paid");
        assert!(def.state("missing").is_none());
        assert_eq!(def.action("ship").unwrap().to_state, "shipped");
        assert!(def.action("missing").is_none());
    }
}
