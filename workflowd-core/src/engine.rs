//! Instance engine - owns running instances and applies action execution.

use crate::error::EngineError;
use crate::instance::WorkflowInstance;
use crate::store::DefinitionStore;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Owns the catalog of running instances.
///
/// Each instance sits behind its own `RwLock`, so concurrent `execute`
/// calls against the same instance serialize while calls against
/// different instances proceed independently. The definition store is
/// injected at construction, there is no ambient global catalog.
pub struct InstanceEngine {
    definitions: Arc<DefinitionStore>,
    instances: DashMap<Uuid, RwLock<WorkflowInstance>>,
}

impl InstanceEngine {
    pub fn new(definitions: Arc<DefinitionStore>) -> Self {
        Self {
            definitions,
            instances: DashMap::new(),
        }
    }

    /// Returns the definition store this engine resolves against.
    pub fn definitions(&self) -> &Arc<DefinitionStore> {
        &self.definitions
    }

    /// Starts a new instance of the given definition.
    ///
    /// The instance is placed on the definition's initial state with empty
    /// history. A definition without an initial state is rejected here even
    /// though admission guarantees one, since a `WorkflowDefinition` could
    /// in principle be built without going through `admit`.
    pub fn start(&self, definition_id: Uuid) -> Result<WorkflowInstance, EngineError> {
        let definition = self.definitions.get(definition_id)?;
        let initial = definition
            .initial_state()
            .ok_or(EngineError::NoInitialState { definition_id })?;

        let instance = WorkflowInstance::new(definition.id, initial.id.clone());
        tracing::info!(
            instance_id = %instance.id,
            definition_id = %definition.id,
            state = %instance.current_state_id,
            "instance started"
        );
        self.instances
            .insert(instance.id, RwLock::new(instance.clone()));
        Ok(instance)
    }

    /// Executes an action against an instance.
    ///
    /// All checks run before the single mutation, so a failed call leaves
    /// the instance untouched. The whole read-validate-mutate sequence
    /// holds the instance's write lock.
    pub fn execute(
        &self,
        instance_id: Uuid,
        action_id: &str,
    ) -> Result<WorkflowInstance, EngineError> {
        let instance_lock = self
            .instances
            .get(&instance_id)
            .ok_or(EngineError::InstanceNotFound { instance_id })?;
        let mut instance = instance_lock.write();

        let definition = self.definitions.get(instance.definition_id)?;

        let action = definition
            .action(action_id)
            .ok_or_else(|| EngineError::ActionNotFound {
                action_id: action_id.to_string(),
            })?;

        // A final current state locks out every known action, disabled or
        // not; it wins over both the disabled and wrong-state rejections.
        let current_is_final = definition
            .state(&instance.current_state_id)
            .map(|s| s.is_final)
            .unwrap_or(false);
        if current_is_final {
            return Err(EngineError::TerminalState {
                state_id: instance.current_state_id.clone(),
            });
        }

        if !action.enabled {
            return Err(EngineError::ActionDisabled {
                action_id: action.id.clone(),
            });
        }

        let from_ok = action
            .from_states
            .iter()
            .any(|s| *s == instance.current_state_id);
        if !from_ok {
            return Err(EngineError::IllegalTransition {
                action_id: action.id.clone(),
                state_id: instance.current_state_id.clone(),
            });
        }

        if definition.state(&action.to_state).is_none() {
            return Err(EngineError::TargetStateNotFound {
                action_id: action.id.clone(),
                state_id: action.to_state.clone(),
            });
        }

        instance.apply_transition(action);
        tracing::debug!(
            instance_id = %instance.id,
            action_id = %action.id,
            state = %instance.current_state_id,
            "action executed"
        );
        Ok(instance.clone())
    }

    /// Gets a point-in-time clone of an instance.
    pub fn get(&self, instance_id: Uuid) -> Result<WorkflowInstance, EngineError> {
        self.instances
            .get(&instance_id)
            .map(|r| r.read().clone())
            .ok_or(EngineError::InstanceNotFound { instance_id })
    }

    /// Returns snapshot clones of all instances. Iteration order is unspecified.
    pub fn list(&self) -> Vec<WorkflowInstance> {
        self.instances
            .iter()
            .map(|r| r.value().read().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
