//! Definition catalog.

use crate::definition::{DefinitionDraft, WorkflowDefinition};
use crate::error::EngineError;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Owns the catalog of admitted workflow definitions.
///
/// Definitions are validated on the way in and are write-once afterward;
/// concurrent readers share them through `Arc`. There is no deletion, the
/// catalog grows for the process lifetime.
#[derive(Default)]
pub struct DefinitionStore {
    definitions: DashMap<Uuid, Arc<WorkflowDefinition>>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a draft and admits it to the catalog.
    pub fn admit(&self, draft: DefinitionDraft) -> Result<Arc<WorkflowDefinition>, EngineError> {
        let definition = Arc::new(WorkflowDefinition::from_draft(draft)?);
        self.definitions
            .insert(definition.id, definition.clone());
        tracing::info!(
            definition_id = %definition.id,
            name = %definition.name,
            states = definition.states.len(),
            actions = definition.actions.len(),
            "definition admitted"
        );
        Ok(definition)
    }

    /// Gets a definition by id.
    pub fn get(&self, definition_id: Uuid) -> Result<Arc<WorkflowDefinition>, EngineError> {
        self.definitions
            .get(&definition_id)
            .map(|r| r.clone())
            .ok_or(EngineError::DefinitionNotFound { definition_id })
    }

    /// Returns a snapshot of all definitions. Iteration order is unspecified.
    pub fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.definitions.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Inserts a definition without validation, bypassing `admit`.
    /// Exists so tests can exercise the engine's defensive checks.
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&self, definition: Arc<WorkflowDefinition>) {
        self.definitions.insert(definition.id, definition);
    }
}
