//! Core error types.

use thiserror::Error;
use uuid::Uuid;

/// Broad classification of an engine error, used by callers to pick a
/// response category (e.g. HTTP 404 vs 400).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Definition admission failed.
    Validation,
    /// A lookup by id failed.
    NotFound,
    /// An execution-time rule was violated.
    IllegalOperation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::IllegalOperation => "illegal_operation",
        }
    }
}

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("definition name must not be empty")]
    InvalidName,

    #[error("definition must contain at least one state")]
    NoStates,

    #[error("duplicate state id: {state_id}")]
    DuplicateStateId { state_id: String },

    #[error("duplicate action id: {action_id}")]
    DuplicateActionId { action_id: String },

    #[error("definition must have exactly one initial state, found {count}")]
    InitialStateCount { count: usize },

    #[error("action '{action_id}' has no source states")]
    EmptyFromStates { action_id: String },

    #[error("action '{action_id}' references unknown state '{state_id}'")]
    UnknownStateReference { action_id: String, state_id: String },

    #[error("definition not found: {definition_id}")]
    DefinitionNotFound { definition_id: Uuid },

    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: Uuid },

    #[error("action not found: {action_id}")]
    ActionNotFound { action_id: String },

    #[error("definition {definition_id} has no initial state")]
    NoInitialState { definition_id: Uuid },

    #[error("action '{action_id}' is disabled")]
    ActionDisabled { action_id: String },

    #[error("action '{action_id}' cannot be executed from state '{state_id}'")]
    IllegalTransition { action_id: String, state_id: String },

    #[error("instance is in final state '{state_id}'")]
    TerminalState { state_id: String },

    #[error("action '{action_id}' targets unknown state '{state_id}'")]
    TargetStateNotFound { action_id: String, state_id: String },
}

impl EngineError {
    /// Classifies this error for protocol responses.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidName
            | EngineError::NoStates
            | EngineError::DuplicateStateId { .. }
            | EngineError::DuplicateActionId { .. }
            | EngineError::InitialStateCount { .. }
            | EngineError::EmptyFromStates { .. }
            | EngineError::UnknownStateReference { .. } => ErrorKind::Validation,

            EngineError::DefinitionNotFound { .. }
            | EngineError::InstanceNotFound { .. }
            | EngineError::ActionNotFound { .. } => ErrorKind::NotFound,

            EngineError::NoInitialState { .. }
            | EngineError::ActionDisabled { .. }
            | EngineError::IllegalTransition { .. }
            | EngineError::TerminalState { .. }
            | EngineError::TargetStateNotFound { .. } => ErrorKind::IllegalOperation,
        }
    }
}
