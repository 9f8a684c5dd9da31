//! # workflowd-core
//!
//! Workflow engine for workflowd.
//!
//! This crate provides:
//! - Definition validation and the definition catalog
//! - Instance state management and transition history
//! - Action execution rules

pub mod definition;
pub mod engine;
pub mod error;
pub mod instance;
pub mod store;

pub use definition::{Action, DefinitionDraft, State, WorkflowDefinition};
pub use engine::InstanceEngine;
pub use error::{EngineError, ErrorKind};
pub use instance::{HistoryEntry, WorkflowInstance};
pub use store::DefinitionStore;
