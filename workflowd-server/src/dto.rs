//! Request and response body types for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use workflowd_core::{WorkflowDefinition, WorkflowInstance};

/// Body of `POST /api/instances`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRequest {
    pub definition_id: Uuid,
}

/// One entry of the definition list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionSummary {
    pub id: Uuid,
    pub name: String,
    pub state_count: usize,
    pub action_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&WorkflowDefinition> for DefinitionSummary {
    fn from(def: &WorkflowDefinition) -> Self {
        Self {
            id: def.id,
            name: def.name.clone(),
            state_count: def.states.len(),
            action_count: def.actions.len(),
            created_at: def.created_at,
        }
    }
}

/// Body of `GET /api/definitions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDefinitionsResponse {
    pub definitions: Vec<DefinitionSummary>,
}

/// One entry of the instance list. History is omitted for size; fetch the
/// instance itself for the full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub current_state_id: String,
    pub history_len: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowInstance> for InstanceSummary {
    fn from(instance: &WorkflowInstance) -> Self {
        Self {
            id: instance.id,
            definition_id: instance.definition_id,
            current_state_id: instance.current_state_id.clone(),
            history_len: instance.history.len(),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
        }
    }
}

/// Body of `GET /api/instances`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListInstancesResponse {
    pub instances: Vec<InstanceSummary>,
    pub total: u64,
    pub has_more: bool,
}

/// Query parameters accepted by `GET /api/instances`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInstancesParams {
    pub definition_id: Option<Uuid>,
    pub state: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListInstancesParams {
    /// Parses a raw query string. Unknown keys are ignored; malformed
    /// values for known keys are rejected.
    pub fn from_query(query: &str) -> Result<Self, String> {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "definition_id" => {
                    let id = value
                        .parse()
                        .map_err(|_| format!("invalid definition_id '{}'", value))?;
                    params.definition_id = Some(id);
                }
                "state" => params.state = Some(value.into_owned()),
                "limit" => {
                    let n = value
                        .parse()
                        .map_err(|_| format!("invalid limit '{}'", value))?;
                    params.limit = Some(n);
                }
                "offset" => {
                    let n = value
                        .parse()
                        .map_err(|_| format!("invalid offset '{}'", value))?;
                    params.offset = Some(n);
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

/// JSON error body: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}
