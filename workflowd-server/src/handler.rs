//! Request handlers for the HTTP API.

use crate::dto::{
    DefinitionSummary, ErrorBody, InstanceSummary, ListDefinitionsResponse, ListInstancesParams,
    ListInstancesResponse, StartInstanceRequest,
};
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::routes::Route;
use hyper::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use workflowd_core::{DefinitionDraft, DefinitionStore, InstanceEngine};

/// Default page size for instance listings.
const DEFAULT_LIST_LIMIT: usize = 100;

/// A fully rendered API response, independent of the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json(status: StatusCode, value: &Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            // Serializing a Value we just built cannot fail.
            body: serde_json::to_vec(value).unwrap(),
        }
    }

    fn text(status: StatusCode, body: &'static str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }
}

/// Dispatches parsed HTTP requests to the engine.
pub struct ApiHandler {
    definitions: Arc<DefinitionStore>,
    engine: Arc<InstanceEngine>,
    metrics: Option<Arc<Metrics>>,
}

impl ApiHandler {
    /// Creates a new handler over the given catalogs.
    pub fn new(definitions: Arc<DefinitionStore>, engine: Arc<InstanceEngine>) -> Self {
        Self {
            definitions,
            engine,
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns a reference to the metrics, if set.
    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Updates gauge metrics from current catalog sizes.
    pub fn update_gauge_metrics(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics.definitions_total.set(self.definitions.len() as f64);
            metrics.instances_total.set(self.engine.len() as f64);
        }
    }

    /// Handles one request: resolves the route, runs the operation, and
    /// renders either the result or a typed error body.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> ApiResponse {
        let route = match Route::resolve(method, path) {
            Ok(route) => route,
            Err(e) => {
                tracing::debug!(%method, path, error = %e, "unroutable request");
                if let Some(ref metrics) = self.metrics {
                    metrics
                        .errors_total
                        .with_label_values(&[e.kind_str()])
                        .inc();
                }
                return Self::error_response(&e);
            }
        };

        let op_name = route.operation_name();

        let timer = self.metrics.as_ref().map(|m| {
            m.request_duration
                .with_label_values(&[op_name])
                .start_timer()
        });

        let result = match route {
            Route::Health => Ok((StatusCode::OK, Value::Null)),
            Route::CreateDefinition => self.handle_create_definition(body),
            Route::ListDefinitions => self.handle_list_definitions(),
            Route::GetDefinition(id) => self.handle_get_definition(id),
            Route::StartInstance => self.handle_start_instance(body),
            Route::ListInstances => self.handle_list_instances(query.unwrap_or("")),
            Route::GetInstance(id) => self.handle_get_instance(id),
            Route::ExecuteAction(id, ref action_id) => self.handle_execute_action(id, action_id),
        };

        if let Some(ref metrics) = self.metrics {
            metrics.requests_total.with_label_values(&[op_name]).inc();
            if let Err(ref e) = result {
                metrics
                    .errors_total
                    .with_label_values(&[e.kind_str()])
                    .inc();
            }
        }
        drop(timer); // Observation happens on drop

        match result {
            Ok((status, _)) if matches!(route, Route::Health) => ApiResponse::text(status, "OK"),
            Ok((status, value)) => {
                tracing::info!(operation = op_name, status = status.as_u16(), "request ok");
                ApiResponse::json(status, &value)
            }
            Err(e) => {
                tracing::info!(
                    operation = op_name,
                    status = e.status().as_u16(),
                    error = %e,
                    "request failed"
                );
                Self::error_response(&e)
            }
        }
    }

    /// Renders an error into the standard error body.
    pub fn error_response(e: &ServerError) -> ApiResponse {
        let body = serde_json::to_value(ErrorBody::new(e.kind_str(), e.to_string())).unwrap();
        ApiResponse::json(e.status(), &body)
    }

    fn handle_create_definition(&self, body: &[u8]) -> Result<(StatusCode, Value), ServerError> {
        let draft: DefinitionDraft = serde_json::from_slice(body)?;
        let definition = self.definitions.admit(draft)?;
        self.update_gauge_metrics();
        Ok((StatusCode::CREATED, serde_json::to_value(&*definition)?))
    }

    fn handle_list_definitions(&self) -> Result<(StatusCode, Value), ServerError> {
        let mut definitions = self.definitions.list();
        definitions.sort_by_key(|d| d.created_at);

        let response = ListDefinitionsResponse {
            definitions: definitions
                .iter()
                .map(|d| DefinitionSummary::from(d.as_ref()))
                .collect(),
        };
        Ok((StatusCode::OK, serde_json::to_value(response)?))
    }

    fn handle_get_definition(&self, id: Uuid) -> Result<(StatusCode, Value), ServerError> {
        let definition = self.definitions.get(id)?;
        Ok((StatusCode::OK, serde_json::to_value(&*definition)?))
    }

    fn handle_start_instance(&self, body: &[u8]) -> Result<(StatusCode, Value), ServerError> {
        let request: StartInstanceRequest = serde_json::from_slice(body)?;
        let instance = self.engine.start(request.definition_id)?;
        self.update_gauge_metrics();
        Ok((StatusCode::CREATED, serde_json::to_value(instance)?))
    }

    fn handle_list_instances(&self, query: &str) -> Result<(StatusCode, Value), ServerError> {
        let params = ListInstancesParams::from_query(query).map_err(ServerError::InvalidRequest)?;

        let mut filtered: Vec<_> = self
            .engine
            .list()
            .into_iter()
            .filter(|i| {
                if let Some(definition_id) = params.definition_id {
                    if i.definition_id != definition_id {
                        return false;
                    }
                }
                if let Some(ref state) = params.state {
                    if &i.current_state_id != state {
                        return false;
                    }
                }
                true
            })
            .collect();
        filtered.sort_by_key(|i| i.created_at);

        let total = filtered.len() as u64;
        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);

        let page: Vec<InstanceSummary> = filtered
            .iter()
            .skip(offset)
            .take(limit)
            .map(InstanceSummary::from)
            .collect();
        let has_more = (offset + page.len()) < total as usize;

        let response = ListInstancesResponse {
            instances: page,
            total,
            has_more,
        };
        Ok((StatusCode::OK, serde_json::to_value(response)?))
    }

    fn handle_get_instance(&self, id: Uuid) -> Result<(StatusCode, Value), ServerError> {
        let instance = self.engine.get(id)?;
        Ok((StatusCode::OK, serde_json::to_value(instance)?))
    }

    fn handle_execute_action(
        &self,
        instance_id: Uuid,
        action_id: &str,
    ) -> Result<(StatusCode, Value), ServerError> {
        let instance = self.engine.execute(instance_id, action_id)?;
        Ok((StatusCode::OK, serde_json::to_value(instance)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_handler() -> ApiHandler {
        let definitions = Arc::new(DefinitionStore::new());
        let engine = Arc::new(InstanceEngine::new(definitions.clone()));
        ApiHandler::new(definitions, engine)
    }

    fn approval_draft() -> Value {
        json!({
            "name": "document approval",
            "states": [
                {"id": "draft", "name": "Draft", "is_initial": true},
                {"id": "review", "name": "In review"},
                {"id": "approved", "name": "Approved", "is_final": true}
            ],
            "actions": [
                {"id": "submit", "name": "Submit", "from_states": ["draft"], "to_state": "review"},
                {"id": "approve", "name": "Approve", "from_states": ["review"], "to_state": "approved"}
            ]
        })
    }

    fn post(handler: &ApiHandler, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = handler.dispatch(
            &Method::POST,
            path,
            None,
            &serde_json::to_vec(body).unwrap(),
        );
        (
            response.status,
            serde_json::from_slice(&response.body).unwrap(),
        )
    }

    fn get(handler: &ApiHandler, path: &str, query: Option<&str>) -> (StatusCode, Value) {
        let response = handler.dispatch(&Method::GET, path, query, &[]);
        (
            response.status,
            serde_json::from_slice(&response.body).unwrap(),
        )
    }

    fn create_definition(handler: &ApiHandler) -> Uuid {
        let (status, body) = post(handler, "/api/definitions", &approval_draft());
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    fn start_instance(handler: &ApiHandler, definition_id: Uuid) -> Uuid {
        let (status, body) = post(
            handler,
            "/api/instances",
            &json!({"definition_id": definition_id}),
        );
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[test]
    fn test_health() {
        let handler = test_handler();
        let response = handler.dispatch(&Method::GET, "/health", None, &[]);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"OK");
        assert_eq!(response.content_type, "text/plain");
    }

    #[test]
    fn test_create_definition() {
        let handler = test_handler();
        let (status, body) = post(&handler, "/api/definitions", &approval_draft());

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "document approval");
        assert_eq!(body["states"].as_array().unwrap().len(), 3);
        assert_eq!(body["actions"].as_array().unwrap().len(), 2);
        assert!(body["id"].as_str().unwrap().parse::<Uuid>().is_ok());
    }

    #[test]
    fn test_create_definition_validation_error() {
        let handler = test_handler();
        let (status, body) = post(
            &handler,
            "/api/definitions",
            &json!({"name": "bad", "states": [], "actions": []}),
        );

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("at least one state"));
    }

    #[test]
    fn test_create_definition_malformed_body() {
        let handler = test_handler();
        let response = handler.dispatch(&Method::POST, "/api/definitions", None, b"{not json");
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"]["kind"], "bad_request");
    }

    #[test]
    fn test_get_definition() {
        let handler = test_handler();
        let id = create_definition(&handler);

        let (status, body) = get(&handler, &format!("/api/definitions/{}", id), None);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.to_string());
    }

    #[test]
    fn test_get_unknown_definition() {
        let handler = test_handler();
        let (status, body) = get(
            &handler,
            &format!("/api/definitions/{}", Uuid::new_v4()),
            None,
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }

    #[test]
    fn test_get_definition_bad_id() {
        let handler = test_handler();
        let (status, body) = get(&handler, "/api/definitions/not-a-uuid", None);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "bad_request");
    }

    #[test]
    fn test_list_definitions() {
        let handler = test_handler();
        create_definition(&handler);
        create_definition(&handler);

        let (status, body) = get(&handler, "/api/definitions", None);
        assert_eq!(status, StatusCode::OK);

        let definitions = body["definitions"].as_array().unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0]["state_count"], 3);
        assert_eq!(definitions[0]["action_count"], 2);
    }

    #[test]
    fn test_start_instance() {
        let handler = test_handler();
        let definition_id = create_definition(&handler);

        let (status, body) = post(
            &handler,
            "/api/instances",
            &json!({"definition_id": definition_id}),
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["definition_id"], definition_id.to_string());
        assert_eq!(body["current_state_id"], "draft");
        assert_eq!(body["history"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_start_instance_unknown_definition() {
        let handler = test_handler();
        let (status, body) = post(
            &handler,
            "/api/instances",
            &json!({"definition_id": Uuid::new_v4()}),
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }

    #[test]
    fn test_execute_action_scenario() {
        let handler = test_handler();
        let definition_id = create_definition(&handler);
        let instance_id = start_instance(&handler, definition_id);

        let (status, body) = post(
            &handler,
            &format!("/api/instances/{}/actions/submit", instance_id),
            &json!({}),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_state_id"], "review");
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
        assert_eq!(body["history"][0]["action_id"], "submit");
        assert_eq!(body["history"][0]["from_state_id"], "draft");
        assert_eq!(body["history"][0]["to_state_id"], "review");

        let (status, body) = post(
            &handler,
            &format!("/api/instances/{}/actions/approve", instance_id),
            &json!({}),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_state_id"], "approved");
        assert_eq!(body["history"].as_array().unwrap().len(), 2);

        // Final state: every further action is rejected.
        let (status, body) = post(
            &handler,
            &format!("/api/instances/{}/actions/submit", instance_id),
            &json!({}),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "illegal_operation");
    }

    #[test]
    fn test_execute_unknown_action() {
        let handler = test_handler();
        let definition_id = create_definition(&handler);
        let instance_id = start_instance(&handler, definition_id);

        let (status, body) = post(
            &handler,
            &format!("/api/instances/{}/actions/ghost", instance_id),
            &json!({}),
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
    }

    #[test]
    fn test_get_instance_includes_history() {
        let handler = test_handler();
        let definition_id = create_definition(&handler);
        let instance_id = start_instance(&handler, definition_id);
        post(
            &handler,
            &format!("/api/instances/{}/actions/submit", instance_id),
            &json!({}),
        );

        let (status, body) = get(&handler, &format!("/api/instances/{}", instance_id), None);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_state_id"], "review");
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_list_instances_filters_and_pagination() {
        let handler = test_handler();
        let def_a = create_definition(&handler);
        let def_b = create_definition(&handler);

        for _ in 0..3 {
            start_instance(&handler, def_a);
        }
        let advanced = start_instance(&handler, def_b);
        post(
            &handler,
            &format!("/api/instances/{}/actions/submit", advanced),
            &json!({}),
        );

        // No filters: everything.
        let (status, body) = get(&handler, "/api/instances", None);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        assert_eq!(body["has_more"], false);

        // Filter by definition.
        let (_, body) = get(
            &handler,
            "/api/instances",
            Some(&format!("definition_id={}", def_a)),
        );
        assert_eq!(body["total"], 3);

        // Filter by state.
        let (_, body) = get(&handler, "/api/instances", Some("state=review"));
        assert_eq!(body["total"], 1);
        assert_eq!(body["instances"][0]["id"], advanced.to_string());

        // Pagination.
        let (_, body) = get(&handler, "/api/instances", Some("limit=2&offset=0"));
        assert_eq!(body["instances"].as_array().unwrap().len(), 2);
        assert_eq!(body["total"], 4);
        assert_eq!(body["has_more"], true);

        let (_, body) = get(&handler, "/api/instances", Some("limit=2&offset=2"));
        assert_eq!(body["instances"].as_array().unwrap().len(), 2);
        assert_eq!(body["has_more"], false);
    }

    #[test]
    fn test_list_instances_bad_query() {
        let handler = test_handler();
        let (status, body) = get(&handler, "/api/instances", Some("definition_id=nope"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "bad_request");
    }

    #[test]
    fn test_unknown_route_and_method() {
        let handler = test_handler();

        let (status, body) = get(&handler, "/api/unknown", None);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");

        let response = handler.dispatch(&Method::DELETE, "/api/definitions", None, &[]);
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let definitions = Arc::new(DefinitionStore::new());
        let engine = Arc::new(InstanceEngine::new(definitions.clone()));
        let handler = ApiHandler::new(definitions, engine).with_metrics(metrics.clone());

        post(&handler, "/api/definitions", &approval_draft());
        get(&handler, &format!("/api/definitions/{}", Uuid::new_v4()), None);

        let encoded = String::from_utf8(metrics.encode()).unwrap();
        assert!(encoded.contains("operation=\"create_definition\""));
        assert!(encoded.contains("kind=\"not_found\""));
        assert!(encoded.contains("workflowd_definitions_total 1"));
    }
}
