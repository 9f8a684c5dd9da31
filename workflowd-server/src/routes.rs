//! Route parsing for the HTTP API.

use crate::error::ServerError;
use hyper::Method;
use uuid::Uuid;

/// A resolved API route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /health`
    Health,
    /// `POST /api/definitions`
    CreateDefinition,
    /// `GET /api/definitions`
    ListDefinitions,
    /// `GET /api/definitions/{id}`
    GetDefinition(Uuid),
    /// `POST /api/instances`
    StartInstance,
    /// `GET /api/instances`
    ListInstances,
    /// `GET /api/instances/{id}`
    GetInstance(Uuid),
    /// `POST /api/instances/{id}/actions/{action_id}`
    ExecuteAction(Uuid, String),
}

impl Route {
    /// Resolves a method and path to a route.
    ///
    /// A known path with the wrong method resolves to `MethodNotAllowed`
    /// rather than `RouteNotFound`, and a malformed id in the path is a
    /// plain bad request.
    pub fn resolve(method: &Method, path: &str) -> Result<Self, ServerError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["health"] if *method == Method::GET => Ok(Route::Health),
            ["health"] => Err(ServerError::MethodNotAllowed),

            ["api", "definitions"] if *method == Method::POST => Ok(Route::CreateDefinition),
            ["api", "definitions"] if *method == Method::GET => Ok(Route::ListDefinitions),
            ["api", "definitions"] => Err(ServerError::MethodNotAllowed),

            ["api", "definitions", id] => {
                let id = parse_uuid(id)?;
                if *method == Method::GET {
                    Ok(Route::GetDefinition(id))
                } else {
                    Err(ServerError::MethodNotAllowed)
                }
            }

            ["api", "instances"] if *method == Method::POST => Ok(Route::StartInstance),
            ["api", "instances"] if *method == Method::GET => Ok(Route::ListInstances),
            ["api", "instances"] => Err(ServerError::MethodNotAllowed),

            ["api", "instances", id] => {
                let id = parse_uuid(id)?;
                if *method == Method::GET {
                    Ok(Route::GetInstance(id))
                } else {
                    Err(ServerError::MethodNotAllowed)
                }
            }

            ["api", "instances", id, "actions", action_id] => {
                let id = parse_uuid(id)?;
                if *method == Method::POST {
                    Ok(Route::ExecuteAction(id, action_id.to_string()))
                } else {
                    Err(ServerError::MethodNotAllowed)
                }
            }

            _ => Err(ServerError::RouteNotFound),
        }
    }

    /// Returns the operation label used for metrics and request logs.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::CreateDefinition => "create_definition",
            Route::ListDefinitions => "list_definitions",
            Route::GetDefinition(_) => "get_definition",
            Route::StartInstance => "start_instance",
            Route::ListInstances => "list_instances",
            Route::GetInstance(_) => "get_instance",
            Route::ExecuteAction(_, _) => "execute_action",
        }
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, ServerError> {
    raw.parse()
        .map_err(|_| ServerError::InvalidRequest(format!("invalid id '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_routes() {
        assert_eq!(
            Route::resolve(&Method::POST, "/api/definitions").unwrap(),
            Route::CreateDefinition
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/api/definitions").unwrap(),
            Route::ListDefinitions
        );
        assert_eq!(
            Route::resolve(&Method::POST, "/api/instances").unwrap(),
            Route::StartInstance
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/api/instances").unwrap(),
            Route::ListInstances
        );
        assert_eq!(
            Route::resolve(&Method::GET, "/health").unwrap(),
            Route::Health
        );
    }

    #[test]
    fn test_item_routes() {
        let id = Uuid::new_v4();

        let route = Route::resolve(&Method::GET, &format!("/api/definitions/{}", id)).unwrap();
        assert_eq!(route, Route::GetDefinition(id));

        let route = Route::resolve(&Method::GET, &format!("/api/instances/{}", id)).unwrap();
        assert_eq!(route, Route::GetInstance(id));

        let route =
            Route::resolve(&Method::POST, &format!("/api/instances/{}/actions/submit", id))
                .unwrap();
        assert_eq!(route, Route::ExecuteAction(id, "submit".to_string()));
    }

    #[test]
    fn test_trailing_slash_is_tolerated() {
        assert_eq!(
            Route::resolve(&Method::GET, "/api/definitions/").unwrap(),
            Route::ListDefinitions
        );
    }

    #[test]
    fn test_unknown_route() {
        assert!(matches!(
            Route::resolve(&Method::GET, "/api/unknown"),
            Err(ServerError::RouteNotFound)
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/"),
            Err(ServerError::RouteNotFound)
        ));
    }

    #[test]
    fn test_wrong_method_is_distinguished() {
        assert!(matches!(
            Route::resolve(&Method::DELETE, "/api/definitions"),
            Err(ServerError::MethodNotAllowed)
        ));
        let id = Uuid::new_v4();
        assert!(matches!(
            Route::resolve(&Method::POST, &format!("/api/instances/{}", id)),
            Err(ServerError::MethodNotAllowed)
        ));
    }

    #[test]
    fn test_malformed_id_is_bad_request() {
        assert!(matches!(
            Route::resolve(&Method::GET, "/api/definitions/not-a-uuid"),
            Err(ServerError::InvalidRequest(_))
        ));
    }
}
