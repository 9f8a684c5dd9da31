//! Server error types.

use hyper::StatusCode;
use thiserror::Error;
use workflowd_core::{EngineError, ErrorKind};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no route matches the requested path")]
    RouteNotFound,

    #[error("method not allowed for this path")]
    MethodNotAllowed,

    #[error("request body exceeds the configured limit")]
    BodyTooLarge,

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Maps this error to an HTTP status code.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Engine(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Validation | ErrorKind::IllegalOperation => StatusCode::BAD_REQUEST,
            },
            ServerError::InvalidRequest(_) | ServerError::Json(_) => StatusCode::BAD_REQUEST,
            ServerError::RouteNotFound => StatusCode::NOT_FOUND,
            ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Io(_) | ServerError::ShuttingDown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error kind label used in response bodies and metrics.
    pub fn kind_str(&self) -> &'static str {
        match self {
            ServerError::Engine(e) => e.kind().as_str(),
            ServerError::InvalidRequest(_) | ServerError::Json(_) => "bad_request",
            ServerError::RouteNotFound => "not_found",
            ServerError::MethodNotAllowed => "bad_request",
            ServerError::BodyTooLarge => "bad_request",
            ServerError::Io(_) | ServerError::ShuttingDown => "internal",
        }
    }
}
