//! # workflowd-server
//!
//! HTTP server for workflowd.
//!
//! This crate provides:
//! - An HTTP/1.1 serving loop with graceful shutdown
//! - Route parsing and JSON request dispatch
//! - Request/response body types for the API
//! - Prometheus metrics with a dedicated listener

pub mod config;
pub mod dto;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod routes;
pub mod server;

pub use config::{ApiConfig, Config, ConfigError, MetricsConfig, NetworkConfig};
pub use error::ServerError;
pub use handler::ApiHandler;
pub use metrics::Metrics;
pub use routes::Route;
pub use server::{Server, ServerConfig};
