//! HTTP server implementation.

use crate::error::ServerError;
use crate::handler::ApiHandler;
use crate::metrics::Metrics;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use workflowd_core::{DefinitionStore, InstanceEngine};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("max_connections", &self.max_connections)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7821".parse().unwrap(),
            max_connections: 1024,
            max_body_bytes: 1024 * 1024,
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// HTTP server for workflowd.
pub struct Server {
    config: ServerConfig,
    handler: Arc<ApiHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server over the given catalogs.
    pub fn new(
        config: ServerConfig,
        definitions: Arc<DefinitionStore>,
        engine: Arc<InstanceEngine>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handler = ApiHandler::new(definitions, engine);
        if let Some(ref metrics) = config.metrics {
            handler = handler.with_metrics(metrics.clone());
        }
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the server until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.running.store(true, Ordering::SeqCst);

        tracing::info!("Server listening on http://{}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let config = self.config.clone();

                            tokio::spawn(async move {
                                tracing::debug!("Client connected: {}", addr);
                                let io = TokioIo::new(stream);
                                let service = {
                                    let stats = stats.clone();
                                    let max_body_bytes = config.max_body_bytes;
                                    service_fn(move |req| {
                                        let handler = handler.clone();
                                        let stats = stats.clone();
                                        async move {
                                            handle_request(req, handler, stats, max_body_bytes)
                                                .await
                                        }
                                    })
                                };

                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(ref metrics) = config.metrics {
                                    metrics.connections_active.dec();
                                }
                                tracing::debug!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Handles one HTTP request: reads the body under the configured limit,
/// dispatches, and renders the response.
async fn handle_request(
    req: Request<Incoming>,
    handler: Arc<ApiHandler>,
    stats: Arc<ServerStats>,
    max_body_bytes: usize,
) -> Result<Response<Full<Bytes>>, Infallible> {
    stats.requests_total.fetch_add(1, Ordering::Relaxed);

    let (parts, body) = req.into_parts();

    let api_response = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            handler.dispatch(&parts.method, parts.uri.path(), parts.uri.query(), &bytes)
        }
        Err(e) => {
            let error = if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                ServerError::BodyTooLarge
            } else {
                ServerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
            };
            ApiHandler::error_response(&error)
        }
    };

    if api_response.status.is_client_error() || api_response.status.is_server_error() {
        stats.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    let response = Response::builder()
        .status(api_response.status)
        .header("Content-Type", api_response.content_type)
        .body(Full::new(Bytes::from(api_response.body)))
        .unwrap();

    Ok(response)
}
