//! workflowd - in-memory workflow engine
//!
//! An HTTP service for declaring finite-state-machine workflow definitions
//! and running independent instances of them.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workflowd_core::{DefinitionStore, InstanceEngine};
use workflowd_server::{metrics, Config, Metrics, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if WORKFLOWD_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("WORKFLOWD_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("WORKFLOWD_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            // Otherwise fall back to defaults
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting workflowd server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);
    tracing::info!("  Max body bytes: {}", config.api.max_body_bytes);

    // The two in-memory catalogs; nothing is persisted.
    let definitions = Arc::new(DefinitionStore::new());
    let engine = Arc::new(InstanceEngine::new(definitions.clone()));

    let mut server_config = ServerConfig::new(config.network.bind_addr);
    server_config.max_connections = config.network.max_connections;
    server_config.max_body_bytes = config.api.max_body_bytes;

    // Start metrics server if enabled
    let metrics_handle = if config.metrics.enabled {
        let m = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(m.clone());
        tracing::info!("  Metrics: enabled on {}", config.metrics.bind_addr);

        let (metrics_shutdown_tx, metrics_shutdown_rx) = tokio::sync::broadcast::channel(1);
        let addr = config.metrics.bind_addr;
        let handle = tokio::spawn(async move {
            if let Err(e) = metrics::run_metrics_server(addr, m, metrics_shutdown_rx).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
        Some((metrics_shutdown_tx, handle))
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let server = Arc::new(Server::new(server_config, definitions, engine));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    // Stop the metrics listener
    if let Some((shutdown_tx, handle)) = metrics_handle {
        let _ = shutdown_tx.send(());
        let _ = handle.await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
