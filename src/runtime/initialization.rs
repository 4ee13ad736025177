//! # Initialization
//!
//! Process-level setup for the controller binary: rustls, tracing, metrics and
//! the health and metrics server.

use crate::config::ControllerConfig;
use crate::observability;
use crate::runtime::server::{start_server, ServerState};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install ring as the process-wide rustls crypto provider
///
/// Needed once before any TLS connection (Kubernetes API, Vault, AWS). Repeated
/// calls are harmless.
pub fn install_crypto_provider() {
    // Err means a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
///
/// # Errors
///
/// A subscriber is already installed.
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "external_secrets_controller={}",
            config.log_level.to_lowercase()
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

/// Register metrics and start the health and metrics server in the background
///
/// The returned state starts not-ready; the watch loop flips it once running.
///
/// # Errors
///
/// Metrics registration failed.
pub fn start_observability(config: &ControllerConfig) -> Result<Arc<ServerState>> {
    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let port = config.metrics_port;
    let state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!(port, "Health and metrics server started");
    Ok(server_state)
}
