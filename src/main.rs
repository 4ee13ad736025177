//! # External Secrets Controller
//!
//! Keeps Kubernetes Secrets in sync with external secret stores.
//!
//! ## Usage
//!
//! ```bash
//! external-secrets-controller --metrics-port 5000 --controller-class team-a
//! ```
//!
//! All other settings come from the environment, see `ControllerConfig`.

use anyhow::{Context, Result};
use clap::Parser;
use external_secrets_controller::config::ControllerConfig;
use external_secrets_controller::controller::reconciler::Reconciler;
use external_secrets_controller::runtime::initialization::{
    init_tracing, install_crypto_provider, start_observability,
};
use external_secrets_controller::runtime::watch_loop::run_watch_loop;
use kube::Client;
use std::sync::Arc;
use tracing::info;

/// External Secrets Controller
#[derive(Parser, Debug)]
#[command(name = "external-secrets-controller", version, about, long_about = None)]
struct Args {
    /// Port for the metrics and health server (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Only act on stores with this controller class (overrides CONTROLLER_CLASS)
    #[arg(long)]
    controller_class: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_crypto_provider();

    let args = Args::parse();
    let mut config = ControllerConfig::from_env();
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    if let Some(class) = args.controller_class {
        config.controller_class = class;
    }

    init_tracing(&config)?;
    info!("Starting External Secrets Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(config = ?config, "Loaded controller configuration");

    let server_state = start_observability(&config)?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let reconciler = Arc::new(Reconciler::new(client.clone(), config.clone()));

    run_watch_loop(client, reconciler, server_state, config).await
}
