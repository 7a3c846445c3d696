//! Canary gateway server.
//!
//! Loads configuration, bootstraps both model slots from `INITIAL_MODEL_URI`,
//! and serves the HTTP API until SIGINT / SIGTERM.
//!
//! ## Usage
//!
//! ```text
//! canary-gateway [--config gateway.toml]
//! ```
//!
//! ## Environment Variables
//!
//! - `MODEL_REGISTRY_URI`: registry base URL (falls back to `MLFLOW_TRACKING_URI`)
//! - `INITIAL_MODEL_URI`: model loaded at startup; empty disables bootstrap
//! - `CANARY_PROBABILITY`: share of traffic served by `current` (default 1.0)
//! - `LOG_FORMAT=json`: structured JSON output (production)
//! - `RUST_LOG=info`: log level filter

use std::path::PathBuf;
use std::sync::Arc;

use tokio_canary_gateway::config::{loader, ConfigError};
use tokio_canary_gateway::{init_tracing, metrics, web_api, CanaryRouter, UriLoader};
use tracing::{info, warn};

/// Parse the optional `--config <path>` argument.
///
/// # Errors
///
/// [`ConfigError::Usage`] when `--config` is given without a value.
fn parse_config_arg(args: &[String]) -> Result<Option<PathBuf>, ConfigError> {
    for (i, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--config=") {
            return Ok(Some(PathBuf::from(path)));
        }
        if arg == "--config" {
            return match args.get(i + 1) {
                Some(path) => Ok(Some(PathBuf::from(path))),
                None => Err(ConfigError::Usage("--config requires a path".to_string())),
            };
        }
    }
    Ok(None)
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing (JSON or pretty, based on LOG_FORMAT env)
    let _ = init_tracing();
    metrics::init_metrics()?;

    let args: Vec<String> = std::env::args().collect();
    let config_path = parse_config_arg(&args)?;
    let config = loader::load(config_path.as_deref())?;

    info!(
        registry_uri = %config.models.registry_uri,
        initial_model_uri = ?config.models.initial_model_uri(),
        canary_probability = config.models.canary_probability,
        "Starting canary gateway"
    );

    let model_loader = Arc::new(
        UriLoader::new(config.models.registry_uri.clone())
            .with_timeout(config.models.load_timeout()),
    );
    let router = Arc::new(
        CanaryRouter::bootstrap(
            model_loader,
            config.models.initial_model_uri(),
            config.models.canary_probability,
        )
        .await,
    );

    web_api::start_server(config.server, router, shutdown_signal()).await?;
    Ok(())
}
