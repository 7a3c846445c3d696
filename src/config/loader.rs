//! Configuration loading.
//!
//! ## Responsibility
//! Read an optional TOML file, overlay environment variables, and validate
//! the result. This is the entry point the binary uses at startup.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O, parse, and bad-variable errors are distinguished in the error type
//! - Environment variables win over file values
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)
//! - Reading `LOG_FORMAT` / `RUST_LOG` (read by `init_tracing`)

use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use super::validation::{self, ConfigError};
use super::GatewayConfig;

/// Registry base URL.
pub const ENV_REGISTRY_URI: &str = "MODEL_REGISTRY_URI";
/// Fallback for [`ENV_REGISTRY_URI`], as set by MLflow tooling.
pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
/// Model loaded into both slots at startup.
pub const ENV_INITIAL_MODEL_URI: &str = "INITIAL_MODEL_URI";
/// Share of traffic served by `current`.
pub const ENV_CANARY_PROBABILITY: &str = "CANARY_PROBABILITY";
/// Registry and artifact fetch timeout in seconds.
pub const ENV_LOAD_TIMEOUT: &str = "MODEL_LOAD_TIMEOUT_SECS";
/// Listener host.
pub const ENV_HOST: &str = "GATEWAY_HOST";
/// Listener port.
pub const ENV_PORT: &str = "GATEWAY_PORT";
/// Maximum request body in bytes.
pub const ENV_MAX_REQUEST_BYTES: &str = "GATEWAY_MAX_REQUEST_BYTES";

/// Build the startup configuration: file (if any), then process environment.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read.
/// - [`ConfigError::Parse`] if the TOML is malformed.
/// - [`ConfigError::Validation`] if semantic constraints are violated.
/// - [`ConfigError::InvalidField`] naming an unparsable environment variable.
///
/// # Panics
///
/// This function never panics.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// [`load`] with an injectable variable lookup.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => parse_file(p)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    check(&config)?;
    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the raw value of a variable, or `None` when unset. A
/// variable set to the empty string counts as set only for
/// `INITIAL_MODEL_URI`, where it disables bootstrap.
///
/// # Errors
///
/// [`ConfigError::InvalidField`] when a numeric variable does not parse.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(uri) = non_empty(ENV_REGISTRY_URI).or_else(|| non_empty(ENV_TRACKING_URI)) {
        config.models.registry_uri = uri.trim().trim_end_matches('/').to_string();
    }
    if let Some(uri) = lookup(ENV_INITIAL_MODEL_URI) {
        config.models.initial_model_uri = Some(uri.trim().to_string());
    }
    if let Some(raw) = non_empty(ENV_CANARY_PROBABILITY) {
        let p: f64 = parse_var(ENV_CANARY_PROBABILITY, &raw)?;
        if p.is_finite() && !(0.0..=1.0).contains(&p) {
            warn!(
                canary_probability = p,
                "CANARY_PROBABILITY outside [0, 1]; it will be clamped"
            );
        }
        config.models.canary_probability = p;
    }
    if let Some(raw) = non_empty(ENV_LOAD_TIMEOUT) {
        config.models.load_timeout_secs = parse_var(ENV_LOAD_TIMEOUT, &raw)?;
    }
    if let Some(host) = non_empty(ENV_HOST) {
        config.server.host = host.trim().to_string();
    }
    if let Some(raw) = non_empty(ENV_PORT) {
        config.server.port = parse_var(ENV_PORT, &raw)?;
    }
    if let Some(raw) = non_empty(ENV_MAX_REQUEST_BYTES) {
        config.server.max_request_size = parse_var(ENV_MAX_REQUEST_BYTES, &raw)?;
    }
    Ok(())
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidField {
        field: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;
    parse_str(&content, &path.display().to_string())
}

fn parse_str(content: &str, source_name: &str) -> Result<GatewayConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })
}

fn check(config: &GatewayConfig) -> Result<(), ConfigError> {
    validation::validate(config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })
}
