//! # Gateway Configuration
//!
//! ## Responsibility
//! Describe, load, and validate the gateway's settings. Values come from an
//! optional TOML file, then environment variables override them:
//! ```text
//! canary-gateway --config gateway.toml
//! ```
//!
//! ## Guarantees
//! - Every field has a documented default
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Validation reports every violation at once
//!
//! ## NOT Responsible For
//! - Loading models (that belongs to `model::loader`)
//! - Clamping the canary probability (the router clamps on every read)

pub mod loader;
pub mod validation;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use validation::ConfigError;

// ── Default value functions ──────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Default maximum request body: 10 MiB.
fn default_max_request_size() -> usize {
    10 * 1024 * 1024
}

fn default_registry_uri() -> String {
    "http://mlflow:5000".to_string()
}

fn default_initial_model_uri() -> Option<String> {
    Some("models:/iris-model/1".to_string())
}

/// All traffic to `current` until a canary split is requested.
fn default_canary_probability() -> f64 {
    1.0
}

fn default_load_timeout_secs() -> u64 {
    30
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration.
///
/// # Example
///
/// ```toml
/// [server]
/// port = 8000
///
/// [models]
/// registry_uri = "http://mlflow:5000"
/// initial_model_uri = "models:/iris-model/1"
/// canary_probability = 0.9
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Model registry and routing settings.
    #[serde(default)]
    pub models: ModelsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address or hostname to bind to (e.g. `"0.0.0.0"` for all interfaces).
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum allowed request body size in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model registry and routing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    /// Base URL of the model registry used to resolve `models:/` URIs.
    #[serde(default = "default_registry_uri")]
    pub registry_uri: String,
    /// URI loaded into both slots at startup. `None` or empty skips bootstrap.
    #[serde(default = "default_initial_model_uri")]
    pub initial_model_uri: Option<String>,
    /// Share of traffic sent to `current`. Clamped into `[0, 1]` on read.
    #[serde(default = "default_canary_probability")]
    pub canary_probability: f64,
    /// Per-request timeout for registry and artifact fetches, in seconds.
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            registry_uri: default_registry_uri(),
            initial_model_uri: default_initial_model_uri(),
            canary_probability: default_canary_probability(),
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

impl ModelsConfig {
    /// The bootstrap URI, or `None` when unset or blank.
    pub fn initial_model_uri(&self) -> Option<&str> {
        self.initial_model_uri
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Load timeout as a [`Duration`].
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}
