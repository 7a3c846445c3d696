//! # tokio-canary-gateway
//!
//! A model-serving gateway that keeps two model slots warm and splits
//! prediction traffic between them.
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────── POST /predict ────────────┐
//!  client ──▶ │ snapshot ─▶ draw r ─▶ r < p ? current : next ─▶ Model::predict
//!             └───────────────────────────────────────┘
//!  operator ─▶ POST /update-model      ─▶ ModelLoader::load ─▶ swap `next`
//!  operator ─▶ POST /accept-next-model ─▶ copy `next` into `current`
//! ```
//!
//! The slots live in a single immutable [`router::RouterState`] snapshot that
//! is replaced wholesale on every write, so readers never observe a torn
//! slot and never wait on a model load.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use std::fmt;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod metrics;
pub mod model;
pub mod router;
pub mod rows;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports for convenience
pub use model::{
    ConstantModel, FailingModel, LinearModel, Model, ModelError, ModelLoader, StaticLoader,
    UriLoader,
};
pub use router::{CanaryRouter, HealthReport, Prediction, RouterState, SlotName, SlotUris};
pub use rows::{FeatureFrame, FeatureRow, FrameError};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`GatewayError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Example
///
/// ```no_run
/// # use tokio_canary_gateway::{init_tracing, GatewayError};
/// # fn example() -> Result<(), GatewayError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), GatewayError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| GatewayError::Other(format!("tracing init failed: {e}")))
}

/// A client-side input fault, carrying the exact wire code reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFault {
    /// The body is not valid JSON.
    InvalidJson,
    /// The body is JSON but not an object.
    InvalidBody,
    /// `POST /predict` without a `data` field.
    MissingData,
    /// `POST /update-model` without a non-empty `model_uri`.
    MissingModelUri,
    /// A canary probability that is absent, non-numeric, or not finite.
    InvalidProbability,
}

impl RequestFault {
    /// Stable error code used in JSON error bodies.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::InvalidBody => "invalid_body",
            Self::MissingData => "missing_field:data",
            Self::MissingModelUri => "missing_model_uri",
            Self::InvalidProbability => "invalid_probability",
        }
    }
}

impl fmt::Display for RequestFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Top-level gateway errors.
///
/// Every router operation fails with one of these variants, and the HTTP
/// layer maps each variant to a status code plus the string returned by
/// [`GatewayError::code`].
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed or missing client input.
    #[error("invalid request: {0}")]
    InvalidRequest(RequestFault),

    /// At least one model slot has never been populated.
    #[error("model not loaded")]
    ServiceUnavailable,

    /// The model loader rejected a URI. `next` is left untouched.
    #[error("failed to load model '{uri}': {details}")]
    LoadFailed {
        /// The URI that failed to load.
        uri: String,
        /// Loader-provided cause.
        details: String,
    },

    /// The selected model failed while scoring the request.
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    /// Promotion was requested but no candidate has been staged.
    #[error("no next model to promote")]
    Conflict,

    /// The request body exceeds the configured size limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(fault) => fault.code(),
            Self::ServiceUnavailable => "model_not_loaded",
            Self::LoadFailed { .. } => "load_failed",
            Self::PredictionFailed(_) => "prediction_failed",
            Self::Conflict => "no_next_model",
            Self::PayloadTooLarge => "payload_too_large",
            Self::ConfigError(_) => "config_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// Optional cause detail surfaced next to the code.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::LoadFailed { details, .. } => Some(details),
            Self::PredictionFailed(details) => Some(details),
            _ => None,
        }
    }

    /// `true` when the fault lies with the caller rather than the gateway.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::LoadFailed { .. }
                | Self::Conflict
                | Self::PayloadTooLarge
        )
    }
}
