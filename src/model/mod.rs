//! Model and model-loader abstractions.
//!
//! The router depends only on the two traits defined here:
//! - [`Model`] scores a [`FeatureFrame`] and returns one prediction per row.
//! - [`ModelLoader`] turns a URI into a ready-to-serve [`Model`].
//!
//! Provided implementations:
//! - [`LinearModel`]: linear regressor / classifier read from a JSON artifact
//! - [`UriLoader`]: resolves `models:/`, `http(s)://`, `file://` and bare paths
//! - [`StaticLoader`], [`ConstantModel`], [`FailingModel`]: demos and tests
//!
//! ## Environment Variables
//!
//! - `MODEL_REGISTRY_URI`: registry base URL used by [`UriLoader`] for
//!   `models:/` URIs (see [`crate::config`])

pub mod linear;
pub mod loader;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::rows::FeatureFrame;

pub use linear::LinearModel;
pub use loader::{ModelUri, StaticLoader, UriLoader};

/// Trait for loaded, ready-to-serve models.
///
/// Implementations must be thread-safe (Send + Sync); the router shares one
/// instance across every request routed to its slot. The trait is
/// object-safe to allow dynamic dispatch via `Arc<dyn Model>`.
#[async_trait]
pub trait Model: Send + Sync {
    /// Score every row of `frame`.
    ///
    /// Must return exactly one prediction per row, in row order, or fail the
    /// whole call.
    async fn predict(&self, frame: &FeatureFrame) -> Result<Vec<Value>, ModelError>;
}

/// Trait for turning a model URI into a loaded [`Model`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model identified by `uri`.
    async fn load(&self, uri: &str) -> Result<Arc<dyn Model>, ModelError>;
}

/// Errors raised while loading a model or scoring rows.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The URI scheme is not one the loader understands.
    #[error("unsupported model uri '{0}'")]
    UnsupportedUri(String),

    /// The registry or artifact store has no model at this location.
    #[error("model not found: {0}")]
    NotFound(String),

    /// The registry answered with an unexpected status or body.
    #[error("registry error: {0}")]
    Registry(String),

    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("http request to {url} failed: {source}")]
    Http {
        /// URL that was requested.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// A local artifact could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact parsed but describes an unusable model.
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// A row has the wrong number of features.
    #[error("row {row}: expected {expected} features, got {found}")]
    Shape {
        /// Row index within the request.
        row: usize,
        /// Width the model was trained on.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// A feature value is not numeric.
    #[error("row {row}: feature '{feature}' is not numeric")]
    FeatureType {
        /// Row index within the request.
        row: usize,
        /// Feature name or positional index.
        feature: String,
    },

    /// A named row lacks a feature the model needs.
    #[error("row {row}: missing feature '{feature}'")]
    MissingFeature {
        /// Row index within the request.
        row: usize,
        /// Name of the missing feature.
        feature: String,
    },

    /// A named row was sent to a model that has no feature names.
    #[error("row {row}: model has no feature names, send rows as sequences")]
    UnnamedFeatures {
        /// Row index within the request.
        row: usize,
    },

    /// Generic inference failure.
    #[error("{0}")]
    Inference(String),
}

// ============================================================================
// Constant Model (Testing)
// ============================================================================

/// Model that answers every row with the same value.
///
/// Useful for smoke tests and canary demos: give each version a distinct
/// value and the predictions show which slot answered.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    value: Value,
    delay: Duration,
}

impl ConstantModel {
    /// Create a model that predicts `value` for every row.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            delay: Duration::ZERO,
        }
    }

    /// Simulate inference latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Model for ConstantModel {
    async fn predict(&self, frame: &FeatureFrame) -> Result<Vec<Value>, ModelError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![self.value.clone(); frame.len()])
    }
}

/// Model whose every call fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingModel {
    message: String,
}

impl FailingModel {
    /// Create a model that always fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Model for FailingModel {
    async fn predict(&self, _frame: &FeatureFrame) -> Result<Vec<Value>, ModelError> {
        Err(ModelError::Inference(self.message.clone()))
    }
}
