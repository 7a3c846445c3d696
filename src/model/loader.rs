//! Model loaders.
//!
//! ## Responsibility
//! Resolve a model URI to a loaded [`Model`]:
//! - `models:/<name>/<version>` and `models:/<name>/<alias>` via the model
//!   registry REST API
//! - `http://…` / `https://…` fetched directly
//! - `file://…` or a bare path read from disk
//!
//! Directory-like locations get `model.json` appended; locations ending in
//! `.json` are used as-is.
//!
//! ## NOT Responsible For
//! - Deciding which slot a loaded model goes into (that belongs to `router`)
//! - Caching loaded models across calls

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{LinearModel, Model, ModelError, ModelLoader};

/// Artifact file name appended to directory-like locations.
const ARTIFACT_FILE: &str = "model.json";

/// A parsed model URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUri {
    /// `models:/<name>/<reference>` where reference is a version or alias.
    Registry {
        /// Registered model name.
        name: String,
        /// Numeric version or alias.
        reference: String,
    },
    /// Direct `http(s)` location.
    Http(String),
    /// Local filesystem path.
    File(String),
}

impl ModelUri {
    /// Parse a URI string.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedUri`] for malformed `models:/` URIs
    /// and for schemes other than `models`, `http`, `https` and `file`.
    pub fn parse(uri: &str) -> Result<Self, ModelError> {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix("models:/") {
            let mut parts = rest.trim_matches('/').split('/');
            return match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(reference), None) if !name.is_empty() && !reference.is_empty() => {
                    Ok(Self::Registry {
                        name: name.to_string(),
                        reference: reference.to_string(),
                    })
                }
                _ => Err(ModelError::UnsupportedUri(uri.to_string())),
            };
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(Self::Http(uri.to_string()));
        }
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(Self::File(path.to_string()));
        }
        if uri.is_empty() || uri.contains("://") {
            return Err(ModelError::UnsupportedUri(uri.to_string()));
        }
        Ok(Self::File(uri.to_string()))
    }
}

fn artifact_location(location: &str) -> String {
    if location.ends_with(".json") {
        location.to_string()
    } else {
        format!("{}/{ARTIFACT_FILE}", location.trim_end_matches('/'))
    }
}

// ============================================================================
// URI Loader
// ============================================================================

#[derive(Debug, Deserialize)]
struct DownloadUriResponse {
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct AliasResponse {
    model_version: AliasVersion,
}

#[derive(Debug, Deserialize)]
struct AliasVersion {
    version: String,
}

/// Production loader that dispatches on the URI scheme.
///
/// Registry URIs are resolved against `registry_uri` with the MLflow-style
/// REST API:
/// - `GET /api/2.0/mlflow/registered-models/alias?name=&alias=` (aliases only)
/// - `GET /api/2.0/mlflow/model-versions/get-download-uri?name=&version=`
///
/// An `mlflow-artifacts:/<path>` download location is fetched through the
/// registry's artifact proxy.
///
/// ## Example
///
/// ```no_run
/// use std::time::Duration;
/// use tokio_canary_gateway::{ModelLoader, UriLoader};
///
/// # async fn example() -> Result<(), tokio_canary_gateway::ModelError> {
/// let loader = UriLoader::new("http://mlflow:5000").with_timeout(Duration::from_secs(10));
/// let model = loader.load("models:/iris-model/2").await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct UriLoader {
    client: reqwest::Client,
    registry_uri: String,
    timeout: Duration,
}

impl UriLoader {
    /// Create a loader resolving `models:/` URIs against `registry_uri`.
    pub fn new(registry_uri: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry_uri: registry_uri.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ModelError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ModelError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ModelError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Registry(format!("{url} returned {status}: {body}")));
        }
        Ok(response)
    }

    async fn resolve_version(&self, name: &str, reference: &str) -> Result<String, ModelError> {
        if reference.chars().all(|c| c.is_ascii_digit()) {
            return Ok(reference.to_string());
        }
        let url = format!("{}/api/2.0/mlflow/registered-models/alias", self.registry_uri);
        let body: AliasResponse = self
            .get(&url, &[("name", name), ("alias", reference)])
            .await?
            .json()
            .await
            .map_err(|e| ModelError::Registry(format!("malformed alias response: {e}")))?;
        Ok(body.model_version.version)
    }

    async fn resolve_registry(&self, name: &str, reference: &str) -> Result<String, ModelError> {
        let version = self.resolve_version(name, reference).await?;
        let url = format!(
            "{}/api/2.0/mlflow/model-versions/get-download-uri",
            self.registry_uri
        );
        let body: DownloadUriResponse = self
            .get(&url, &[("name", name), ("version", version.as_str())])
            .await?
            .json()
            .await
            .map_err(|e| ModelError::Registry(format!("malformed download-uri response: {e}")))?;
        debug!(name, version = %version, artifact_uri = %body.artifact_uri, "resolved registry model");

        if let Some(path) = body.artifact_uri.strip_prefix("mlflow-artifacts:/") {
            return Ok(format!(
                "{}/api/2.0/mlflow-artifacts/artifacts/{}",
                self.registry_uri,
                path.trim_start_matches('/')
            ));
        }
        Ok(body.artifact_uri)
    }

    async fn fetch_http(&self, url: &str) -> Result<LinearModel, ModelError> {
        let bytes = self
            .get(url, &[])
            .await?
            .bytes()
            .await
            .map_err(|e| ModelError::Http {
                url: url.to_string(),
                source: e,
            })?;
        LinearModel::from_slice(&bytes)
    }

    async fn read_file(&self, path: &str) -> Result<LinearModel, ModelError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ModelError::NotFound(path.to_string())
            } else {
                ModelError::Io {
                    path: path.to_string(),
                    source: e,
                }
            }
        })?;
        LinearModel::from_slice(&bytes)
    }

    async fn load_location(&self, location: &str) -> Result<LinearModel, ModelError> {
        match ModelUri::parse(location)? {
            ModelUri::Http(url) => self.fetch_http(&artifact_location(&url)).await,
            ModelUri::File(path) => self.read_file(&artifact_location(&path)).await,
            ModelUri::Registry { .. } => Err(ModelError::Registry(format!(
                "registry resolved to another registry uri '{location}'"
            ))),
        }
    }
}

#[async_trait]
impl ModelLoader for UriLoader {
    async fn load(&self, uri: &str) -> Result<Arc<dyn Model>, ModelError> {
        let location = match ModelUri::parse(uri)? {
            ModelUri::Registry { name, reference } => {
                self.resolve_registry(&name, &reference).await?
            }
            ModelUri::Http(url) => url,
            ModelUri::File(path) => path,
        };
        let model = self.load_location(&location).await?;
        Ok(Arc::new(model))
    }
}

// ============================================================================
// Static Loader (Testing)
// ============================================================================

/// In-memory loader mapping URIs to pre-built models.
///
/// Unknown URIs fail with [`ModelError::NotFound`]. Useful for demos and
/// tests that need to stage and promote without a registry.
#[derive(Default)]
pub struct StaticLoader {
    models: HashMap<String, Arc<dyn Model>>,
    delay: Duration,
    loads: AtomicUsize,
}

impl StaticLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under `uri`.
    pub fn with_model(mut self, uri: impl Into<String>, model: Arc<dyn Model>) -> Self {
        self.models.insert(uri.into(), model);
        self
    }

    /// Simulate slow loads (registry latency, large artifacts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `load` calls made so far, successful or not.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelLoader for StaticLoader {
    async fn load(&self, uri: &str) -> Result<Arc<dyn Model>, ModelError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.models
            .get(uri)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(uri.to_string()))
    }
}
