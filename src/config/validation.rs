//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`GatewayConfig`] that cannot be
//! expressed through the type system alone.
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! The initial model URI is deliberately not checked here: a bad bootstrap
//! URI degrades the gateway to empty slots instead of stopping it.

use super::GatewayConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or unparsable value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path or environment variable name.
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Command-line arguments could not be understood.
    #[error("Usage error: {0}")]
    Usage(String),
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate all semantic constraints on a [`GatewayConfig`].
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
pub fn validate(config: &GatewayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let server = &config.server;
    let models = &config.models;

    if server.host.trim().is_empty() {
        errors.push(invalid("server.host", "\"\"", "must not be empty"));
    }
    if server.port == 0 {
        errors.push(invalid("server.port", 0, "must be between 1 and 65535"));
    }
    if server.max_request_size == 0 {
        errors.push(invalid("server.max_request_size", 0, "must be > 0"));
    }

    if !models.canary_probability.is_finite() {
        errors.push(invalid(
            "models.canary_probability",
            models.canary_probability,
            "must be a finite number (values outside [0, 1] are clamped)",
        ));
    }
    if !(models.registry_uri.starts_with("http://") || models.registry_uri.starts_with("https://"))
    {
        errors.push(invalid(
            "models.registry_uri",
            &models.registry_uri,
            "must be an http:// or https:// URL",
        ));
    }
    if models.load_timeout_secs == 0 {
        errors.push(invalid("models.load_timeout_secs", 0, "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
