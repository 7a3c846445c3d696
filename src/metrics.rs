//! Prometheus metrics for the gateway.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup before serving traffic. The
//! helper functions (`inc_request`, `inc_prediction`, …) are no-ops if
//! `init_metrics` was never called, so the router and HTTP layer are always
//! safe to run; observability simply degrades.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `gateway_requests_total` | Counter | `route` |
//! | `gateway_predictions_total` | Counter | `slot` |
//! | `gateway_errors_total` | Counter | `route`, `code` |
//! | `gateway_predict_duration_seconds` | Histogram | `slot` |
//! | `gateway_model_loads_total` | Counter | `outcome` |

use crate::GatewayError;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

/// All gateway metrics, bundled so they can be stored in a single
/// [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Requests received per route.
    pub requests_total: CounterVec,
    /// Successful predictions per serving slot.
    pub predictions_total: CounterVec,
    /// Failed requests by route and error code.
    pub errors_total: CounterVec,
    /// Model inference latency per serving slot.
    pub predict_duration: HistogramVec,
    /// Model load attempts by outcome (`success` / `failure`).
    pub model_loads: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metric_err(e: prometheus::Error) -> GatewayError {
    GatewayError::Other(format!("metrics init failed: {e}"))
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<CounterVec, GatewayError> {
    let c = CounterVec::new(Opts::new(name, help), labels).map_err(metric_err)?;
    registry.register(Box::new(c.clone())).map_err(metric_err)?;
    Ok(c)
}

impl Metrics {
    /// Build a metrics bundle registered with a fresh private registry.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Other`] if a descriptor is invalid or
    /// registered twice.
    pub fn new() -> Result<Self, GatewayError> {
        let registry = Registry::new();

        let requests_total = counter(
            &registry,
            "gateway_requests_total",
            "Requests received per route",
            &["route"],
        )?;
        let predictions_total = counter(
            &registry,
            "gateway_predictions_total",
            "Successful predictions per serving slot",
            &["slot"],
        )?;
        let errors_total = counter(
            &registry,
            "gateway_errors_total",
            "Failed requests by route and error code",
            &["route", "code"],
        )?;
        let model_loads = counter(
            &registry,
            "gateway_model_loads_total",
            "Model load attempts by outcome",
            &["outcome"],
        )?;

        let predict_duration = HistogramVec::new(
            HistogramOpts::new(
                "gateway_predict_duration_seconds",
                "Model inference duration per serving slot",
            ),
            &["slot"],
        )
        .map_err(metric_err)?;
        registry
            .register(Box::new(predict_duration.clone()))
            .map_err(metric_err)?;

        Ok(Self {
            registry,
            requests_total,
            predictions_total,
            errors_total,
            predict_duration,
            model_loads,
        })
    }
}

/// Initialise the global metrics bundle.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`GatewayError::Other`] if metric construction or registration
/// fails.
pub fn init_metrics() -> Result<(), GatewayError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    // A racing initialiser builds identical descriptors, so losing the race is harmless.
    let _ = METRICS.set(Metrics::new()?);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Increment the request counter for a route. No-op before init.
pub fn inc_request(route: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[route]) {
            c.inc();
        }
    }
}

/// Increment the prediction counter for the slot that served. No-op before init.
pub fn inc_prediction(slot: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.predictions_total.get_metric_with_label_values(&[slot]) {
            c.inc();
        }
    }
}

/// Increment the error counter for a route and error code. No-op before init.
pub fn inc_error(route: &str, code: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.errors_total.get_metric_with_label_values(&[route, code]) {
            c.inc();
        }
    }
}

/// Record inference latency for a slot. No-op before init.
pub fn record_predict_latency(slot: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.predict_duration.get_metric_with_label_values(&[slot]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Count a model load attempt. No-op before init.
pub fn inc_model_load(success: bool) {
    if let Some(m) = metrics() {
        let outcome = if success { "success" } else { "failure" };
        if let Ok(c) = m.model_loads.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
pub fn gather_metrics() -> String {
    metrics().map_or_else(String::new, |m| encode(&m.registry))
}

fn encode(registry: &Registry) -> String {
    let families = registry.gather();
    if families.is_empty() {
        return String::new();
    }
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
