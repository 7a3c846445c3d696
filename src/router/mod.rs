//! Canary model router.
//!
//! ## Responsibility
//! Own the two model slots (`current`, `next`), pick one per prediction
//! request, and run the stage / promote lifecycle.
//!
//! ## Guarantees
//! - Readers (`predict`, `health`) load one immutable [`RouterState`]
//!   snapshot through an [`ArcSwap`]; they never take a lock and never see a
//!   slot whose uri and model come from different loads.
//! - Writers (`stage_next`, `promote_next`, `set_canary_probability`)
//!   serialize on a mutex that is held only while the new snapshot is built
//!   and stored, never across a model load.
//! - A write that returns `Ok` is visible to every read that starts after it.
//! - A failed stage leaves the state untouched.
//!
//! ## NOT Responsible For
//! - Parsing HTTP bodies (that belongs to `web_api`)
//! - Fetching or decoding artifacts (that belongs to `model::loader`)

pub mod decision;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::metrics;
use crate::model::{Model, ModelLoader};
use crate::rows::FeatureFrame;
use crate::{GatewayError, RequestFault};

pub use decision::{choose_slot, clamp_probability, SlotName};

/// A loaded model together with the URI it was loaded from.
///
/// Never mutated after construction; replaced wholesale.
pub struct ModelSlot {
    uri: String,
    model: Arc<dyn Model>,
}

impl ModelSlot {
    /// Pair a freshly loaded model with its source URI.
    pub fn new(uri: impl Into<String>, model: Arc<dyn Model>) -> Self {
        Self {
            uri: uri.into(),
            model,
        }
    }

    /// Source URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Loaded model.
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSlot").field("uri", &self.uri).finish()
    }
}

/// One consistent view of both slots and the traffic split.
#[derive(Debug, Clone)]
pub struct RouterState {
    current: Option<Arc<ModelSlot>>,
    next: Option<Arc<ModelSlot>>,
    canary_probability: f64,
}

impl RouterState {
    fn empty(canary_probability: f64) -> Self {
        Self {
            current: None,
            next: None,
            canary_probability,
        }
    }

    /// The production slot, if populated.
    pub fn current(&self) -> Option<&ModelSlot> {
        self.current.as_deref()
    }

    /// The candidate slot, if populated.
    pub fn next(&self) -> Option<&ModelSlot> {
        self.next.as_deref()
    }

    /// Canary probability clamped into `[0, 1]`.
    pub fn canary_probability(&self) -> f64 {
        clamp_probability(self.canary_probability)
    }

    /// `true` once both slots hold a model.
    pub fn is_serving(&self) -> bool {
        self.current.is_some() && self.next.is_some()
    }

    /// URIs of both slots.
    pub fn uris(&self) -> SlotUris {
        SlotUris {
            current_model_uri: self.current.as_ref().map(|s| s.uri.clone()),
            next_model_uri: self.next.as_ref().map(|s| s.uri.clone()),
        }
    }

    /// Health report for this snapshot.
    pub fn health(&self) -> HealthReport {
        let uris = self.uris();
        HealthReport {
            status: "ok".to_string(),
            current_model_loaded: self.current.is_some(),
            next_model_loaded: self.next.is_some(),
            current_model_uri: uris.current_model_uri,
            next_model_uri: uris.next_model_uri,
            canary_probability: self.canary_probability(),
        }
    }
}

/// URIs of both slots, returned by stage and promote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotUris {
    /// URI in the `current` slot.
    pub current_model_uri: Option<String>,
    /// URI in the `next` slot.
    pub next_model_uri: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `"ok"` while the process is up.
    pub status: String,
    /// Whether `current` holds a model.
    pub current_model_loaded: bool,
    /// Whether `next` holds a model.
    pub next_model_loaded: bool,
    /// URI in the `current` slot.
    pub current_model_uri: Option<String>,
    /// URI in the `next` slot.
    pub next_model_uri: Option<String>,
    /// Clamped share of traffic sent to `current`.
    #[serde(rename = "p")]
    pub canary_probability: f64,
}

/// Result of a routed prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Slot that served the request.
    pub used: SlotName,
    /// URI of the model in that slot.
    pub model_uri: String,
    /// Clamped canary probability the decision was made with.
    #[serde(rename = "prob_current")]
    pub canary_probability: f64,
    /// One prediction per input row.
    pub predictions: Vec<Value>,
}

/// Two-slot canary router.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_canary_gateway::{CanaryRouter, UriLoader};
///
/// # async fn example() -> Result<(), tokio_canary_gateway::GatewayError> {
/// let loader = Arc::new(UriLoader::new("http://mlflow:5000"));
/// let router = CanaryRouter::bootstrap(loader, Some("models:/iris-model/1"), 0.9).await;
/// router.stage_next("models:/iris-model/2").await?;
/// let out = router.predict(&serde_json::json!([[5.1, 3.5, 1.4, 0.2]])).await?;
/// println!("{} answered with {:?}", out.used, out.predictions);
/// router.promote_next()?;
/// # Ok(()) }
/// ```
pub struct CanaryRouter {
    state: ArcSwap<RouterState>,
    writer: Mutex<()>,
    loader: Arc<dyn ModelLoader>,
}

impl fmt::Debug for CanaryRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanaryRouter")
            .field("state", &self.state.load_full())
            .finish()
    }
}

impl CanaryRouter {
    /// Create a router with both slots empty.
    pub fn new(loader: Arc<dyn ModelLoader>, canary_probability: f64) -> Self {
        Self {
            state: ArcSwap::from_pointee(RouterState::empty(canary_probability)),
            writer: Mutex::new(()),
            loader,
        }
    }

    /// Create a router and try once to load `initial_uri` into both slots.
    ///
    /// A failed or skipped load leaves both slots empty; the router still
    /// answers health checks and rejects predictions until a model is staged
    /// and promoted.
    pub async fn bootstrap(
        loader: Arc<dyn ModelLoader>,
        initial_uri: Option<&str>,
        canary_probability: f64,
    ) -> Self {
        let router = Self::new(loader, canary_probability);

        let Some(uri) = initial_uri.map(str::trim).filter(|u| !u.is_empty()) else {
            warn!("no initial model configured, starting with empty slots");
            return router;
        };

        match router.loader.load(uri).await {
            Ok(model) => {
                metrics::inc_model_load(true);
                let slot = Arc::new(ModelSlot::new(uri, model));
                router.state.store(Arc::new(RouterState {
                    current: Some(Arc::clone(&slot)),
                    next: Some(slot),
                    canary_probability,
                }));
                info!(model_uri = uri, "loaded initial model into current and next");
            }
            Err(e) => {
                metrics::inc_model_load(false);
                warn!(model_uri = uri, error = %e, "failed to load initial model, starting with empty slots");
            }
        }
        router
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<RouterState> {
        self.state.load_full()
    }

    /// `true` once both slots hold a model.
    pub fn is_serving(&self) -> bool {
        self.state.load().is_serving()
    }

    /// Health report for the current snapshot. Never fails.
    pub fn health(&self) -> HealthReport {
        self.state.load().health()
    }

    /// Route `data` to one slot and score it.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ServiceUnavailable`] if either slot is empty.
    /// - [`GatewayError::PredictionFailed`] if `data` is not tabular or the
    ///   selected model fails. The other slot is never tried.
    pub async fn predict(&self, data: &Value) -> Result<Prediction, GatewayError> {
        self.predict_with_draw(data, decision::draw()).await
    }

    /// [`predict`](Self::predict) with a caller-supplied draw in `[0, 1)`.
    ///
    /// # Errors
    ///
    /// Same as [`predict`](Self::predict).
    pub async fn predict_with_draw(
        &self,
        data: &Value,
        draw: f64,
    ) -> Result<Prediction, GatewayError> {
        let state = self.state.load_full();
        let (Some(current), Some(next)) = (&state.current, &state.next) else {
            return Err(GatewayError::ServiceUnavailable);
        };

        let frame = FeatureFrame::from_json(data)
            .map_err(|e| GatewayError::PredictionFailed(e.to_string()))?;

        let canary_probability = state.canary_probability();
        let used = choose_slot(draw, canary_probability);
        let slot = match used {
            SlotName::Current => current,
            SlotName::Next => next,
        };

        let start = Instant::now();
        let predictions = slot.model.predict(&frame).await.map_err(|e| {
            error!(slot = %used, model_uri = %slot.uri, error = %e, "prediction failed");
            GatewayError::PredictionFailed(e.to_string())
        })?;
        if predictions.len() != frame.len() {
            error!(slot = %used, model_uri = %slot.uri, rows = frame.len(), returned = predictions.len(), "model returned wrong number of predictions");
            return Err(GatewayError::PredictionFailed(format!(
                "model returned {} predictions for {} rows",
                predictions.len(),
                frame.len()
            )));
        }
        metrics::record_predict_latency(used.as_str(), start.elapsed());
        metrics::inc_prediction(used.as_str());

        Ok(Prediction {
            used,
            model_uri: slot.uri.clone(),
            canary_probability,
            predictions,
        })
    }

    /// Load `uri` and install it in the `next` slot.
    ///
    /// The load runs without holding any lock; only the final swap is
    /// serialized with other writers. `current` is never touched.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if `uri` is empty.
    /// - [`GatewayError::LoadFailed`] if the loader rejects `uri`; the state
    ///   is left unchanged.
    pub async fn stage_next(&self, uri: &str) -> Result<SlotUris, GatewayError> {
        if uri.is_empty() {
            return Err(GatewayError::InvalidRequest(RequestFault::MissingModelUri));
        }

        let model = self.loader.load(uri).await.map_err(|e| {
            metrics::inc_model_load(false);
            warn!(model_uri = uri, error = %e, "failed to stage model");
            GatewayError::LoadFailed {
                uri: uri.to_string(),
                details: e.to_string(),
            }
        })?;
        metrics::inc_model_load(true);

        let slot = Arc::new(ModelSlot::new(uri, model));
        let state = self.publish(|old| {
            Ok(RouterState {
                next: Some(slot),
                ..old.clone()
            })
        })?;
        info!(model_uri = uri, "staged model into next");
        Ok(state.uris())
    }

    /// Copy the `next` slot into `current`.
    ///
    /// Idempotent: promoting again without an intervening stage yields the
    /// same state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] if `next` has never been populated.
    pub fn promote_next(&self) -> Result<SlotUris, GatewayError> {
        let state = self.publish(|old| {
            let next = old.next.clone().ok_or(GatewayError::Conflict)?;
            Ok(RouterState {
                current: Some(next),
                ..old.clone()
            })
        })?;
        info!(
            model_uri = state.current().map(ModelSlot::uri),
            "promoted next model to current"
        );
        Ok(state.uris())
    }

    /// Replace the canary probability.
    ///
    /// Finite values are stored as given and clamped on read; the clamped
    /// value is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for NaN or infinite values.
    pub fn set_canary_probability(&self, p: f64) -> Result<f64, GatewayError> {
        if !p.is_finite() {
            return Err(GatewayError::InvalidRequest(RequestFault::InvalidProbability));
        }
        let state = self.publish(|old| {
            Ok(RouterState {
                canary_probability: p,
                ..old.clone()
            })
        })?;
        info!(canary_probability = state.canary_probability(), "canary probability updated");
        Ok(state.canary_probability())
    }

    /// Build and store a new snapshot from the latest one, one writer at a time.
    fn publish<F>(&self, build: F) -> Result<Arc<RouterState>, GatewayError>
    where
        F: FnOnce(&RouterState) -> Result<RouterState, GatewayError>,
    {
        let _guard = self.writer.lock();
        let old = self.state.load_full();
        let new = Arc::new(build(&old)?);
        self.state.store(Arc::clone(&new));
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstantModel, FailingModel, StaticLoader};
    use serde_json::json;
    use std::time::Duration;

    const V1: &str = "models:/iris-model/1";
    const V2: &str = "models:/iris-model/2";
    const BROKEN: &str = "models:/iris-model/broken";

    fn loader() -> StaticLoader {
        StaticLoader::new()
            .with_model(V1, Arc::new(ConstantModel::new(V1)))
            .with_model(V2, Arc::new(ConstantModel::new(V2)))
            .with_model(BROKEN, Arc::new(FailingModel::new("shape mismatch")))
    }

    async fn router(p: f64) -> CanaryRouter {
        CanaryRouter::bootstrap(Arc::new(loader()), Some(V1), p).await
    }

    fn rows(n: usize) -> Value {
        Value::Array(vec![json!([5.1, 3.5, 1.4, 0.2]); n])
    }

    // ── Bootstrap ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_bootstrap_populates_both_slots_with_initial_uri() {
        let r = router(1.0).await;
        let h = r.health();
        assert_eq!(h.status, "ok");
        assert!(h.current_model_loaded && h.next_model_loaded);
        assert_eq!(h.current_model_uri.as_deref(), Some(V1));
        assert_eq!(h.next_model_uri.as_deref(), Some(V1));
        assert_eq!(h.canary_probability, 1.0);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_leaves_both_slots_empty() {
        let r = CanaryRouter::bootstrap(Arc::new(loader()), Some("models:/missing/1"), 1.0).await;
        let h = r.health();
        assert!(!h.current_model_loaded && !h.next_model_loaded);
        assert!(h.current_model_uri.is_none() && h.next_model_uri.is_none());
        assert!(!r.is_serving());
    }

    #[tokio::test]
    async fn test_bootstrap_without_uri_skips_load() {
        let static_loader = Arc::new(loader());
        let r = CanaryRouter::bootstrap(static_loader.clone(), Some("  "), 1.0).await;
        assert!(!r.is_serving());
        assert_eq!(static_loader.load_count(), 0);
    }

    // ── Predict ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_predict_on_empty_router_is_service_unavailable() {
        let r = CanaryRouter::new(Arc::new(loader()), 1.0);
        for _ in 0..10 {
            let err = r.predict(&rows(1)).await.expect_err("must fail");
            assert!(matches!(err, GatewayError::ServiceUnavailable));
        }
    }

    #[tokio::test]
    async fn test_predict_returns_one_prediction_per_row() {
        let r = router(0.5).await;
        let out = r.predict(&rows(7)).await.expect("predict");
        assert_eq!(out.predictions.len(), 7);
        assert_eq!(out.model_uri, V1);
        assert_eq!(out.canary_probability, 0.5);
    }

    #[tokio::test]
    async fn test_probability_one_always_uses_current() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        for _ in 0..200 {
            let out = r.predict(&rows(2)).await.expect("predict");
            assert_eq!(out.used, SlotName::Current);
            assert_eq!(out.model_uri, V1);
        }
    }

    #[tokio::test]
    async fn test_probability_zero_always_uses_next() {
        let r = router(0.0).await;
        r.stage_next(V2).await.expect("stage");
        for _ in 0..200 {
            let out = r.predict(&rows(2)).await.expect("predict");
            assert_eq!(out.used, SlotName::Next);
            assert_eq!(out.model_uri, V2);
        }
    }

    #[tokio::test]
    async fn test_all_rows_scored_by_the_selected_slot() {
        let r = router(0.5).await;
        r.stage_next(V2).await.expect("stage");
        for _ in 0..100 {
            let out = r.predict(&rows(5)).await.expect("predict");
            assert!(out.predictions.iter().all(|p| p == &json!(out.model_uri)));
        }
    }

    #[tokio::test]
    async fn test_draw_on_boundary_selects_next() {
        let r = router(0.3).await;
        r.stage_next(V2).await.expect("stage");
        let out = r.predict_with_draw(&rows(1), 0.3).await.expect("predict");
        assert_eq!(out.used, SlotName::Next);
        let out = r.predict_with_draw(&rows(1), 0.29).await.expect("predict");
        assert_eq!(out.used, SlotName::Current);
    }

    #[tokio::test]
    async fn test_model_failure_is_prediction_failed_without_failover() {
        let r = router(0.0).await;
        r.stage_next(BROKEN).await.expect("stage");
        let err = r.predict(&rows(1)).await.expect_err("must fail");
        match err {
            GatewayError::PredictionFailed(details) => assert!(details.contains("shape mismatch")),
            other => panic!("expected PredictionFailed, got {other:?}"),
        }
        assert_eq!(r.health().next_model_uri.as_deref(), Some(BROKEN));
    }

    #[tokio::test]
    async fn test_non_tabular_data_is_prediction_failed() {
        let r = router(1.0).await;
        let err = r.predict(&json!("not rows")).await.expect_err("must fail");
        assert!(matches!(err, GatewayError::PredictionFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_rows_return_empty_predictions() {
        let r = router(1.0).await;
        let out = r.predict(&json!([])).await.expect("predict");
        assert!(out.predictions.is_empty());
    }

    // ── Stage ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_stage_next_replaces_only_next() {
        let r = router(1.0).await;
        let uris = r.stage_next(V2).await.expect("stage");
        assert_eq!(uris.current_model_uri.as_deref(), Some(V1));
        assert_eq!(uris.next_model_uri.as_deref(), Some(V2));
        let h = r.health();
        assert_eq!(h.current_model_uri.as_deref(), Some(V1));
        assert_eq!(h.next_model_uri.as_deref(), Some(V2));
    }

    #[tokio::test]
    async fn test_stage_next_empty_uri_is_missing_model_uri() {
        let r = router(1.0).await;
        let err = r.stage_next("").await.expect_err("must fail");
        assert!(matches!(
            err,
            GatewayError::InvalidRequest(RequestFault::MissingModelUri)
        ));
    }

    #[tokio::test]
    async fn test_stage_next_whitespace_uri_reaches_loader() {
        let r = router(1.0).await;
        let err = r.stage_next("   ").await.expect_err("must fail");
        assert!(matches!(err, GatewayError::LoadFailed { .. }));
        assert_eq!(r.health().next_model_uri.as_deref(), Some(V1));
    }

    #[tokio::test]
    async fn test_stage_next_load_failure_leaves_next_unchanged() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        let err = r.stage_next("models:/nope/1").await.expect_err("must fail");
        match err {
            GatewayError::LoadFailed { uri, details } => {
                assert_eq!(uri, "models:/nope/1");
                assert!(details.contains("not found"));
            }
            other => panic!("expected LoadFailed, got {other:?}"),
        }
        assert_eq!(r.health().next_model_uri.as_deref(), Some(V2));
        assert_eq!(r.health().current_model_uri.as_deref(), Some(V1));
    }

    #[tokio::test]
    async fn test_stage_after_failed_bootstrap_still_unavailable_until_promote() {
        let r = CanaryRouter::bootstrap(Arc::new(loader()), Some("models:/missing/1"), 1.0).await;
        r.stage_next(V2).await.expect("stage");
        assert!(matches!(
            r.predict(&rows(1)).await,
            Err(GatewayError::ServiceUnavailable)
        ));
        r.promote_next().expect("promote");
        let out = r.predict(&rows(1)).await.expect("predict");
        assert_eq!(out.model_uri, V2);
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_slow_load() {
        let slow = StaticLoader::new()
            .with_model(V1, Arc::new(ConstantModel::new(V1)))
            .with_model(V2, Arc::new(ConstantModel::new(V2)))
            .with_delay(Duration::from_millis(400));
        let r = Arc::new(CanaryRouter::new(Arc::new(slow), 1.0));
        let writer = {
            let r = Arc::clone(&r);
            tokio::spawn(async move { r.stage_next(V2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let health = tokio::time::timeout(Duration::from_millis(50), async { r.health() })
            .await
            .expect("health must not block on a load");
        assert!(!health.next_model_loaded);

        writer.await.expect("join").expect("stage");
        assert_eq!(r.health().next_model_uri.as_deref(), Some(V2));
    }

    // ── Promote ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_promote_copies_next_into_current() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        let uris = r.promote_next().expect("promote");
        assert_eq!(uris.current_model_uri.as_deref(), Some(V2));
        assert_eq!(uris.next_model_uri.as_deref(), Some(V2));
        let out = r.predict(&rows(1)).await.expect("predict");
        assert_eq!(out.predictions, vec![json!(V2)]);
    }

    #[tokio::test]
    async fn test_promote_on_fresh_bootstrap_is_trivial() {
        let r = router(1.0).await;
        let uris = r.promote_next().expect("promote");
        assert_eq!(uris.current_model_uri.as_deref(), Some(V1));
        assert_eq!(uris.next_model_uri.as_deref(), Some(V1));
    }

    #[tokio::test]
    async fn test_promote_without_next_is_conflict() {
        let r = CanaryRouter::new(Arc::new(loader()), 1.0);
        assert!(matches!(r.promote_next(), Err(GatewayError::Conflict)));
        assert!(!r.health().current_model_loaded);
    }

    #[tokio::test]
    async fn test_promote_twice_is_idempotent() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        let first = r.promote_next().expect("promote");
        let h1 = r.health();
        let second = r.promote_next().expect("promote again");
        assert_eq!(first, second);
        assert_eq!(h1, r.health());
    }

    #[tokio::test]
    async fn test_stage_after_promote_does_not_affect_current() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        r.promote_next().expect("promote");
        r.stage_next(V1).await.expect("stage back");
        let h = r.health();
        assert_eq!(h.current_model_uri.as_deref(), Some(V2));
        assert_eq!(h.next_model_uri.as_deref(), Some(V1));
    }

    // ── Canary probability ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_set_canary_probability_is_clamped_on_read() {
        let r = router(1.0).await;
        assert_eq!(r.set_canary_probability(1.5).expect("set"), 1.0);
        assert_eq!(r.set_canary_probability(-2.0).expect("set"), 0.0);
        assert_eq!(r.set_canary_probability(0.25).expect("set"), 0.25);
        assert_eq!(r.health().canary_probability, 0.25);
    }

    #[tokio::test]
    async fn test_set_canary_probability_rejects_non_finite() {
        let r = router(0.7).await;
        for p in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                r.set_canary_probability(p),
                Err(GatewayError::InvalidRequest(RequestFault::InvalidProbability))
            ));
        }
        assert_eq!(r.health().canary_probability, 0.7);
    }

    #[tokio::test]
    async fn test_set_canary_probability_keeps_slots() {
        let r = router(1.0).await;
        r.stage_next(V2).await.expect("stage");
        r.set_canary_probability(0.0).expect("set");
        let out = r.predict(&rows(1)).await.expect("predict");
        assert_eq!(out.used, SlotName::Next);
        assert_eq!(out.model_uri, V2);
    }

    #[test]
    fn test_health_report_serializes_with_wire_names() {
        let report = RouterState::empty(2.0).health();
        let v = serde_json::to_value(&report).expect("ser");
        assert_eq!(
            v,
            json!({
                "status": "ok",
                "current_model_loaded": false,
                "next_model_loaded": false,
                "current_model_uri": null,
                "next_model_uri": null,
                "p": 1.0
            })
        );
    }

    #[test]
    fn test_prediction_serializes_with_wire_names() {
        let p = Prediction {
            used: SlotName::Next,
            model_uri: V2.to_string(),
            canary_probability: 0.9,
            predictions: vec![json!(1)],
        };
        let v = serde_json::to_value(&p).expect("ser");
        assert_eq!(v["used"], "next");
        assert_eq!(v["prob_current"], 0.9);
        assert_eq!(v["model_uri"], V2);
    }
}
