//! HTTP front end for the canary router.
//!
//! ## Endpoints
//!
//! - `POST /predict`: Route one request to `current` or `next`
//! - `POST /update-model`: Load a model into `next`
//! - `POST /accept-next-model`: Promote `next` to `current`
//! - `POST /canary-probability`: Change the traffic split
//! - `GET  /health`: Slot status
//! - `GET  /metrics`: Prometheus metrics
//!
//! Every failure is answered with `{"error": <code>}`, plus `"details"` when
//! the cause is worth surfacing (`load_failed`, `prediction_failed`). Bodies
//! are read as raw bytes and parsed here so that readiness is checked before
//! JSON validity, and JSON validity before field presence.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, MatchedPath, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics;
use crate::router::{CanaryRouter, HealthReport, Prediction, SlotUris};
use crate::{GatewayError, RequestFault};

/// `POST` route for predictions.
pub const ROUTE_PREDICT: &str = "/predict";
/// `POST` route that stages a model into `next`.
pub const ROUTE_UPDATE_MODEL: &str = "/update-model";
/// `POST` route that promotes `next` to `current`.
pub const ROUTE_ACCEPT_NEXT: &str = "/accept-next-model";
/// `POST` route that replaces the canary probability.
pub const ROUTE_CANARY_PROBABILITY: &str = "/canary-probability";
/// `GET` route for slot status.
pub const ROUTE_HEALTH: &str = "/health";
/// `GET` route for Prometheus metrics.
pub const ROUTE_METRICS: &str = "/metrics";
/// Metrics label for requests that matched no route.
pub const ROUTE_UNMATCHED: &str = "unmatched";

type SharedRouter = Arc<CanaryRouter>;

// ============================================================================
// Server
// ============================================================================

/// Build the axum application for `router`.
///
/// Exposed separately from [`start_server`] so callers can mount it behind
/// their own listener.
pub fn build_router(router: SharedRouter, config: &ServerConfig) -> Router {
    Router::new()
        .route(ROUTE_PREDICT, post(predict_handler))
        .route(ROUTE_UPDATE_MODEL, post(update_model_handler))
        .route(ROUTE_ACCEPT_NEXT, post(accept_next_handler))
        .route(ROUTE_CANARY_PROBABILITY, post(canary_probability_handler))
        .route(ROUTE_HEALTH, get(health_handler))
        .route(ROUTE_METRICS, get(metrics_handler))
        .layer(DefaultBodyLimit::max(config.max_request_size))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn_with_state(
            config.max_request_size,
            body_size_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(router)
}

/// Bind `config.host:config.port` and serve until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after `shutdown` fires.
///
/// # Errors
///
/// Returns [`GatewayError::Other`] if the address cannot be bound or the
/// server fails.
///
/// # Panics
///
/// This function never panics.
pub async fn start_server<F>(
    config: ServerConfig,
    router: SharedRouter,
    shutdown: F,
) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr();
    let app = build_router(router, &config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Other(format!("failed to bind {addr}: {e}")))?;

    info!("Canary gateway ready on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Other(format!("server error: {e}")))?;

    info!("Canary gateway stopped");
    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

/// Adds a unique `X-Request-ID` header to every response.
///
/// If the client sends an `X-Request-ID` header, it is preserved; otherwise
/// a new UUID v4 is generated.
///
/// # Panics
///
/// This function never panics.
async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Rejects requests whose `Content-Length` exceeds `max_size` with 413.
///
/// Chunked bodies carry no length up front; those are caught by
/// [`DefaultBodyLimit`] when the handler buffers them.
///
/// # Panics
///
/// This function never panics.
async fn body_size_middleware(
    State(max_size): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(content_length) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if content_length > max_size {
            debug!(content_length, max_size, "rejected oversized request");
            return AppError::new(route_label(&req), GatewayError::PayloadTooLarge)
                .into_response();
        }
    }

    next.run(req).await
}

/// Metrics label for `req`: the matched route template, never the raw path.
fn route_label(req: &Request<Body>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map_or_else(|| ROUTE_UNMATCHED.to_string(), |p| p.as_str().to_string())
}

// ============================================================================
// Body parsing
// ============================================================================

/// The buffered body, or the error the client is told about.
fn buffered(body: Result<Bytes, BytesRejection>) -> Result<Bytes, GatewayError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge
        } else {
            debug!(error = %rejection, "failed to read request body");
            GatewayError::InvalidRequest(RequestFault::InvalidBody)
        }
    })
}

fn parse_json(body: &[u8]) -> Result<Value, RequestFault> {
    serde_json::from_slice(body).map_err(|_| RequestFault::InvalidJson)
}

/// `data` from a predict body. A non-object body has no `data` field.
fn predict_input(body: &[u8]) -> Result<Value, RequestFault> {
    let mut payload = parse_json(body)?;
    payload
        .as_object_mut()
        .and_then(|fields| fields.remove("data"))
        .ok_or(RequestFault::MissingData)
}

/// `model_uri` from an update body. Absent, empty, and non-string values
/// are reported as missing. A whitespace-only URI is passed through and
/// fails in the loader.
fn model_uri_input(body: &[u8]) -> Result<String, RequestFault> {
    let payload = parse_json(body)?;
    let fields = payload.as_object().ok_or(RequestFault::InvalidBody)?;
    fields
        .get("model_uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .map(str::to_string)
        .ok_or(RequestFault::MissingModelUri)
}

fn probability_input(body: &[u8]) -> Result<f64, RequestFault> {
    let payload = parse_json(body)?;
    let fields = payload.as_object().ok_or(RequestFault::InvalidBody)?;
    fields
        .get("p")
        .and_then(Value::as_f64)
        .ok_or(RequestFault::InvalidProbability)
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /predict`: Serve one prediction from the slot the draw selects.
///
/// # Panics
///
/// This function never panics.
async fn predict_handler(
    State(router): State<SharedRouter>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Prediction>, AppError> {
    metrics::inc_request(ROUTE_PREDICT);
    let fail = |error: GatewayError| AppError::new(ROUTE_PREDICT, error);

    let body = buffered(body).map_err(fail)?;
    if !router.is_serving() {
        return Err(fail(GatewayError::ServiceUnavailable));
    }
    let data = predict_input(&body).map_err(|f| fail(GatewayError::InvalidRequest(f)))?;

    router.predict(&data).await.map(Json).map_err(fail)
}

/// `POST /update-model`: Load `model_uri` and place it in `next`.
///
/// # Panics
///
/// This function never panics.
async fn update_model_handler(
    State(router): State<SharedRouter>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SlotUris>, AppError> {
    metrics::inc_request(ROUTE_UPDATE_MODEL);
    let fail = |error: GatewayError| AppError::new(ROUTE_UPDATE_MODEL, error);

    let body = buffered(body).map_err(fail)?;
    let uri = model_uri_input(&body).map_err(|f| fail(GatewayError::InvalidRequest(f)))?;
    router.stage_next(&uri).await.map(Json).map_err(fail)
}

/// `POST /accept-next-model`: Promote `next` to `current`. Body ignored.
///
/// # Panics
///
/// This function never panics.
async fn accept_next_handler(
    State(router): State<SharedRouter>,
) -> Result<Json<SlotUris>, AppError> {
    metrics::inc_request(ROUTE_ACCEPT_NEXT);
    router
        .promote_next()
        .map(Json)
        .map_err(|e| AppError::new(ROUTE_ACCEPT_NEXT, e))
}

/// `POST /canary-probability`: Replace `p`; answers with the clamped value.
///
/// # Panics
///
/// This function never panics.
async fn canary_probability_handler(
    State(router): State<SharedRouter>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_request(ROUTE_CANARY_PROBABILITY);
    let fail = |error: GatewayError| AppError::new(ROUTE_CANARY_PROBABILITY, error);

    let body = buffered(body).map_err(fail)?;
    let p = probability_input(&body).map_err(|f| fail(GatewayError::InvalidRequest(f)))?;
    let stored = router.set_canary_probability(p).map_err(fail)?;
    Ok(Json(serde_json::json!({ "p": stored })))
}

/// `GET /health`: Always 200 while the process is up.
///
/// # Panics
///
/// This function never panics.
async fn health_handler(State(router): State<SharedRouter>) -> Json<HealthReport> {
    metrics::inc_request(ROUTE_HEALTH);
    Json(router.health())
}

/// `GET /metrics`: Prometheus metrics endpoint.
///
/// # Panics
///
/// This function never panics.
async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

// ============================================================================
// Error Type
// ============================================================================

/// A [`GatewayError`] tagged with the route that produced it.
///
/// Each variant maps to an HTTP status code and a JSON error body.
#[derive(Debug)]
struct AppError {
    route: Cow<'static, str>,
    error: GatewayError,
}

impl AppError {
    fn new(route: impl Into<Cow<'static, str>>, error: GatewayError) -> Self {
        Self {
            route: route.into(),
            error,
        }
    }
}

/// HTTP status for each error kind.
fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidRequest(_) | GatewayError::LoadFailed { .. } => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Conflict => StatusCode::CONFLICT,
        GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        GatewayError::PredictionFailed(_)
        | GatewayError::ConfigError(_)
        | GatewayError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(error: &GatewayError) -> Value {
    let mut body = Map::new();
    body.insert("error".to_string(), Value::from(error.code()));
    if let Some(details) = error.details() {
        body.insert("details".to_string(), Value::from(details));
    }
    Value::Object(body)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let code = self.error.code();
        let route = self.route.as_ref();
        metrics::inc_error(route, code);

        if self.error.is_client_error() {
            debug!(route, code, error = %self.error, "request rejected");
        } else {
            warn!(route, code, error = %self.error, "request failed");
        }

        (status, Json(error_body(&self.error))).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================
