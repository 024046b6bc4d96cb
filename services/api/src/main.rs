//! HTTP facade over the simulation core: three POST/GET endpoints plus a
//! health probe. Every handler is a thin translation layer — request DTO in,
//! `sim_core::Simulator` call, domain result out — with no simulation logic
//! of its own, mirroring the teacher's dashboard-shim split between
//! transport and the thing actually doing the work.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dto::{ErrorBody, RiskTopQuery, SimulateFailureRequest, SimulateScaleRequest};
use models::{FailureResult, RiskResult, ScalingResult};
use sim_core::config::Config;
use sim_core::error::CoreError;
use sim_core::provider::HttpGraphProvider;
use sim_core::sink::InMemoryDecisionSink;
use sim_core::{FailureRequest, RiskRequest, ScalingRequest, Simulator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
struct AppState {
    simulator: Arc<Simulator>,
    rate_limiter: Arc<RateLimiter>,
}

/// Translates [`CoreError`] into the HTTP surface's status codes and error
/// body (spec.md §7's kinds, mapped 1:1 onto the status a caller should act
/// on).
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.redacted_message();
        let (status, code) = match &self.0 {
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::ProviderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable"),
            CoreError::ProviderTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "provider_timeout"),
            CoreError::ProviderUpstreamError { .. } => (StatusCode::BAD_GATEWAY, "provider_upstream_error"),
            CoreError::DecodeError(_) => (StatusCode::BAD_GATEWAY, "provider_decode_error"),
            CoreError::SimulationTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "simulation_timeout"),
            CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, "internal error");
        } else {
            tracing::warn!(error = %message, code, "request rejected");
        }
        (status, Json(ErrorBody { error: message, code: Some(code.to_string()) })).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let correlation_id = Uuid::new_v4().to_string();
    let provider_detail = match state.simulator.provider.get_health(&correlation_id).await {
        Ok(health) => serde_json::json!({
            "reachable": true,
            "stale": health.stale,
            "lastUpdatedSecondsAgo": health.last_updated_seconds_ago,
        }),
        Err(error) => serde_json::json!({
            "reachable": false,
            "error": error.redacted_message(),
        }),
    };
    Json(serde_json::json!({
        "status": "ok",
        "providerDetail": provider_detail,
    }))
}

async fn simulate_failure(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Json(body): Json<SimulateFailureRequest>,
) -> Result<Json<FailureResult>, ApiError> {
    let raw_service_identifier = body
        .service
        .raw_identifier()
        .ok_or_else(|| CoreError::InvalidInput("one of serviceId or name is required".to_string()))?;

    let result = state
        .simulator
        .simulate_failure(FailureRequest {
            raw_service_identifier,
            max_depth: body.max_depth,
            trace: body.trace,
            correlation_id: correlation_id.0,
        })
        .await?;
    Ok(Json(result))
}

async fn simulate_scale(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Json(body): Json<SimulateScaleRequest>,
) -> Result<Json<ScalingResult>, ApiError> {
    let raw_service_identifier = body
        .service
        .raw_identifier()
        .ok_or_else(|| CoreError::InvalidInput("one of serviceId or name is required".to_string()))?;

    let result = state
        .simulator
        .simulate_scaling(ScalingRequest {
            raw_service_identifier,
            current_pods: body.current_pods,
            new_pods: body.new_pods,
            latency_metric: body.latency_metric,
            model: body.model,
            max_depth: body.max_depth,
            trace: body.trace,
            correlation_id: correlation_id.0,
        })
        .await?;
    Ok(Json(result))
}

async fn risk_top(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Query(query): Query<RiskTopQuery>,
) -> Result<Json<RiskResult>, ApiError> {
    let result = state
        .simulator
        .risk_top(RiskRequest {
            metric: query.metric,
            limit: query.limit,
            trace: query.trace,
            correlation_id: correlation_id.0,
        })
        .await?;
    Ok(Json(result))
}

/// Extracted from the inbound header if present, otherwise generated by
/// [`correlation_id_middleware`] before handlers ever run.
struct CorrelationId(String);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CorrelationId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .extensions
            .get::<CorrelationIdExt>()
            .map(|ext| ext.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(CorrelationId(id))
    }
}

#[derive(Clone)]
struct CorrelationIdExt(String);

async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(CorrelationIdExt(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Fixed-window per-IP request counter. Spec.md §5 names an in-memory
/// rate-limit store as ambient infrastructure the core assumes exists; this
/// is the minimal standalone stand-in so `services/api` is runnable without
/// an external gateway in front of it.
struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<SocketAddr, (Instant, u32)>>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        RateLimiter { max_requests, window, windows: Mutex::new(HashMap::new()) }
    }

    fn allow(&self, addr: SocketAddr) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let entry = windows.entry(addr).or_insert((now, 0));
        if now.duration_since(entry.0) > self.window {
            *entry = (now, 0);
        }
        if entry.1 >= self.max_requests {
            false
        } else {
            entry.1 += 1;
            true
        }
    }
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if state.rate_limiter.allow(addr) {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody { error: "rate limit exceeded".to_string(), code: Some("rate_limited".to_string()) }),
        )
            .into_response()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let provider = Arc::new(HttpGraphProvider::new(
        config.provider_base_url.clone(),
        config.provider_timeout_ms,
    ));
    let sink = Arc::new(InMemoryDecisionSink::new(1_000));
    let port = config.port;
    let simulator = Arc::new(Simulator::new(config, provider, sink));

    let state = AppState {
        simulator,
        rate_limiter: Arc::new(RateLimiter::new(120, Duration::from_secs(60))),
    };

    // Frontend and API live on different origins during local development so
    // we allow every origin/method while prototyping. Tighten before
    // production.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/simulate/failure", post(simulate_failure))
        .route("/simulate/scale", post(simulate_scale))
        .route("/risk/services/top", get(risk_top))
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "api service starting");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %addr, "failed to bind api listener");
            return;
        }
    };

    if let Err(error) =
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
    {
        tracing::error!(%error, "api server exited with error");
    }
}
