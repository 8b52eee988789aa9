use std::env;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use execai_agents::{ExecutiveAgent, MockCalendar};
use execai_core::{parse_busy_spec, DecisionTrace, PipelineConfig, ResolvedRequest, TraceStage};
use execai_llm::{IntentAdapter, OpenAiIntentAdapter};
use execai_observability::{MetricsSnapshot, PipelineMetrics};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub struct ApiState<A> {
    pub agent: Arc<ExecutiveAgent<A>>,
    pub metrics: Arc<PipelineMetrics>,
    pub defaults: PipelineConfig,
    pub llm_configured: bool,
}

impl<A> Clone for ApiState<A> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            metrics: Arc::clone(&self.metrics),
            defaults: self.defaults,
            llm_configured: self.llm_configured,
        }
    }
}

/// Body shared by both pipeline routes. Unset overrides fall back to the
/// server defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssistantRequest {
    pub text: String,
    pub llm_enabled: Option<bool>,
    pub llm_timeout_ms: Option<u64>,
    pub confidence_threshold: Option<f32>,
}

impl AssistantRequest {
    fn config(&self, defaults: PipelineConfig) -> PipelineConfig {
        PipelineConfig::new(
            self.llm_enabled.unwrap_or(defaults.llm_enabled),
            self.llm_timeout_ms.unwrap_or(defaults.llm_timeout_ms),
            self.confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
        )
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    adapter: &'static str,
    llm_configured: bool,
    defaults: PipelineConfig,
    metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
struct ParseIntentResponse {
    resolved: ResolvedRequest,
    trace: DecisionTrace,
}

/// Server wired from the environment: OpenAI adapter (if a key is set), a
/// mock calendar anchored at startup, and `EXECAI_*` defaults. Without
/// `EXECAI_MOCK_BUSY` the calendar carries the mock workday.
pub fn build_app_from_env() -> Result<Router> {
    let adapter = OpenAiIntentAdapter::from_env().context("failed to initialize LLM adapter")?;
    let llm_configured = adapter.is_configured();
    let calendar = match env::var("EXECAI_MOCK_BUSY") {
        Ok(spec) => MockCalendar::starting_now().with_busy(parse_busy_spec(&spec)),
        Err(_) => MockCalendar::starting_now().with_mock_workday(),
    };
    let agent = ExecutiveAgent::with_mock_handlers(Arc::new(adapter), calendar);

    Ok(build_app(
        agent,
        PipelineConfig::from_env(),
        llm_configured,
        &parse_allowed_origins(),
    ))
}

pub fn build_app<A>(
    agent: ExecutiveAgent<A>,
    defaults: PipelineConfig,
    llm_configured: bool,
    allowed_origins: &[String],
) -> Router
where
    A: IntentAdapter + 'static,
{
    let state = ApiState {
        agent: Arc::new(agent),
        metrics: PipelineMetrics::shared(),
        defaults,
        llm_configured,
    };

    Router::new()
        .route("/health", get(health::<A>))
        .route("/v1/parse-intent", post(parse_intent::<A>))
        .route("/v1/assistant", post(assistant::<A>))
        .layer(build_cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health<A>(State(state): State<ApiState<A>>) -> impl IntoResponse
where
    A: IntentAdapter + 'static,
{
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        adapter: state.agent.adapter_name(),
        llm_configured: state.llm_configured,
        defaults: state.defaults,
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn parse_intent<A>(
    State(state): State<ApiState<A>>,
    Json(request): Json<AssistantRequest>,
) -> Response
where
    A: IntentAdapter + 'static,
{
    let text = request.text.trim();
    if text.is_empty() {
        return text_required();
    }

    let started = Instant::now();
    let config = request.config(state.defaults);
    let (resolved, trace) = state.agent.resolve(text, &config).await;
    state.metrics.record_resolution(
        resolved.intent,
        resolved.source,
        trace.has_stage(TraceStage::Fallback),
    );
    state.metrics.observe_latency(started.elapsed());

    (StatusCode::OK, Json(ParseIntentResponse { resolved, trace })).into_response()
}

async fn assistant<A>(
    State(state): State<ApiState<A>>,
    Json(request): Json<AssistantRequest>,
) -> Response
where
    A: IntentAdapter + 'static,
{
    let text = request.text.trim();
    if text.is_empty() {
        return text_required();
    }

    let started = Instant::now();
    let config = request.config(state.defaults);
    let outcome = state.agent.resolve_and_execute(text, &config).await;
    state.metrics.record_outcome(&outcome);
    state.metrics.observe_latency(started.elapsed());
    info!(
        request_id = %outcome.request_id,
        latency_ms = started.elapsed().as_millis() as u64,
        "assistant request served"
    );

    (StatusCode::OK, Json(outcome)).into_response()
}

fn text_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "text_required",
            "message": "Text is required."
        })),
    )
        .into_response()
}

fn parse_allowed_origins() -> Vec<String> {
    let default_origins = [
        "http://localhost:8501",
        "http://127.0.0.1:8501",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    env::var("EXECAI_ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| {
            default_origins
                .iter()
                .map(|value| value.to_string())
                .collect()
        })
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:8501")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
