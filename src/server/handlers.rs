//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::audio::{is_supported_url, AudioInput};
use crate::classify::ProfileTable;
use crate::error::{AnalysisError, Result};
use crate::pipeline::{ClassificationRequest, ClassificationResult};
use crate::server::AppState;
use crate::types::{MaxDuration, SampleRate};

/// Query parameters of the upload endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ClassifyParams {
    #[serde(default)]
    pub max_duration_minutes: Option<u8>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

/// Request body of the URL endpoint.
#[derive(Debug, Deserialize)]
pub struct ClassifyUrlRequest {
    pub url: String,
    #[serde(default)]
    pub max_duration_minutes: Option<u8>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

fn build_request(
    state: &AppState,
    input: AudioInput,
    max_duration_minutes: Option<u8>,
    sample_rate: Option<u32>,
) -> Result<ClassificationRequest> {
    let max_duration = match max_duration_minutes {
        Some(minutes) => MaxDuration::from_minutes(minutes)?,
        None => state.defaults.max_duration,
    };
    let sample_rate = match sample_rate {
        Some(rate) => SampleRate::new(rate)?,
        None => state.defaults.sample_rate,
    };
    Ok(ClassificationRequest::new(input)
        .with_max_duration(max_duration)
        .with_sample_rate(sample_rate))
}

/// Run one request on its own task under a child cancellation token.
///
/// The token is cancelled if this future is dropped (client gone) or the
/// server shuts down. The concurrency permit lives as long as the task.
async fn dispatch(state: &AppState, request: ClassificationRequest) -> Result<ClassificationResult> {
    let permit = state.limiter.clone().try_acquire_owned().map_err(|_| {
        state.stats.record_rejection();
        error!("Rejected classification request: too many concurrent requests");
        AnalysisError::CapacityExceeded("too many concurrent classification requests".to_string())
    })?;

    let token = state.shutdown.child_token();
    let disconnect_guard = token.clone().drop_guard();
    let pipeline = Arc::clone(&state.pipeline);
    let mut in_flight = state.stats.request_started();

    let task = tokio::spawn(async move {
        let _permit = permit;
        let outcome = pipeline.classify(request, &token).await;
        if outcome.is_ok() {
            in_flight.succeeded();
        }
        outcome
    });

    let outcome = task
        .await
        .map_err(|e| AnalysisError::Internal(format!("classification task failed: {}", e)))?;
    disconnect_guard.disarm();
    outcome
}

/// Classify raw audio bytes.
pub async fn classify_upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClassifyParams>,
    body: Bytes,
) -> Result<Json<ClassificationResult>> {
    let request = build_request(
        &state,
        AudioInput::Bytes(body),
        params.max_duration_minutes,
        params.sample_rate,
    )?;
    dispatch(&state, request).await.map(Json)
}

/// Classify audio fetched from a URL.
pub async fn classify_url(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyUrlRequest>,
) -> Result<Json<ClassificationResult>> {
    let url = body.url.trim().to_string();
    if url.is_empty() {
        return Err(AnalysisError::InvalidRequest("url cannot be empty".to_string()));
    }
    if !is_supported_url(&url) {
        debug!("URL {} is not on a known video host; fetching directly", url);
    }
    let request = build_request(
        &state,
        AudioInput::Remote(url),
        body.max_duration_minutes,
        body.sample_rate,
    )?;
    dispatch(&state, request).await.map(Json)
}

/// The loaded accent profile table.
pub async fn list_profiles(State(state): State<Arc<AppState>>) -> Json<ProfileTable> {
    Json(state.pipeline.profiles().clone())
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let shutting_down = state.shutdown.is_shutting_down();
    let (status, label) = if shutting_down {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "service": "accent-analyzer",
            "version": env!("CARGO_PKG_VERSION"),
            "profiles": state.pipeline.profiles().len(),
            "available_slots": state.limiter.available_permits(),
            "requests": state.stats.to_json(),
        })),
    )
}

/// Prometheus exposition endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(metrics) => metrics.exposition(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/v1/accent/classify", post(classify_upload))
        .route("/v1/accent/classify-url", post(classify_url))
        .route("/v1/accent/profiles", get(list_profiles))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
