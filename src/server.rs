//! Local guard service.
//!
//! Exposes the query sanitizer, the evaluation classifier, and the
//! evaluation dataset over a small JSON HTTP API so that browser frontends
//! and scripts can share one implementation of these rules.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sanitize` | Sanitize a query |
//! | `POST` | `/classify` | Pass/fail and percentages for one sample |
//! | `GET`  | `/eval/data` | Entries of the configured evaluation dataset |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must be a string" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::{format_metrics, MetricPercents, PassThresholds, RagasMetrics, SampleStatus};
use crate::models::EvalDatasetEntry;
use crate::sanitize::Sanitizer;

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    sanitizer: Arc<Sanitizer>,
    thresholds: PassThresholds,
}

/// Build the router without binding a socket.
pub fn router(config: &Config) -> Result<Router> {
    let state = AppState {
        config: Arc::new(config.clone()),
        sanitizer: Arc::new(Sanitizer::from_config(&config.sanitizer)?),
        thresholds: PassThresholds {
            faithfulness: config.eval.min_faithfulness,
            answer_relevance: config.eval.min_answer_relevance,
        },
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/sanitize", post(handle_sanitize))
        .route("/classify", post(handle_classify))
        .route("/eval/data", get(handle_eval_data))
        .layer(cors)
        .with_state(state))
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let app = router(config)?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("guard service listening on http://{}", bind_addr);
    println!("ragdesk server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Unwrap a JSON body; a missing content type or malformed JSON is a
/// `bad_request` rather than axum's plain-text rejection.
fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| bad_request(e.body_text()))
}

fn from_body<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| bad_request(e.to_string()))
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sanitize ============

#[derive(Deserialize)]
struct SanitizeRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct SanitizeResponse {
    query: String,
    sanitized: String,
    /// Input had content but nothing usable survived.
    rejected: bool,
    injection_removed: bool,
    cut_at: Option<String>,
    truncated: bool,
}

async fn handle_sanitize(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SanitizeResponse>, AppError> {
    let body = json_body(payload)?;
    if !matches!(body.get("query"), None | Some(Value::Null) | Some(Value::String(_))) {
        return Err(bad_request("query must be a string"));
    }
    let req: SanitizeRequest = from_body(body)?;
    let raw = req.query.unwrap_or_default();
    let outcome = state.sanitizer.inspect(&raw);
    let rejected = outcome.is_rejected(&raw);
    if rejected {
        warn!("rejected query of {} chars", raw.chars().count());
    }
    Ok(Json(SanitizeResponse {
        rejected,
        injection_removed: outcome.stripped_injection,
        cut_at: outcome.cut_at,
        truncated: outcome.capped,
        sanitized: outcome.text,
        query: raw,
    }))
}

// ============ POST /classify ============

#[derive(Deserialize)]
struct ClassifyRequest {
    #[serde(default)]
    metrics: RagasMetrics,
}

#[derive(Serialize)]
struct ClassifyResponse {
    status: SampleStatus,
    percents: MetricPercents,
}

async fn handle_classify(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let req: ClassifyRequest = from_body(json_body(payload)?)?;
    Ok(Json(ClassifyResponse {
        status: state.thresholds.classify(&req.metrics),
        percents: format_metrics(Some(&req.metrics)),
    }))
}

// ============ GET /eval/data ============

async fn handle_eval_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<EvalDatasetEntry>>, AppError> {
    let path = state
        .config
        .eval
        .dataset
        .as_deref()
        .ok_or_else(|| not_found("no evaluation dataset configured"))?;
    let entries = load_dataset(path)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(entries))
}

/// Read a JSONL dataset, skipping blank lines.
pub async fn load_dataset(path: &Path) -> Result<Vec<EvalDatasetEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read evaluation data: {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("Failed to parse evaluation data at line {}", i + 1))
        })
        .collect()
}
