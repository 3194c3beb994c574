//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/briefing` | Run one briefing |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! ```json
//! POST /briefing
//! { "topic": "agentic AI in cyber", "mode": "online", "urls": ["https://..."] }
//!
//! 200 OK
//! { "topic": "...", "mode": "online", "answer_md": "# Briefing - ...",
//!   "trace_path": "data/runs/<run_id>.json", "run_id": "<uuid>", "quality_ok": true }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "topic must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400, including malformed JSON bodies),
//! `ingest_failed` (502), `embedding_failed` (502), `generator_failed` (502),
//! `internal` (500).
//!
//! Runs execute on the blocking thread pool; one shared [`Pipeline`] serves
//! concurrent requests.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use research_brief_core::{Pipeline, PipelineError, RunMode, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::build_pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the pipeline from `config` and serve on `[server].bind` until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = config.clone();
    let pipeline = tokio::task::spawn_blocking(move || build_pipeline(&config)).await??;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Briefing server listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server started");

    axum::serve(listener, router(Arc::new(pipeline))).await?;

    Ok(())
}

/// Routes with CORS, over a shared pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/briefing", post(handle_briefing))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
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

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map a failed run to a response. Upstream failures (fetching a URL,
/// embedding chunks, calling the generator) are 502s; anything else is
/// internal.
fn run_error(err: PipelineError) -> AppError {
    let message = format!("{}: {:#}", err, err.source);
    match err.stage {
        Stage::Collect => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "ingest_failed",
            message,
        },
        Stage::Retrieve => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "embedding_failed",
            message,
        },
        Stage::Generate => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "generator_failed",
            message,
        },
        _ => internal(message),
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

// ============ POST /briefing ============

#[derive(Deserialize)]
struct BriefingRequest {
    topic: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    urls: Vec<String>,
}

fn default_mode() -> String {
    RunMode::Offline.as_str().to_string()
}

#[derive(Serialize)]
struct BriefingResponse {
    topic: String,
    mode: RunMode,
    answer_md: String,
    trace_path: String,
    run_id: String,
    quality_ok: bool,
}

async fn handle_briefing(
    State(state): State<AppState>,
    payload: Result<Json<BriefingRequest>, JsonRejection>,
) -> Result<Json<BriefingResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let topic = req.topic.trim().to_string();
    if topic.is_empty() {
        return Err(bad_request("topic must not be empty"));
    }
    let mode: RunMode = req
        .mode
        .parse()
        .map_err(|e: anyhow::Error| bad_request(e.to_string()))?;

    let pipeline = state.pipeline.clone();
    let urls = req.urls;
    let run_topic = topic.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&run_topic, mode, &urls))
        .await
        .map_err(|e| internal(format!("briefing task failed: {}", e)))?;

    let result = outcome.map_err(|e| {
        warn!(stage = %e.stage, run_id = %e.trace.run_id, "briefing request failed");
        run_error(e)
    })?;

    Ok(Json(BriefingResponse {
        topic,
        mode: result.mode,
        quality_ok: result.verdict.is_accept(),
        answer_md: result.answer,
        trace_path: result.trace_location,
        run_id: result.run_id,
    }))
}
