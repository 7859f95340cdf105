use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use fitcrew_core::pipeline::{FailureKind, Pipeline, PipelineError};
use fitcrew_core::schema::{FinalPlan, PlanRequest, SchemaError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ViolationBody {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    kind: Option<FailureKind>,
    retryable: bool,
    violations: Vec<ViolationBody>,
}

impl AppError {
    /// The request body could not be read as a plan request.
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
            kind: None,
            retryable: false,
            violations: Vec::new(),
        }
    }

    /// The plan request has missing or out-of-range fields.
    pub fn invalid_request(err: &SchemaError) -> Self {
        Self {
            violations: err
                .violations
                .iter()
                .map(|v| ViolationBody {
                    field: v.path.to_string(),
                    message: v.to_string(),
                })
                .collect(),
            ..Self::unprocessable("invalid plan request")
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
            kind: Some(err.kind()),
            retryable: err.is_retryable(),
            violations: Vec::new(),
        }
    }
}

/// HTTP status for a pipeline failure.
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err.kind() {
        FailureKind::Orchestration
        | FailureKind::Extraction
        | FailureKind::MalformedJson
        | FailureKind::SchemaViolation => StatusCode::INTERNAL_SERVER_ERROR,
        FailureKind::UpstreamUnavailable => match err.upstream() {
            Some(upstream) if upstream.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        },
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let mut body = serde_json::json!({ "error": self.message });
        if let Some(kind) = self.kind {
            body["kind"] = serde_json::json!(kind.as_str());
            body["retryable"] = serde_json::json!(self.retryable);
        }
        if self.status == StatusCode::UNPROCESSABLE_ENTITY {
            body["violations"] = serde_json::json!(self.violations);
        }
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate-plan", post(generate_plan))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pipeline: Pipeline, bind: &str, port: u16) -> Result<()> {
    let app = build_router(Arc::new(pipeline));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("fitcrew serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("fitcrew serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "fitcrew plan service is running" }))
}

async fn generate_plan(
    State(pipeline): State<Arc<Pipeline>>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<FinalPlan>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::info!(error = %rejection.body_text(), "rejected plan request body");
        AppError::unprocessable(rejection.body_text())
    })?;
    let profile = request.into_profile().map_err(|e| {
        tracing::info!(violations = e.violations.len(), "rejected invalid plan request");
        AppError::invalid_request(&e)
    })?;

    // Dropping this future (client gone) drops the run with it.
    let plan = pipeline
        .generate_plan(&profile, CancellationToken::new())
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            tracing::warn!(status = %err.status(), error = %err.message, "plan request failed");
            err
        })?;
    Ok(Json(plan))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
