use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jobs::{CancelOutcome, JobManager, JobSummary, StatusView};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub manager: JobManager,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payloads ───────────────────────────────────────

#[derive(Deserialize)]
pub struct RunRequest {
    pub repo_url: String,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct CancelResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: &'static str,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    /// The body extractor refused the request.
    Rejected { status: StatusCode, message: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Rejected { status, message } => (status, message),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/run", post(run_job))
        .route("/status/{job_id}", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}/cancel", post(cancel_job))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn run_job(
    State(state): State<SharedState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(req) = payload?;
    let repo_url = req.repo_url.trim();
    if repo_url.is_empty() {
        return Err(ApiError::BadRequest("repo_url must not be empty".into()));
    }
    let job_id = state.manager.submit(repo_url).await;
    Ok(Json(RunResponse {
        job_id,
        status: "started",
    }))
}

async fn job_status(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Json<StatusView> {
    Json(state.manager.status(&job_id).await)
}

async fn list_jobs(State(state): State<SharedState>) -> Json<Vec<JobSummary>> {
    Json(state.manager.list().await)
}

async fn cancel_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Json<CancelResponse> {
    let not_found = CancelResponse {
        job_id: None,
        status: "not_found",
    };
    let Ok(id) = Uuid::parse_str(&job_id) else {
        return Json(not_found);
    };
    let status = match state.manager.cancel(id).await {
        CancelOutcome::Cancelling => "cancelling",
        CancelOutcome::Finished => "finished",
        CancelOutcome::NotFound => return Json(not_found),
    };
    Json(CancelResponse {
        job_id: Some(id),
        status,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
