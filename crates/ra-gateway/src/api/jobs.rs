//! Job lifecycle API endpoints — submit, get, list, cancel, clarify.
//!
//! - `POST   /v1/jobs`               — submit a new job
//! - `GET    /v1/jobs`                — list jobs
//! - `GET    /v1/jobs/:id`            — get job status
//! - `DELETE /v1/jobs/:id`            — cancel a job
//! - `POST   /v1/jobs/:id/clarify`    — provide a pending clarification

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use ra_domain::error::{Error, ErrorKind};
use ra_domain::job::{JobRequest, JobState};

use crate::queue::ListFilter;
use crate::state::AppState;

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct ClarifyRequest {
    pub text: String,
}

/// Render an [`Error`] as the `{"error":{"kind":...,"message":...}}` body
/// shape, mapped to its HTTP status code.
fn error_response(err: Error) -> Response {
    let kind = err.kind();
    let status = status_for_kind(kind);
    (
        status,
        Json(serde_json::json!({
            "error": { "kind": kind, "message": err.to_string() }
        })),
    )
        .into_response()
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotAwaiting => StatusCode::CONFLICT,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::InvalidTool
        | ErrorKind::LlmError
        | ErrorKind::ToolError
        | ErrorKind::Provider
        | ErrorKind::Cancelled
        | ErrorKind::Persistence
        | ErrorKind::Listener
        | ErrorKind::Io
        | ErrorKind::Json
        | ErrorKind::Http
        | ErrorKind::Config
        | ErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn submit_job(State(state): State<AppState>, Json(request): Json<JobRequest>) -> Response {
    match state.queue.submit(request).await {
        Ok(job_id) => {
            state.broker.job_status(job_id, "submitted");
            (StatusCode::CREATED, Json(serde_json::json!({ "job_id": job_id }))).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/jobs/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    match state.queue.get(job_id).await {
        Some(record) => Json(record).into_response(),
        None => error_response(Error::NotFound(job_id.to_string())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_jobs(State(state): State<AppState>, Query(q): Query<ListJobsQuery>) -> Response {
    let status = q.status.as_deref().and_then(parse_job_state);
    let tags: Vec<String> = q
        .tags
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect())
        .unwrap_or_default();

    let result = state
        .queue
        .list(ListFilter {
            status,
            tags,
            limit: q.limit.min(100),
            offset: q.offset,
        })
        .await;

    Json(serde_json::json!({
        "jobs": result.jobs,
        "total": result.total,
        "limit": result.limit,
        "offset": result.offset,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/jobs/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    if state.queue.get(job_id).await.is_none() {
        return error_response(Error::NotFound(job_id.to_string()));
    }
    let cancelled = state.queue.cancel(job_id).await;
    if cancelled {
        state.broker.job_status(job_id, "cancelled");
    }
    Json(serde_json::json!({ "cancelled": cancelled })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/jobs/:id/clarify
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn provide_clarification(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<ClarifyRequest>,
) -> Response {
    let handle = match state.clarifications.get(job_id).await {
        Some(h) => h,
        None => {
            return if state.queue.get(job_id).await.is_some() {
                error_response(Error::NotAwaiting)
            } else {
                error_response(Error::NotFound(job_id.to_string()))
            };
        }
    };

    match handle.provide(body.text).await {
        Ok(()) => Json(serde_json::json!({ "accepted": true })).into_response(),
        Err(e) => error_response(e),
    }
}

fn parse_job_state(s: &str) -> Option<JobState> {
    match s {
        "pending" => Some(JobState::Pending),
        "running" => Some(JobState::Running),
        "completed" => Some(JobState::Completed),
        "failed" => Some(JobState::Failed),
        "cancelled" => Some(JobState::Cancelled),
        _ => None,
    }
}
