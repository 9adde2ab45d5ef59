//! Health and readiness probes. Public, unauthenticated.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness reports whether at least one LLM provider initialized. The
/// gateway still starts with zero providers (jobs just fail at their first
/// reasoning call); this lets an operator distinguish "up" from "usable".
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let ready = !state.router.registry().is_empty();
    Json(serde_json::json!({ "ready": ready }))
}
