pub mod auth;
pub mod health;
pub mod jobs;
pub mod sse;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware configured via
/// `config.admin.token_env`).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/ready", get(health::ready));

    let protected = Router::new()
        .route("/v1/jobs", post(jobs::submit_job))
        .route("/v1/jobs", get(jobs::list_jobs))
        .route("/v1/jobs/:id", get(jobs::get_job))
        .route("/v1/jobs/:id", delete(jobs::cancel_job))
        .route("/v1/jobs/:id/clarify", post(jobs::provide_clarification))
        .route("/v1/jobs/:id/events", get(sse::job_events_sse))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
