//! API authentication middleware.
//!
//! Reads the env var named by `config.admin.token_env` **once at startup**
//! (see [`crate::bootstrap::build_app_state`]) and caches the SHA-256 digest
//! in `AppState`.
//! - If the env var was set and non-empty at startup, every protected
//!   request must carry `Authorization: Bearer <token>`.
//! - If it was unset or empty, the server allows unauthenticated access
//!   (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Axum middleware that enforces bearer-token authentication on protected
/// routes. Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let expected_hash = match &state.api_token_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Hash the provided token to a fixed-length digest, then compare in
    // constant time. This avoids leaking the token length.
    let provided_hash = Sha256::digest(provided.as_bytes());

    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "error": { "kind": "auth", "message": "invalid or missing API token" }
            })),
        )
            .into_response();
    }

    next.run(req).await
}
