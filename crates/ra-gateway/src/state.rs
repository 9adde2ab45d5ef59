//! Shared application state passed to all API handlers.

use std::sync::Arc;

use ra_domain::config::Config;
use ra_providers::router::LlmRouter;
use ra_tools::registry::ToolRegistry;

use crate::broker::SseBroker;
use crate::context::ClarificationRegistry;
use crate::queue::JobQueue;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, LLM router, tool registry
/// - **Job subsystem** — queue, broker, clarification registry
/// - **Security** — API token hash, computed once at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub router: Arc<LlmRouter>,
    pub tools: Arc<ToolRegistry>,

    // ── Job subsystem ─────────────────────────────────────────────────
    pub queue: Arc<JobQueue>,
    pub broker: Arc<SseBroker>,
    pub clarifications: Arc<ClarificationRegistry>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
