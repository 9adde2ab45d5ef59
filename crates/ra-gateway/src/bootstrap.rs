//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use ra_domain::config::{Config, ConfigSeverity};
use ra_providers::router::LlmRouter;
use ra_providers::{HttpPageExtractor, PageExtractor, SearchProvider, TavilySearchProvider};
use ra_tools::registry::ToolRegistry;

use crate::broker::SseBroker;
use crate::context::ClarificationRegistry;
use crate::executor::JobExecutor;
use crate::queue::JobQueue;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`]. This is the shared boot path used by `serve` and
/// `config validate`/`config show`.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Workspace root ───────────────────────────────────────────────
    tokio::fs::create_dir_all(&config.workspace.path)
        .await
        .context("creating workspace root")?;
    tokio::fs::create_dir_all(&config.workspace.state_path)
        .await
        .context("creating state directory")?;
    tracing::info!(path = %config.workspace.path.display(), "workspace root ready");

    // ── LLM router ────────────────────────────────────────────────────
    let router = Arc::new(
        LlmRouter::from_config(&config.llm).context("initializing LLM provider registry")?,
    );
    if router.registry().is_empty() {
        tracing::warn!(
            "no LLM providers initialized — jobs will fail at their first reasoning call \
             until provider credentials are configured"
        );
    } else {
        tracing::info!(providers = router.registry().len(), "LLM provider registry ready");
    }

    // ── Search + page extraction providers ───────────────────────────
    let search_cfg = &config.tools.web_search;
    let search_api_key = std::env::var(&search_cfg.api_key_env).unwrap_or_default();
    if search_api_key.is_empty() {
        tracing::warn!(
            env = %search_cfg.api_key_env,
            "web search API key not set — web_search calls will fail at request time"
        );
    }
    let search: Arc<dyn SearchProvider> = Arc::new(
        TavilySearchProvider::new(
            "tavily",
            search_cfg.base_url.as_str(),
            search_api_key,
            search_cfg.timeout_ms,
        )
        .context("constructing search provider")?,
    );
    let extractor: Arc<dyn PageExtractor> = Arc::new(
        HttpPageExtractor::from_config(&config.tools.page_extract)
            .context("constructing page extractor")?,
    );
    tracing::info!("search + page extraction providers ready");

    // ── Tool registry ─────────────────────────────────────────────────
    let tools = Arc::new(ToolRegistry::new());
    ra_tools::register_builtin_tools(
        &tools,
        search,
        extractor,
        search_cfg.results_per_search,
    );
    tracing::info!(tools = tools.list_all().len(), "tool registry ready");

    // ── Job queue ──────────────────────────────────────────────────────
    let queue = Arc::new(JobQueue::new(config.queue.clone()));
    queue.recover().await;
    tracing::info!("job queue ready");

    // ── SSE broker ──────────────────────────────────────────────────────
    let broker = Arc::new(SseBroker::new(config.broker.clone()));
    tracing::info!("SSE broker ready");

    // ── Clarification registry ──────────────────────────────────────────
    let clarifications = Arc::new(ClarificationRegistry::new());

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.admin.token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(env = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    env = %env_var,
                    "API bearer-token auth DISABLED — set the env var to require a bearer token"
                );
                None
            }
        }
    };

    Ok(AppState {
        config,
        router,
        tools,
        queue,
        broker,
        clarifications,
        api_token_hash,
    })
}

/// Spawn the job executor workers and periodic maintenance tasks. Intended
/// to be called once, right after [`build_app_state`], before the HTTP
/// listener starts accepting connections.
pub fn spawn_background_tasks(state: &AppState) {
    let executor = Arc::new(JobExecutor::new(
        state.queue.clone(),
        state.broker.clone(),
        state.clarifications.clone(),
        state.router.clone(),
        state.tools.clone(),
        state.config.agent_loop.clamped(),
        state.config.workspace.path.clone(),
    ));

    let worker_count = state.config.queue.clamped().max_concurrent_jobs;
    for _ in 0..worker_count {
        let executor = executor.clone();
        tokio::spawn(executor.run_forever());
    }
    tracing::info!(workers = worker_count, "job executor workers spawned");

    // ── Periodic job-table snapshot ───────────────────────────────────
    {
        let queue = state.queue.clone();
        let interval_secs = state.config.queue.clamped().persistence_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                queue.snapshot_all().await;
            }
        });
    }

    // ── Periodic cleanup of terminal jobs past their retention window ──
    {
        let queue = state.queue.clone();
        let interval_secs = state.config.queue.clamped().cleanup_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                queue.cleanup_expired().await;
            }
        });
    }
}
