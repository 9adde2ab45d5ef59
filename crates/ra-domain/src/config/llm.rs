use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_20000u")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Startup policy for LLM providers.
    ///
    /// - `allow_none` (default): the gateway boots even if zero providers
    ///   initialize; job submission still succeeds and fails individual
    ///   jobs at the point they need an LLM call.
    /// - `require_one`: abort startup if no providers successfully init.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Backward-compatible alias for `startup_policy = require_one`. Also
    /// honored via the `RESEARCH_AGENT_REQUIRE_LLM` environment variable at runtime.
    #[serde(default)]
    pub require_provider: bool,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Model role assignments (planner/executor/summarizer/embedder), each
    /// naming a primary `"provider_id/model_name"` and optional fallbacks.
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 20_000,
            max_retries: 2,
            startup_policy: LlmStartupPolicy::AllowNone,
            require_provider: false,
            providers: Vec::new(),
            roles: HashMap::new(),
        }
    }
}

/// Controls how the gateway handles LLM provider initialization at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// The gateway boots even if no LLM providers initialize.
    /// Provider init errors are reported in `/v1/providers/readiness`.
    #[default]
    AllowNone,
    /// Abort startup if no LLM providers successfully initialize.
    /// Use for production deployments where LLM access is required.
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

/// The wire protocol a provider speaks. The adapter chosen for each kind:
///
/// - `openai_compat` / `openai_codex_oauth` / `azure_openai` → `OpenAiCompatProvider`
/// - `anthropic` → `AnthropicProvider`
/// - `google` → `GoogleProvider`
/// - `aws_bedrock` → `BedrockProvider` (stub; see its module docs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    OpenaiCodexOauth,
    AzureOpenai,
    Anthropic,
    Google,
    AwsBedrock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name (e.g. "Authorization", "x-api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer `env` or `keychain`).
    #[serde(default)]
    pub key: Option<String>,
    /// Multiple env var names, each resolved to a key and rotated
    /// round-robin by the provider's [`AuthRotator`](crate). Takes
    /// precedence over `env`/`key` when non-empty.
    #[serde(default)]
    pub keys: Vec<String>,
    /// OS keychain service name (used with `mode = "keychain"`).
    #[serde(default)]
    pub service: Option<String>,
    /// OS keychain account name (used with `mode = "keychain"`).
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    QueryParam,
    Keychain,
    None,
}

/// Assigns a model (and fallbacks) to a reasoning role such as `planner`
/// or `executor`. `model` is a `"provider_id/model_name"` spec string.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoleConfig {
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub require_json: bool,
    #[serde(default)]
    pub require_streaming: bool,
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
}

/// A fallback model to try when a role's primary model fails or is
/// unavailable. Checked in order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FallbackConfig {
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub require_json: bool,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_20000u() -> u64 {
    20_000
}
fn d_2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_startup_policy_is_allow_none() {
        assert_eq!(LlmConfig::default().startup_policy, LlmStartupPolicy::AllowNone);
    }

    #[test]
    fn default_has_no_providers() {
        assert!(LlmConfig::default().providers.is_empty());
    }

    #[test]
    fn default_has_no_roles() {
        assert!(LlmConfig::default().roles.is_empty());
    }

    #[test]
    fn provider_config_deserializes() {
        let json = r#"{
            "providers": [
                { "id": "local", "kind": "openai_compat", "base_url": "http://localhost:8000/v1",
                  "auth": { "mode": "api_key", "env": "LOCAL_LLM_KEY" }, "default_model": "gpt-4o-mini" }
            ]
        }"#;
        let config: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].id, "local");
        assert_eq!(config.providers[0].kind, ProviderKind::OpenaiCompat);
        assert_eq!(config.providers[0].auth.env.as_deref(), Some("LOCAL_LLM_KEY"));
    }

    #[test]
    fn auth_mode_defaults_to_api_key() {
        let auth = AuthConfig::default();
        assert_eq!(auth.mode, AuthMode::ApiKey);
    }

    #[test]
    fn all_provider_kinds_deserialize() {
        for (raw, expected) in [
            ("\"openai_compat\"", ProviderKind::OpenaiCompat),
            ("\"openai_codex_oauth\"", ProviderKind::OpenaiCodexOauth),
            ("\"azure_openai\"", ProviderKind::AzureOpenai),
            ("\"anthropic\"", ProviderKind::Anthropic),
            ("\"google\"", ProviderKind::Google),
            ("\"aws_bedrock\"", ProviderKind::AwsBedrock),
        ] {
            let kind: ProviderKind = serde_json::from_str(raw).unwrap();
            assert_eq!(kind, expected);
        }
    }

    #[test]
    fn role_config_deserializes_with_fallbacks() {
        let json = r#"{
            "model": "anthropic/claude-sonnet-4-20250514",
            "require_tools": true,
            "fallbacks": [
                { "model": "openai/gpt-4o", "require_tools": true }
            ]
        }"#;
        let role: RoleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(role.model, "anthropic/claude-sonnet-4-20250514");
        assert!(role.require_tools);
        assert_eq!(role.fallbacks.len(), 1);
        assert_eq!(role.fallbacks[0].model, "openai/gpt-4o");
    }

    #[test]
    fn auth_config_keys_list_defaults_empty() {
        let auth = AuthConfig::default();
        assert!(auth.keys.is_empty());
        assert!(auth.service.is_none());
        assert!(auth.account.is_none());
    }
}
