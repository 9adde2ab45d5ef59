use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools (web_search / page_extract / file_ops)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the built-in research tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub page_extract: PageExtractConfig,
    #[serde(default)]
    pub file_ops: FileOpsConfig,
}

/// Web search tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Results requested per search call.
    #[serde(default = "d_results_per_search")]
    pub results_per_search: u32,
    /// Hard timeout for a single search provider call (ms).
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Base URL of the search provider's HTTP API.
    #[serde(default = "d_search_base_url")]
    pub base_url: String,
    /// Env var holding the provider API key. Resolved at bootstrap, not
    /// here — this struct only names where to look.
    #[serde(default = "d_search_api_key_env")]
    pub api_key_env: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            results_per_search: d_results_per_search(),
            timeout_ms: d_timeout_ms(),
            base_url: d_search_base_url(),
            api_key_env: d_search_api_key_env(),
        }
    }
}

/// Page extraction tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtractConfig {
    /// Maximum characters of extracted page content kept per source.
    #[serde(default = "d_max_chars")]
    pub max_chars: usize,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PageExtractConfig {
    fn default() -> Self {
        Self {
            max_chars: d_max_chars(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

/// Sandboxed file read/write tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOpsConfig {
    /// Maximum bytes a single read/write call may touch.
    #[serde(default = "d_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for FileOpsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: d_max_file_bytes(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_results_per_search() -> u32 {
    5
}
fn d_timeout_ms() -> u64 {
    15_000
}
fn d_max_chars() -> usize {
    20_000
}
fn d_max_file_bytes() -> u64 {
    5_000_000
}
fn d_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn d_search_api_key_env() -> String {
    "TAVILY_API_KEY".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ToolsConfig::default();
        assert_eq!(cfg.web_search.results_per_search, 5);
        assert_eq!(cfg.page_extract.max_chars, 20_000);
        assert_eq!(cfg.file_ops.max_file_bytes, 5_000_000);
        assert_eq!(cfg.web_search.base_url, "https://api.tavily.com");
        assert_eq!(cfg.web_search.api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn web_search_provider_fields_round_trip() {
        let json = r#"{ "web_search": { "base_url": "https://example.test", "api_key_env": "MY_KEY" } }"#;
        let cfg: ToolsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.web_search.base_url, "https://example.test");
        assert_eq!(cfg.web_search.api_key_env, "MY_KEY");
        assert_eq!(cfg.web_search.results_per_search, 5);
    }

    #[test]
    fn deserialize_missing_uses_defaults() {
        let cfg: ToolsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.web_search.timeout_ms, 15_000);
    }

    #[test]
    fn deserialize_overrides() {
        let json = r#"{ "web_search": { "results_per_search": 10, "timeout_ms": 5000 } }"#;
        let cfg: ToolsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.web_search.results_per_search, 10);
        assert_eq!(cfg.web_search.timeout_ms, 5000);
        assert_eq!(cfg.page_extract.max_chars, 20_000);
    }
}
