//! Web search provider abstraction.
//!
//! Mirrors [`crate::traits::LlmProvider`]: a small trait plus one concrete
//! HTTP-backed adapter, so the agent loop can call a generic `web_search`
//! without knowing which backend answers it.

use ra_domain::config::WebSearchConfig;
use ra_domain::error::{Error, Result};
use ra_domain::source::{SearchResult, Source};
use serde_json::Value;

use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One `web_search` backend. Implementations translate a free-text query
/// into a [`SearchResult`] plus the [`Source`] stubs it surfaced (without
/// `full_content` — that's `PageExtractor`'s job).
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search, returning at most `max_results` sources.
    async fn search(&self, query: &str, max_results: u32) -> Result<(SearchResult, Vec<Source>)>;

    /// A unique identifier for this provider instance, for logging.
    fn provider_id(&self) -> &str;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tavily-style HTTP adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A search provider backed by the Tavily search API
/// (`POST {base_url}/search` with an `api_key` body field).
///
/// Other search APIs that accept a `{query, max_results}` JSON body and
/// return a `results: [{url, title, content}]` array can reuse this
/// adapter by pointing `base_url` at a compatible endpoint.
pub struct TavilySearchProvider {
    id: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearchProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from a [`WebSearchConfig`] plus an API key resolved separately
    /// (search providers are not modelled as `ProviderConfig` entries — they
    /// have no model roles — so key resolution happens at the call site).
    pub fn from_config(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        cfg: &WebSearchConfig,
    ) -> Result<Self> {
        Self::new(id, base_url, api_key, cfg.timeout_ms)
    }
}

#[async_trait::async_trait]
impl SearchProvider for TavilySearchProvider {
    async fn search(&self, query: &str, max_results: u32) -> Result<(SearchResult, Vec<Source>)> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "include_answer": true,
        });

        tracing::debug!(provider = %self.id, query = %query, "web search request");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), text),
            });
        }

        let json: Value = serde_json::from_str(&text)?;
        parse_tavily_response(query, &json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

fn parse_tavily_response(query: &str, json: &Value) -> Result<(SearchResult, Vec<Source>)> {
    let answer = json.get("answer").and_then(|v| v.as_str()).map(String::from);

    let items = json.get("results").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut source_urls = Vec::with_capacity(items.len());
    let mut sources = Vec::with_capacity(items.len());

    for item in &items {
        let url = item.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        if url.is_empty() {
            continue;
        }
        let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("untitled").to_string();
        let snippet = item.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        source_urls.push(url.clone());
        // `number` is a placeholder here — the owning Agent Context assigns
        // the real, dense number on `insert_source`.
        sources.push(Source::new(0, url, title, snippet));
    }

    let result = SearchResult {
        query: query.to_string(),
        answer,
        source_urls,
        timestamp: chrono::Utc::now(),
    };

    Ok((result, sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tavily_response_extracts_sources() {
        let json = serde_json::json!({
            "answer": "jazz originated in New Orleans",
            "results": [
                {"url": "https://a.example", "title": "A", "content": "snippet a"},
                {"url": "https://b.example", "title": "B", "content": "snippet b"},
            ]
        });
        let (result, sources) = parse_tavily_response("origin of jazz", &json).unwrap();
        assert_eq!(result.answer.as_deref(), Some("jazz originated in New Orleans"));
        assert_eq!(result.source_urls, vec!["https://a.example", "https://b.example"]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://a.example");
    }

    #[test]
    fn parse_tavily_response_skips_entries_without_url() {
        let json = serde_json::json!({
            "results": [
                {"title": "no url", "content": "x"},
                {"url": "https://ok.example", "title": "ok", "content": "y"},
            ]
        });
        let (result, sources) = parse_tavily_response("q", &json).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(result.source_urls.len(), 1);
    }

    #[test]
    fn parse_tavily_response_handles_missing_answer_and_results() {
        let json = serde_json::json!({});
        let (result, sources) = parse_tavily_response("q", &json).unwrap();
        assert!(result.answer.is_none());
        assert!(sources.is_empty());
    }
}
