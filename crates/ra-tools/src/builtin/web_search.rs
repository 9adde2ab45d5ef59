//! `web_search` research tool — wraps a [`SearchProvider`](ra_providers::SearchProvider),
//! recording the search and its surfaced sources on the calling context.

use std::sync::Arc;

use ra_domain::error::Result;
use ra_domain::tool::ToolDefinition;
use ra_providers::SearchProvider;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::{ToolContext, ToolExecutor};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "web_search".into(),
        description: "Search the web for a query and return a list of relevant sources with short snippets.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."},
                "max_results": {"type": "integer", "minimum": 1, "maximum": 20, "default": 5}
            },
            "required": ["query"]
        }),
        is_system_tool: false,
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    max_results: Option<u32>,
}

pub struct WebSearchExecutor {
    provider: Arc<dyn SearchProvider>,
    default_max_results: u32,
}

impl WebSearchExecutor {
    pub fn new(provider: Arc<dyn SearchProvider>, default_max_results: u32) -> Self {
        Self {
            provider,
            default_max_results,
        }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for WebSearchExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let args: Args = serde_json::from_value(args)
            .map_err(|e| ra_domain::error::Error::Validation(format!("web_search arguments: {e}")))?;
        let max_results = args.max_results.unwrap_or(self.default_max_results);

        let (result, sources) = self.provider.search(&args.query, max_results).await?;

        let mut numbered = Vec::with_capacity(sources.len());
        for source in &sources {
            let number = ctx.insert_source(&source.url, &source.title, &source.snippet);
            numbered.push(serde_json::json!({
                "number": number,
                "url": source.url,
                "title": source.title,
                "snippet": source.snippet,
            }));
        }
        ctx.record_search(result.clone());

        let payload = serde_json::json!({
            "query": result.query,
            "answer": result.answer,
            "sources": numbered,
        });
        Ok(payload.to_string())
    }
}
