//! `extract_page` research tool — fetches a previously-seen source's URL in
//! full and attaches the extracted text to its entry in the context's source
//! table.

use std::sync::Arc;

use ra_domain::error::{Error, Result};
use ra_domain::tool::ToolDefinition;
use ra_providers::PageExtractor;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::{ToolContext, ToolExecutor};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "extract_page".into(),
        description: "Fetch the full text of a source previously returned by web_search, identified by its source number.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "source_number": {"type": "integer", "minimum": 1, "description": "The `number` field of a source returned by web_search."}
            },
            "required": ["source_number"]
        }),
        is_system_tool: false,
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    source_number: u32,
}

pub struct ExtractPageExecutor {
    extractor: Arc<dyn PageExtractor>,
}

impl ExtractPageExecutor {
    pub fn new(extractor: Arc<dyn PageExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ExtractPageExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let args: Args = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("extract_page arguments: {e}")))?;

        let source = ctx
            .get_source(args.source_number)
            .ok_or_else(|| Error::ToolError(format!("no source numbered {}", args.source_number)))?;

        let content = self.extractor.extract(&source.url).await?;
        ctx.set_source_content(args.source_number, content.clone());

        let payload = serde_json::json!({
            "source_number": args.source_number,
            "url": source.url,
            "char_count": content.len(),
            "content": content,
        });
        Ok(payload.to_string())
    }
}
