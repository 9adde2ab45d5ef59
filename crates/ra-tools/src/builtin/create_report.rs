//! `create_report` research tool — renders the accumulated sources into a
//! Markdown report file inside the job workspace, citing sources by their
//! stable number.

use ra_domain::error::{Error, Result};
use ra_domain::tool::ToolDefinition;
use serde::Deserialize;
use serde_json::Value;

use crate::file_ops::{self, FileWriteRequest};
use crate::registry::{ToolContext, ToolExecutor};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "create_report".into(),
        description: "Write the current findings to a Markdown report file in the job workspace, with numbered source citations.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "report.md"},
                "title": {"type": "string"},
                "body": {"type": "string", "description": "Markdown body; cite sources as [n]."}
            },
            "required": ["title", "body"]
        }),
        is_system_tool: false,
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default = "default_path")]
    path: String,
    title: String,
    body: String,
}

fn default_path() -> String {
    "report.md".into()
}

pub struct CreateReportExecutor;

#[async_trait::async_trait]
impl ToolExecutor for CreateReportExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let args: Args = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("create_report arguments: {e}")))?;

        let mut content = format!("# {}\n\n{}\n", args.title, args.body);
        let cited: Vec<u32> = extract_citations(&args.body);
        if !cited.is_empty() {
            content.push_str("\n## Sources\n\n");
            for number in cited {
                if let Some(source) = ctx.get_source(number) {
                    content.push_str(&format!("[{}] {} — {}\n", source.number, source.title, source.url));
                }
            }
        }

        let result = file_ops::file_write(
            ctx.workspace_dir(),
            FileWriteRequest {
                path: args.path.clone(),
                content,
            },
        )
        .await
        .map_err(Error::ToolError)?;

        Ok(serde_json::json!({"path": args.path, "written": result}).to_string())
    }
}

/// Pull `[n]`-style citation markers out of a report body, deduplicated and
/// sorted, so the Sources section lists each cited number once.
fn extract_citations(body: &str) -> Vec<u32> {
    let mut seen = std::collections::BTreeSet::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start && end < bytes.len() && bytes[end] == b']' {
                if let Ok(n) = body[start..end].parse::<u32>() {
                    seen.insert(n);
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_citations_dedupes_and_sorts() {
        let body = "Jazz emerged in New Orleans [2] and spread north [1][2].";
        assert_eq!(extract_citations(body), vec![1, 2]);
    }

    #[test]
    fn extract_citations_ignores_non_numeric_brackets() {
        let body = "See [note] and [3] below.";
        assert_eq!(extract_citations(body), vec![3]);
    }

    #[test]
    fn extract_citations_empty_when_none() {
        assert!(extract_citations("no citations here").is_empty());
    }
}
