//! The two system tools the Agent Loop Engine always keeps in the toolkit
//! regardless of search-budget gating: `final_answer` (the unique terminal
//! tool) and `clarification` (the unique suspending tool).

use ra_domain::error::{Error, Result};
use ra_domain::tool::ToolDefinition;
use serde::Deserialize;
use serde_json::Value;

use crate::registry::{ToolContext, ToolExecutor};

pub fn final_answer_definition() -> ToolDefinition {
    ToolDefinition {
        name: "final_answer".into(),
        description: "Deliver the final answer to the research task and end the job. Use status=\"failed\" only when the task genuinely cannot be completed.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "status": {"type": "string", "enum": ["completed", "failed"], "default": "completed"}
            },
            "required": ["answer"]
        }),
        is_system_tool: true,
    }
}

#[derive(Debug, Deserialize)]
struct FinalAnswerArgs {
    answer: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "completed".into()
}

pub struct FinalAnswerExecutor;

#[async_trait::async_trait]
impl ToolExecutor for FinalAnswerExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        let args: FinalAnswerArgs = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("final_answer arguments: {e}")))?;
        let succeeded = args.status != "failed";
        ctx.set_final_answer(args.answer.clone(), succeeded);
        Ok(serde_json::json!({"accepted": true, "status": args.status}).to_string())
    }
}

pub fn clarification_definition() -> ToolDefinition {
    ToolDefinition {
        name: "clarification".into(),
        description: "Ask the user a clarifying question and suspend the job until they respond.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"}
            },
            "required": ["question"]
        }),
        is_system_tool: true,
    }
}

pub struct ClarificationExecutor;

#[async_trait::async_trait]
impl ToolExecutor for ClarificationExecutor {
    async fn execute(&self, args: Value, ctx: &mut dyn ToolContext) -> Result<String> {
        #[derive(Debug, Deserialize)]
        struct Args {
            question: String,
        }
        let args: Args = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("clarification arguments: {e}")))?;
        ctx.request_clarification(args.question.clone());
        Ok(serde_json::json!({"question": args.question}).to_string())
    }
}
