//! Reasoning strategies — pluggable implementations of Phase R (Reasoning)
//! and Phase S (Selection) of one Agent Loop Engine iteration.
//!
//! All three strategies must produce the same [`ReasoningOutput`] shape so
//! the engine can treat them interchangeably; only how they talk to the
//! LLM differs. Malformed model output is always surfaced as
//! `Error::LlmError` — the engine does not attempt to coerce or repair it,
//! it fails the iteration and lets the normal retry-once-then-fail path
//! handle it.

use ra_domain::capability::ModelRole;
use ra_domain::error::{Error, Result};
use ra_domain::tool::{Message, Role, ToolCall, ToolDefinition};
use ra_providers::router::LlmRouter;
use ra_providers::traits::ChatRequest;
use serde::Deserialize;
use uuid::Uuid;

/// The result of one Phase R + Phase S pass: the model's full structured
/// planning record plus the single tool call it selected.
///
/// `reasoning` is `reasoning_steps` joined for the transcript/stream,
/// where the rest of the engine only ever wants flat text; the structured
/// fields are preserved alongside it so the context can carry the full
/// record forward (see `AgentContext::current_step_reasoning`).
#[derive(Debug, Clone)]
pub struct ReasoningOutput {
    pub reasoning: String,
    pub reasoning_steps: Vec<String>,
    pub current_situation: String,
    pub plan_status: String,
    pub enough_data: bool,
    pub remaining_steps: Vec<String>,
    pub task_completed: bool,
    pub tool_call: ToolCall,
}

impl ReasoningOutput {
    fn from_fields(fields: ReasoningFields, tool_call: ToolCall) -> Self {
        Self {
            reasoning: fields.reasoning_steps.join("\n"),
            reasoning_steps: fields.reasoning_steps,
            current_situation: fields.current_situation,
            plan_status: fields.plan_status,
            enough_data: fields.enough_data,
            remaining_steps: fields.remaining_steps,
            task_completed: fields.task_completed,
            tool_call,
        }
    }
}

/// The structured planning fields Phase R must return on every pass,
/// regardless of which strategy produced them: step-by-step reasoning,
/// a situation assessment, plan status, whether enough data has been
/// gathered, the 1-3 steps still believed remaining, and whether the
/// model considers the task done.
#[derive(Debug, Deserialize)]
struct ReasoningFields {
    reasoning_steps: Vec<String>,
    current_situation: String,
    plan_status: String,
    #[serde(default)]
    enough_data: bool,
    remaining_steps: Vec<String>,
    task_completed: bool,
}

#[async_trait::async_trait]
pub trait ReasoningStrategy: Send + Sync {
    async fn reason(
        &self,
        router: &LlmRouter,
        conversation: &[Message],
        allowed_tools: &[ToolDefinition],
    ) -> Result<ReasoningOutput>;

    /// Short identifier used in trace events and logs.
    fn name(&self) -> &'static str;
}

#[derive(Deserialize)]
struct EmbeddedToolResponse {
    #[serde(flatten)]
    reasoning: ReasoningFields,
    tool: EmbeddedTool,
}

#[derive(Deserialize)]
struct EmbeddedTool {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Default strategy: one LLM call, asked to return reasoning and its
/// chosen tool invocation in a single JSON object.
pub struct PlannerWithEmbeddedTool;

#[async_trait::async_trait]
impl ReasoningStrategy for PlannerWithEmbeddedTool {
    async fn reason(
        &self,
        router: &LlmRouter,
        conversation: &[Message],
        allowed_tools: &[ToolDefinition],
    ) -> Result<ReasoningOutput> {
        let req = ChatRequest {
            messages: conversation.to_vec(),
            tools: allowed_tools.to_vec(),
            json_mode: true,
            ..Default::default()
        };
        let resp = router.chat_for_role(ModelRole::Planner, req).await?;
        let parsed: EmbeddedToolResponse = serde_json::from_str(&resp.content).map_err(|e| {
            Error::LlmError(format!(
                "planner response was not valid embedded-tool JSON: {e}"
            ))
        })?;
        Ok(ReasoningOutput::from_fields(
            parsed.reasoning,
            ToolCall {
                call_id: Uuid::new_v4().to_string(),
                tool_name: parsed.tool.name,
                arguments: parsed.tool.arguments,
            },
        ))
    }

    fn name(&self) -> &'static str {
        "planner_with_embedded_tool"
    }
}

/// Delegates tool selection to the provider's native function-calling
/// surface instead of asking for embedded JSON. The structured planning
/// fields Phase R still owes are carried in the response's `content`
/// field as JSON, alongside the native tool call.
pub struct NativeToolCall;

#[async_trait::async_trait]
impl ReasoningStrategy for NativeToolCall {
    async fn reason(
        &self,
        router: &LlmRouter,
        conversation: &[Message],
        allowed_tools: &[ToolDefinition],
    ) -> Result<ReasoningOutput> {
        let req = ChatRequest {
            messages: conversation.to_vec(),
            tools: allowed_tools.to_vec(),
            json_mode: false,
            ..Default::default()
        };
        let resp = router.chat_for_role(ModelRole::Executor, req).await?;
        let call = resp.tool_calls.into_iter().next().ok_or_else(|| {
            Error::LlmError("executor response carried no native tool call".into())
        })?;
        let fields: ReasoningFields = serde_json::from_str(&resp.content).map_err(|e| {
            Error::LlmError(format!(
                "executor response content was not valid reasoning JSON: {e}"
            ))
        })?;
        Ok(ReasoningOutput::from_fields(fields, call))
    }

    fn name(&self) -> &'static str {
        "native_tool_call"
    }
}

#[derive(Deserialize)]
struct ToolSelectionResponse {
    tool: EmbeddedTool,
}

/// Splits reasoning and tool selection into two separate LLM calls: a
/// free-form reasoning pass with no tools visible, then a constrained
/// JSON tool-selection pass given that reasoning as context.
pub struct TwoPhase;

#[async_trait::async_trait]
impl ReasoningStrategy for TwoPhase {
    async fn reason(
        &self,
        router: &LlmRouter,
        conversation: &[Message],
        allowed_tools: &[ToolDefinition],
    ) -> Result<ReasoningOutput> {
        let reasoning_req = ChatRequest {
            messages: conversation.to_vec(),
            tools: Vec::new(),
            json_mode: true,
            ..Default::default()
        };
        let reasoning_resp = router
            .chat_for_role(ModelRole::Planner, reasoning_req)
            .await?;
        let fields: ReasoningFields =
            serde_json::from_str(&reasoning_resp.content).map_err(|e| {
                Error::LlmError(format!(
                    "two-phase reasoning response was not valid reasoning JSON: {e}"
                ))
            })?;
        let reasoning_text = fields.reasoning_steps.join("\n");

        let mut selection_messages = conversation.to_vec();
        selection_messages.push(Message {
            role: Role::Assistant,
            content: ra_domain::tool::MessageContent::Text(reasoning_text),
        });
        selection_messages.push(Message::user(
            "Select exactly one tool call that follows from the reasoning above, as JSON: \
             {\"tool\": {\"name\": ..., \"arguments\": {...}}}",
        ));

        let selection_req = ChatRequest {
            messages: selection_messages,
            tools: allowed_tools.to_vec(),
            json_mode: true,
            ..Default::default()
        };
        let selection_resp = router
            .chat_for_role(ModelRole::Planner, selection_req)
            .await?;
        let parsed: ToolSelectionResponse =
            serde_json::from_str(&selection_resp.content).map_err(|e| {
                Error::LlmError(format!(
                    "two-phase tool selection response was not valid JSON: {e}"
                ))
            })?;

        Ok(ReasoningOutput::from_fields(
            fields,
            ToolCall {
                call_id: Uuid::new_v4().to_string(),
                tool_name: parsed.tool.name,
                arguments: parsed.tool.arguments,
            },
        ))
    }

    fn name(&self) -> &'static str {
        "two_phase"
    }
}

#[async_trait::async_trait]
impl ReasoningStrategy for Box<dyn ReasoningStrategy> {
    async fn reason(
        &self,
        router: &LlmRouter,
        conversation: &[Message],
        allowed_tools: &[ToolDefinition],
    ) -> Result<ReasoningOutput> {
        (**self).reason(router, conversation, allowed_tools).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Resolve an [`AgentLoopConfig::reasoning_strategy`] identifier to its
/// implementation. Unknown identifiers fall back to the default rather than
/// failing job construction.
pub fn strategy_from_name(name: &str) -> Box<dyn ReasoningStrategy> {
    match name {
        "native_tool_call" => Box::new(NativeToolCall),
        "two_phase" => Box::new(TwoPhase),
        _ => Box::new(PlannerWithEmbeddedTool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_tool_response_parses_from_json() {
        let json = r#"{
            "reasoning_steps": ["checked the prior sources", "need more data"],
            "current_situation": "two sources found, coverage is thin",
            "plan_status": "on track",
            "enough_data": false,
            "remaining_steps": ["run a broader search", "synthesize"],
            "task_completed": false,
            "tool": {"name": "web_search", "arguments": {"query": "rust async"}}
        }"#;
        let parsed: EmbeddedToolResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.reasoning.current_situation, "two sources found, coverage is thin");
        assert_eq!(parsed.reasoning.reasoning_steps.len(), 2);
        assert_eq!(parsed.tool.name, "web_search");
    }

    #[test]
    fn tool_selection_response_parses_from_json() {
        let json = r#"{"tool": {"name": "final_answer", "arguments": {"answer": "done"}}}"#;
        let parsed: ToolSelectionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tool.name, "final_answer");
    }

    #[test]
    fn strategy_from_name_resolves_known_identifiers() {
        assert_eq!(strategy_from_name("native_tool_call").name(), "native_tool_call");
        assert_eq!(strategy_from_name("two_phase").name(), "two_phase");
        assert_eq!(
            strategy_from_name("planner_with_embedded_tool").name(),
            "planner_with_embedded_tool"
        );
    }

    #[test]
    fn strategy_from_name_falls_back_to_default_on_unknown() {
        assert_eq!(strategy_from_name("nonsense").name(), "planner_with_embedded_tool");
    }
}
