//! Agent Loop Engine (C4) — the central Reasoning / Selection / Action
//! state machine driving one job from `RESEARCHING` to a terminal state.
//!
//! Generic over a [`ReasoningStrategy`] so the three pluggable reasoning
//! modes share one implementation of budgets, gating, clarification
//! suspension, and error handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ra_domain::config::AgentLoopConfig;
use ra_domain::tool::{Message, ToolDefinition};
use ra_domain::trace::TraceEvent;
use ra_providers::router::LlmRouter;
use ra_tools::registry::{ToolContext, ToolRegistry};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::context::{AgentContext, AgentState, CurrentStepReasoning};
use crate::strategy::ReasoningStrategy;
use crate::stream::StreamingSink;

/// Drives a single job's Agent Context to completion. Cheap to construct
/// per job; holds only shared, already-`Arc`-wrapped subsystems.
pub struct AgentLoopEngine<S: ReasoningStrategy> {
    strategy: S,
    router: Arc<LlmRouter>,
    tools: Arc<ToolRegistry>,
    config: AgentLoopConfig,
}

impl<S: ReasoningStrategy> AgentLoopEngine<S> {
    pub fn new(
        strategy: S,
        router: Arc<LlmRouter>,
        tools: Arc<ToolRegistry>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            strategy,
            router,
            tools,
            config,
        }
    }

    /// Run the engine to termination. The caller (Job Executor) reads the
    /// outcome back off `ctx` afterwards — `state`, `final_answer()`,
    /// `sources()` — rather than this method returning a parallel result
    /// type, since the executor needs the full context regardless.
    pub async fn run(
        &self,
        ctx: Arc<Mutex<AgentContext>>,
        sink: StreamingSink,
        cancel_flag: Arc<AtomicBool>,
        job_id: Uuid,
    ) {
        let base_tools = self.tools.list_all();
        let mut skip_increment = false;

        loop {
            if cancel_flag.load(Ordering::SeqCst) {
                let mut guard = ctx.lock().await;
                guard.state = AgentState::Failed;
                drop(guard);
                sink.finish(None);
                return;
            }

            let (iteration, allowed, conversation) = {
                let mut guard = ctx.lock().await;
                if !skip_increment {
                    guard.iteration += 1;
                }
                skip_increment = false;
                let allowed = gate_tools(&base_tools, &guard, &self.config);
                (guard.iteration, allowed, guard.conversation.clone())
            };

            TraceEvent::AgentLoopIteration {
                job_id: job_id.to_string(),
                iteration,
                strategy: self.strategy.name().to_string(),
                tool_name: None,
            }
            .emit();

            let reasoning = match self.strategy.reason(&self.router, &conversation, &allowed).await {
                Ok(out) => out,
                Err(first_err) => {
                    tracing::warn!(job = %job_id, error = %first_err, "reasoning call failed, retrying once with guidance");
                    let mut retry_conversation = conversation.clone();
                    retry_conversation.push(Message::system(format!(
                        "Your previous response could not be parsed: {first_err}. \
                         Respond again, following the required format exactly."
                    )));
                    match self.strategy.reason(&self.router, &retry_conversation, &allowed).await {
                        Ok(out) => out,
                        Err(second_err) => {
                            tracing::error!(job = %job_id, error = %second_err, "reasoning retry failed, failing iteration");
                            let mut guard = ctx.lock().await;
                            guard.conversation.push(Message::system(format!(
                                "LLM_ERROR: {second_err}"
                            )));
                            if iteration >= self.config.max_iterations {
                                drop(guard);
                                self.force_final_answer(&ctx, &sink).await;
                                return;
                            }
                            continue;
                        }
                    }
                }
            };

            if !allowed.iter().any(|t| t.name == reasoning.tool_call.tool_name) {
                let mut guard = ctx.lock().await;
                guard.set_final_answer(reasoning.reasoning.clone(), true);
                guard.state = AgentState::Completed;
                drop(guard);
                sink.push(reasoning.reasoning.clone());
                sink.finish(None);
                return;
            }

            sink.push(reasoning.reasoning.clone());
            {
                let mut guard = ctx.lock().await;
                guard.set_current_step_reasoning(CurrentStepReasoning::from(&reasoning));
                guard.conversation.push(Message::assistant(reasoning.reasoning.clone()));
            }

            let tool_name = reasoning.tool_call.tool_name.clone();
            let call_id = reasoning.tool_call.call_id.clone();

            TraceEvent::ToolCallStarted {
                job_id: job_id.to_string(),
                call_id: call_id.clone(),
                tool_name: tool_name.clone(),
            }
            .emit();

            let start = Instant::now();
            let exec_result = {
                let mut guard = ctx.lock().await;
                self.tools
                    .execute(&tool_name, reasoning.tool_call.arguments.clone(), &mut *guard)
                    .await
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            match exec_result {
                Ok(result_text) => {
                    TraceEvent::ToolCallFinished {
                        job_id: job_id.to_string(),
                        call_id: call_id.clone(),
                        tool_name: tool_name.clone(),
                        duration_ms,
                        is_error: false,
                    }
                    .emit();

                    sink.push(result_text.clone());

                    let mut guard = ctx.lock().await;
                    guard
                        .conversation
                        .push(Message::tool_result(call_id.clone(), result_text.clone()));

                    if tool_name == "clarification" {
                        guard.take_pending_clarification();
                        TraceEvent::ClarificationRequested {
                            job_id: job_id.to_string(),
                            clarifications_used: guard.clarifications_used,
                        }
                        .emit();
                        guard.begin_clarification_wait();
                        let latch = guard.latch_signal();
                        drop(guard);
                        sink.finish(None);
                        latch.notified().await;
                        TraceEvent::ClarificationProvided {
                            job_id: job_id.to_string(),
                        }
                        .emit();
                        skip_increment = true;
                        continue;
                    }

                    if tool_name == "final_answer" {
                        let (answer, succeeded) = guard
                            .final_answer()
                            .cloned()
                            .unwrap_or((result_text, true));
                        guard.state = if succeeded {
                            AgentState::Completed
                        } else {
                            AgentState::Failed
                        };
                        drop(guard);
                        sink.finish(None);
                        return;
                    }
                }
                Err(tool_err) => {
                    TraceEvent::ToolCallFinished {
                        job_id: job_id.to_string(),
                        call_id: call_id.clone(),
                        tool_name: tool_name.clone(),
                        duration_ms,
                        is_error: true,
                    }
                    .emit();

                    let mut guard = ctx.lock().await;
                    guard.conversation.push(Message::tool_result(
                        call_id.clone(),
                        format!("error: {tool_err}"),
                    ));
                }
            }

            if iteration >= self.config.max_iterations {
                self.force_final_answer(&ctx, &sink).await;
                return;
            }
        }
    }

    /// Budget exhausted with no terminal tool chosen: synthesize a
    /// `final_answer` from the last reasoning record rather than leaving
    /// the job stuck.
    async fn force_final_answer(&self, ctx: &Arc<Mutex<AgentContext>>, sink: &StreamingSink) {
        let mut guard = ctx.lock().await;
        let answer = guard
            .current_step_reasoning()
            .map(|r| {
                format!(
                    "Research budget exhausted before a confident answer was reached. \
                     Best available synthesis: {}",
                    r.current_situation
                )
            })
            .unwrap_or_else(|| {
                "Research budget exhausted before any usable answer could be produced.".to_string()
            });
        guard.set_final_answer(answer, true);
        guard.state = AgentState::Completed;
        drop(guard);
        sink.finish(None);
    }
}

/// Apply the dynamic tool gates in the order the spec requires, each one
/// narrowing further (intersections accumulate, never widen).
fn gate_tools(
    base: &[ToolDefinition],
    ctx: &AgentContext,
    config: &AgentLoopConfig,
) -> Vec<ToolDefinition> {
    let mut allowed: Vec<ToolDefinition> = base.to_vec();

    if ctx.iteration >= config.max_iterations {
        allowed.retain(|t| t.name == "final_answer" || t.name == "create_report");
    }
    if ctx.clarifications_used >= config.max_clarifications {
        allowed.retain(|t| t.name != "clarification");
    }
    if ctx.searches_used() >= config.max_searches {
        allowed.retain(|t| t.name != "web_search");
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn defs() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "web_search".into(),
                description: String::new(),
                parameters: serde_json::json!({}),
                is_system_tool: false,
            },
            ToolDefinition {
                name: "clarification".into(),
                description: String::new(),
                parameters: serde_json::json!({}),
                is_system_tool: true,
            },
            ToolDefinition {
                name: "final_answer".into(),
                description: String::new(),
                parameters: serde_json::json!({}),
                is_system_tool: true,
            },
            ToolDefinition {
                name: "create_report".into(),
                description: String::new(),
                parameters: serde_json::json!({}),
                is_system_tool: false,
            },
        ]
    }

    #[test]
    fn gate_removes_clarification_once_budget_hit() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), PathBuf::from("/tmp"));
        ctx.clarifications_used = 2;
        let config = AgentLoopConfig {
            max_clarifications: 2,
            ..AgentLoopConfig::default()
        };
        let allowed = gate_tools(&defs(), &ctx, &config);
        assert!(!allowed.iter().any(|t| t.name == "clarification"));
        assert!(allowed.iter().any(|t| t.name == "web_search"));
    }

    #[test]
    fn gate_removes_web_search_once_search_budget_hit() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), PathBuf::from("/tmp"));
        ctx.record_search(ra_domain::source::SearchResult {
            query: "q".into(),
            answer: None,
            source_urls: vec![],
            timestamp: chrono::Utc::now(),
        });
        let config = AgentLoopConfig {
            max_searches: 1,
            ..AgentLoopConfig::default()
        };
        let allowed = gate_tools(&defs(), &ctx, &config);
        assert!(!allowed.iter().any(|t| t.name == "web_search"));
    }

    #[test]
    fn gate_restricts_to_terminal_tools_at_iteration_ceiling() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), PathBuf::from("/tmp"));
        ctx.iteration = 25;
        let config = AgentLoopConfig {
            max_iterations: 25,
            ..AgentLoopConfig::default()
        };
        let allowed = gate_tools(&defs(), &ctx, &config);
        assert_eq!(allowed.len(), 2);
        assert!(allowed.iter().any(|t| t.name == "final_answer"));
        assert!(allowed.iter().any(|t| t.name == "create_report"));
    }

    #[test]
    fn gates_accumulate_intersection() {
        let mut ctx = AgentContext::new(Uuid::new_v4(), PathBuf::from("/tmp"));
        ctx.iteration = 25;
        ctx.clarifications_used = 5;
        let config = AgentLoopConfig {
            max_iterations: 25,
            max_clarifications: 2,
            ..AgentLoopConfig::default()
        };
        let allowed = gate_tools(&defs(), &ctx, &config);
        assert_eq!(allowed.len(), 2);
    }
}
