//! Job Executor (C8) — binds a popped job to a fresh [`AgentLoopEngine`]
//! run, translates its progress into Job Queue updates and SSE broker
//! events, and resolves the terminal job state once the engine returns.

use std::path::PathBuf;
use std::sync::Arc;

use ra_domain::config::AgentLoopConfig;
use ra_domain::error::ErrorKind;
use ra_domain::job::{JobError, JobResult};
use ra_domain::tool::Message;
use ra_providers::router::LlmRouter;
use ra_tools::registry::{ToolContext, ToolRegistry};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::broker::SseBroker;
use crate::context::{AgentContext, AgentState, ClarificationHandle, ClarificationRegistry};
use crate::engine::AgentLoopEngine;
use crate::queue::{AcquiredJob, JobQueue};
use crate::strategy::strategy_from_name;
use crate::stream::StreamingSink;

/// Runs one or more worker loops pulling jobs off a shared [`JobQueue`].
/// Concurrency is bounded by the queue's own semaphore, not by how many
/// `run_forever` tasks are spawned — spawning more than `max_concurrent_jobs`
/// just means extra callers block inside `queue.next()`.
pub struct JobExecutor {
    queue: Arc<JobQueue>,
    broker: Arc<SseBroker>,
    clarifications: Arc<ClarificationRegistry>,
    router: Arc<LlmRouter>,
    tools: Arc<ToolRegistry>,
    agent_loop_config: AgentLoopConfig,
    workspace_root: PathBuf,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<JobQueue>,
        broker: Arc<SseBroker>,
        clarifications: Arc<ClarificationRegistry>,
        router: Arc<LlmRouter>,
        tools: Arc<ToolRegistry>,
        agent_loop_config: AgentLoopConfig,
        workspace_root: PathBuf,
    ) -> Self {
        Self {
            queue,
            broker,
            clarifications,
            router,
            tools,
            agent_loop_config,
            workspace_root,
        }
    }

    /// Pop and run jobs forever. Intended to be spawned as a background
    /// task; never returns under normal operation.
    pub async fn run_forever(self: Arc<Self>) {
        loop {
            let acquired = self.queue.next().await;
            self.execute_one(acquired).await;
        }
    }

    async fn execute_one(&self, acquired: AcquiredJob) {
        let job_id = acquired.record.job_id;
        let workspace_dir = self.workspace_root.join(job_id.to_string());

        if let Err(e) = tokio::fs::create_dir_all(&workspace_dir).await {
            tracing::error!(job = %job_id, error = %e, "executor: failed to create job workspace");
            self.queue
                .mark_failed(
                    job_id,
                    JobError {
                        kind: ErrorKind::Io,
                        message: e.to_string(),
                    },
                )
                .await;
            self.broker.job_error(job_id, ErrorKind::Io, &e.to_string());
            return;
        }

        let mut ctx = AgentContext::new(job_id, workspace_dir);
        ctx.conversation.push(Message::user(acquired.record.query.clone()));
        let ctx = Arc::new(Mutex::new(ctx));

        self.clarifications
            .insert(job_id, ClarificationHandle::new(ctx.clone()))
            .await;
        self.broker.job_status(job_id, "started");

        let sink = StreamingSink::new();
        let strategy = strategy_from_name(&self.agent_loop_config.reasoning_strategy);
        let engine = AgentLoopEngine::new(
            strategy,
            self.router.clone(),
            self.tools.clone(),
            self.agent_loop_config.clone(),
        );

        let progress_task = self.spawn_progress_hook(job_id, ctx.clone());
        let stream_task = self.spawn_stream_forwarder(job_id, sink.reader());

        engine
            .run(ctx.clone(), sink, acquired.cancel_flag.clone(), job_id)
            .await;

        progress_task.abort();
        let _ = stream_task.await;
        self.clarifications.remove(job_id).await;

        self.finalize(job_id, &acquired, &ctx).await;
    }

    async fn finalize(&self, job_id: Uuid, acquired: &AcquiredJob, ctx: &Arc<Mutex<AgentContext>>) {
        // A cancellation observed via the flag always wins over whatever
        // terminal state the engine settled on: it may not have reached a
        // checkpoint in time to notice before returning.
        if acquired.cancel_flag.load(std::sync::atomic::Ordering::SeqCst) {
            self.queue.cancel(job_id).await;
            self.broker.job_status(job_id, "cancelled");
            return;
        }

        let guard = ctx.lock().await;
        let state = guard.state;
        let searches_used = guard.searches_used();
        let sources_found = guard.sources_found();
        let sources = guard.sources().to_vec();
        let final_answer = guard.final_answer().cloned();
        drop(guard);

        match state {
            AgentState::Completed => {
                let (answer, succeeded) = final_answer
                    .unwrap_or_else(|| ("no answer was produced".to_string(), false));
                if succeeded {
                    self.queue
                        .mark_completed(
                            job_id,
                            JobResult {
                                answer,
                                sources,
                                searches_used,
                                sources_found,
                                artifact_paths: Vec::new(),
                            },
                        )
                        .await;
                    self.broker.job_status(job_id, "completed");
                } else {
                    self.queue
                        .mark_failed(
                            job_id,
                            JobError {
                                kind: ErrorKind::Other,
                                message: answer.clone(),
                            },
                        )
                        .await;
                    self.broker.job_error(job_id, ErrorKind::Other, &answer);
                }
            }
            AgentState::Failed => {
                let message = final_answer
                    .map(|(answer, _)| answer)
                    .unwrap_or_else(|| "job failed before producing an answer".to_string());
                self.queue
                    .mark_failed(
                        job_id,
                        JobError {
                            kind: ErrorKind::Other,
                            message: message.clone(),
                        },
                    )
                    .await;
                self.broker.job_error(job_id, ErrorKind::Other, &message);
            }
            AgentState::Researching | AgentState::WaitingForClarification => {
                // The engine should never return to the executor in one of
                // these states; treat it as a bug rather than silently
                // leaving the job stuck at RUNNING forever.
                tracing::error!(job = %job_id, ?state, "executor: engine returned in a non-terminal state");
                self.queue
                    .mark_failed(
                        job_id,
                        JobError {
                            kind: ErrorKind::Other,
                            message: "agent loop engine exited without reaching a terminal state".into(),
                        },
                    )
                    .await;
            }
        }
    }

    fn spawn_progress_hook(&self, job_id: Uuid, ctx: Arc<Mutex<AgentContext>>) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let broker = self.broker.clone();
        let max_iterations = self.agent_loop_config.max_iterations;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                interval.tick().await;
                let (iteration, current_step, searches_used, sources_found) = {
                    let guard = ctx.lock().await;
                    (guard.iteration, step_label(guard.state), guard.searches_used(), guard.sources_found())
                };
                let total_steps = queue.get(job_id).await.map(|rec| rec.total_steps).unwrap_or(0);
                let steps_completed =
                    steps_completed_from_iteration(iteration, max_iterations, total_steps);
                queue
                    .update_progress(
                        job_id,
                        steps_completed,
                        current_step,
                        Some(searches_used),
                        Some(sources_found),
                    )
                    .await;
                if let Some(rec) = queue.get(job_id).await {
                    broker.job_progress(
                        job_id,
                        rec.progress,
                        &rec.current_step,
                        Some(rec.steps_completed),
                        Some(rec.total_steps),
                    );
                }
            }
        })
    }

    fn spawn_stream_forwarder(&self, job_id: Uuid, mut reader: crate::stream::StreamReader) -> JoinHandle<()> {
        let broker = self.broker.clone();
        tokio::spawn(async move {
            while let Some(chunk) = reader.next().await {
                broker.chunk(job_id, &chunk);
            }
        })
    }
}

/// Scale the engine's iteration-budget counter onto the job's fixed step
/// budget, reserving the last step for `mark_completed` so the periodic
/// progress hook can never drive `progress` to 100% while the job is still
/// running — only a terminal state transition is allowed to do that.
fn steps_completed_from_iteration(iteration: u32, max_iterations: u32, total_steps: u32) -> u32 {
    if total_steps == 0 || max_iterations == 0 {
        return 0;
    }
    let fraction = (iteration as f64 / max_iterations as f64).clamp(0.0, 1.0);
    let scaled = (fraction * total_steps as f64).floor() as u32;
    scaled.min(total_steps.saturating_sub(1))
}

fn step_label(state: AgentState) -> &'static str {
    match state {
        AgentState::Researching => "researching",
        AgentState::WaitingForClarification => "awaiting clarification",
        AgentState::Completed => "completed",
        AgentState::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_label_covers_every_state() {
        assert_eq!(step_label(AgentState::Researching), "researching");
        assert_eq!(step_label(AgentState::WaitingForClarification), "awaiting clarification");
        assert_eq!(step_label(AgentState::Completed), "completed");
        assert_eq!(step_label(AgentState::Failed), "failed");
    }

    #[test]
    fn steps_completed_from_iteration_never_reaches_total_while_running() {
        assert_eq!(steps_completed_from_iteration(25, 25, 5), 4);
        assert_eq!(steps_completed_from_iteration(5, 25, 5), 0);
        assert_eq!(steps_completed_from_iteration(0, 25, 5), 0);
    }

    #[test]
    fn steps_completed_from_iteration_handles_zero_budgets() {
        assert_eq!(steps_completed_from_iteration(3, 25, 0), 0);
        assert_eq!(steps_completed_from_iteration(3, 0, 5), 0);
    }
}
