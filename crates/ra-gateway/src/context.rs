//! Agent Context (C2) — the per-job mutable state a running Agent Loop
//! Engine threads through every reasoning/tool cycle, plus the
//! clarification suspend/resume machinery that lets an HTTP handler wake a
//! blocked engine from outside its task.
//!
//! Wrapped by its owner in `Arc<tokio::sync::Mutex<AgentContext>>` rather
//! than a `parking_lot` lock: the engine holds this lock across `.await`
//! points while a tool executes, which a non-async-aware mutex cannot do
//! safely.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ra_domain::error::{Error, Result};
use ra_domain::source::{SearchResult, Source};
use ra_domain::tool::Message;
use ra_tools::registry::ToolContext;
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::strategy::ReasoningOutput;

/// The structured planning record a reasoning strategy produces each
/// iteration, carried verbatim onto the context: step-by-step reasoning,
/// a situation assessment, plan status, whether enough data has been
/// gathered, the 1-3 steps still believed remaining, and whether the
/// model considers the task done.
#[derive(Debug, Clone)]
pub struct CurrentStepReasoning {
    pub reasoning_steps: Vec<String>,
    pub current_situation: String,
    pub plan_status: String,
    pub enough_data: bool,
    pub remaining_steps: Vec<String>,
    pub task_completed: bool,
}

impl From<&ReasoningOutput> for CurrentStepReasoning {
    fn from(output: &ReasoningOutput) -> Self {
        Self {
            reasoning_steps: output.reasoning_steps.clone(),
            current_situation: output.current_situation.clone(),
            plan_status: output.plan_status.clone(),
            enough_data: output.enough_data,
            remaining_steps: output.remaining_steps.clone(),
            task_completed: output.task_completed,
        }
    }
}

/// Where the owning job currently sits in the state machine described by
/// the Agent Loop Engine. Distinct from `ra_domain::job::JobState` — this
/// is engine-internal detail; the queue only ever observes `Running`,
/// `Completed`, or `Failed` at the job level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Researching,
    WaitingForClarification,
    Completed,
    Failed,
}

/// The per-job scratch state threaded through the Agent Loop Engine:
/// conversation history, discovered sources, budget counters, and the
/// latch backing clarification suspension.
pub struct AgentContext {
    pub job_id: Uuid,
    workspace_dir: PathBuf,

    pub iteration: u32,
    searches_used: u32,
    pub clarifications_used: u32,

    sources: Vec<Source>,
    searches: Vec<SearchResult>,

    pub conversation: Vec<Message>,
    pub state: AgentState,

    pending_clarification: Option<String>,
    final_answer: Option<(String, bool)>,
    current_step_reasoning: Option<CurrentStepReasoning>,

    /// Released by `provide_clarification`, awaited by the engine while
    /// suspended. Re-armed (replaced) each time a new clarification round
    /// begins so a stale `notified()` from a previous round can't wake the
    /// next one early.
    latch: Arc<Notify>,
}

impl AgentContext {
    pub fn new(job_id: Uuid, workspace_dir: PathBuf) -> Self {
        Self {
            job_id,
            workspace_dir,
            iteration: 0,
            searches_used: 0,
            clarifications_used: 0,
            sources: Vec::new(),
            searches: Vec::new(),
            conversation: Vec::new(),
            state: AgentState::Researching,
            pending_clarification: None,
            final_answer: None,
            current_step_reasoning: None,
            latch: Arc::new(Notify::new()),
        }
    }

    pub fn searches(&self) -> &[SearchResult] {
        &self.searches
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn final_answer(&self) -> Option<&(String, bool)> {
        self.final_answer.as_ref()
    }

    pub fn take_pending_clarification(&mut self) -> Option<String> {
        self.pending_clarification.take()
    }

    pub fn set_current_step_reasoning(&mut self, reasoning: CurrentStepReasoning) {
        self.current_step_reasoning = Some(reasoning);
    }

    pub fn current_step_reasoning(&self) -> Option<&CurrentStepReasoning> {
        self.current_step_reasoning.as_ref()
    }

    /// Suspend: transition to `WaitingForClarification`. The engine awaits
    /// `latch_signal()` after calling this.
    pub fn begin_clarification_wait(&mut self) {
        self.state = AgentState::WaitingForClarification;
        self.latch = Arc::new(Notify::new());
    }

    pub fn latch_signal(&self) -> Arc<Notify> {
        self.latch.clone()
    }

    /// Resume after an external answer arrives: append the user's reply to
    /// the conversation, bump the usage counter, and release the engine's
    /// wait. Rejects if the context is not currently suspended.
    pub fn provide_clarification(&mut self, answer: String) -> Result<()> {
        if self.state != AgentState::WaitingForClarification {
            return Err(Error::NotAwaiting);
        }
        self.conversation.push(Message::user(answer));
        self.clarifications_used += 1;
        self.state = AgentState::Researching;
        self.latch.notify_waiters();
        Ok(())
    }
}

impl ToolContext for AgentContext {
    fn insert_source(&mut self, url: &str, title: &str, snippet: &str) -> u32 {
        if let Some(existing) = self.sources.iter_mut().find(|s| s.url == url) {
            existing.title = title.to_string();
            existing.snippet = snippet.to_string();
            return existing.number;
        }
        let number = self.sources.len() as u32 + 1;
        self.sources.push(Source::new(number, url, title, snippet));
        number
    }

    fn set_source_content(&mut self, number: u32, content: String) {
        if let Some(source) = self.sources.iter_mut().find(|s| s.number == number) {
            source.set_full_content(content);
        }
    }

    fn record_search(&mut self, result: SearchResult) {
        self.searches_used += 1;
        self.searches.push(result);
    }

    fn get_source(&self, number: u32) -> Option<Source> {
        self.sources.iter().find(|s| s.number == number).cloned()
    }

    fn workspace_dir(&self) -> &std::path::Path {
        &self.workspace_dir
    }

    fn request_clarification(&mut self, question: String) {
        self.pending_clarification = Some(question);
    }

    fn set_final_answer(&mut self, answer: String, succeeded: bool) {
        self.final_answer = Some((answer, succeeded));
    }

    fn searches_used(&self) -> u32 {
        self.searches_used
    }

    fn sources_found(&self) -> u32 {
        self.sources.len() as u32
    }
}

/// A cloneable handle onto a running job's [`AgentContext`], used by the
/// HTTP "provide clarification" endpoint to reach a job the Job Executor
/// is concurrently running.
#[derive(Clone)]
pub struct ClarificationHandle {
    ctx: Arc<Mutex<AgentContext>>,
}

impl ClarificationHandle {
    pub fn new(ctx: Arc<Mutex<AgentContext>>) -> Self {
        Self { ctx }
    }

    pub async fn provide(&self, answer: String) -> Result<()> {
        self.ctx.lock().await.provide_clarification(answer)
    }
}

/// Registry of clarification handles for currently-running jobs, keyed by
/// job id. Populated by the Job Executor at job start and removed at job
/// end (mirrors the Job Queue's own running-job bookkeeping, but scoped
/// narrowly to the one external mutation the HTTP layer is allowed to
/// perform on a live job).
#[derive(Default)]
pub struct ClarificationRegistry {
    handles: RwLock<HashMap<Uuid, ClarificationHandle>>,
}

impl ClarificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job_id: Uuid, handle: ClarificationHandle) {
        self.handles.write().await.insert(job_id, handle);
    }

    pub async fn remove(&self, job_id: Uuid) {
        self.handles.write().await.remove(&job_id);
    }

    pub async fn get(&self, job_id: Uuid) -> Option<ClarificationHandle> {
        self.handles.read().await.get(&job_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AgentContext {
        AgentContext::new(Uuid::new_v4(), PathBuf::from("/tmp/workspace"))
    }

    #[test]
    fn insert_source_assigns_dense_numbers_and_dedupes_by_url() {
        let mut ctx = ctx();
        let n1 = ctx.insert_source("https://a.example", "A", "snippet a");
        let n2 = ctx.insert_source("https://b.example", "B", "snippet b");
        let n1_again = ctx.insert_source("https://a.example", "A updated", "new snippet");
        assert_eq!(n1, 1);
        assert_eq!(n2, 2);
        assert_eq!(n1_again, 1);
        assert_eq!(ctx.sources_found(), 2);
        assert_eq!(ctx.get_source(1).unwrap().title, "A updated");
    }

    #[test]
    fn record_search_increments_usage_counter() {
        let mut ctx = ctx();
        assert_eq!(ctx.searches_used(), 0);
        ctx.record_search(SearchResult {
            query: "q".into(),
            answer: None,
            source_urls: vec![],
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(ctx.searches_used(), 1);
        assert_eq!(ctx.searches().len(), 1);
    }

    #[test]
    fn provide_clarification_rejects_when_not_waiting() {
        let mut ctx = ctx();
        let err = ctx.provide_clarification("answer".into()).unwrap_err();
        assert_eq!(err.kind(), ra_domain::error::ErrorKind::NotAwaiting);
    }

    #[test]
    fn provide_clarification_resumes_and_appends_message() {
        let mut ctx = ctx();
        ctx.begin_clarification_wait();
        assert_eq!(ctx.state, AgentState::WaitingForClarification);
        ctx.provide_clarification("my answer".into()).unwrap();
        assert_eq!(ctx.state, AgentState::Researching);
        assert_eq!(ctx.clarifications_used, 1);
        assert_eq!(ctx.conversation.len(), 1);
    }

    #[tokio::test]
    async fn clarification_handle_wakes_a_waiting_engine() {
        let ctx = Arc::new(Mutex::new(ctx()));
        ctx.lock().await.begin_clarification_wait();
        let latch = ctx.lock().await.latch_signal();

        let handle = ClarificationHandle::new(ctx.clone());
        let waiter = tokio::spawn(async move {
            latch.notified().await;
        });

        handle.provide("answer".to_string()).await.unwrap();
        waiter.await.unwrap();
        assert_eq!(ctx.lock().await.state, AgentState::Researching);
    }

    #[tokio::test]
    async fn registry_insert_get_remove_round_trip() {
        let registry = ClarificationRegistry::new();
        let job_id = Uuid::new_v4();
        let ctx = Arc::new(Mutex::new(ctx()));
        registry.insert(job_id, ClarificationHandle::new(ctx)).await;
        assert!(registry.get(job_id).await.is_some());
        registry.remove(job_id).await;
        assert!(registry.get(job_id).await.is_none());
    }
}
