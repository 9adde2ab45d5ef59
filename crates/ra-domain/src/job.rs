use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Lifecycle state of a job. Transitions follow
/// `PENDING -> RUNNING -> {COMPLETED | FAILED | CANCELLED}`, with
/// `PENDING -> CANCELLED` also permitted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// Named priority bands, mirroring the ordering used by the scheduler.
/// Higher numeric value runs first; ties break FIFO by `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(-10);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(10);
    pub const URGENT: Priority = Priority(20);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// What the submitter asked for. Immutable once accepted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub query: String,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub deep_level: u8,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The structured answer produced by a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub answer: String,
    pub sources: Vec<crate::source::Source>,
    pub searches_used: u32,
    pub sources_found: u32,
    #[serde(default)]
    pub artifact_paths: Vec<String>,
}

/// A typed failure record, carrying the error-taxonomy kind alongside a
/// human-readable message so API consumers can branch on `kind` without
/// string-matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

/// The durable, queue-owned record of one job's entire lifecycle.
///
/// `total_steps` is fixed at submission time as `5 * (3 * deep_level + 1)`
/// and never recomputed; `progress == 100.0` iff `state == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub query: String,
    pub agent_type: String,
    pub deep_level: u8,
    pub priority: Priority,
    pub tags: HashSet<String>,
    pub metadata: HashMap<String, serde_json::Value>,

    pub state: JobState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub progress: f32,
    pub current_step: String,
    pub steps_completed: u32,
    pub total_steps: u32,

    pub searches_used: u32,
    pub sources_found: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

/// `5 * (3 * deep_level + 1)`, the fixed step budget for a given depth.
pub fn total_steps_for_deep_level(deep_level: u8) -> u32 {
    5 * (3 * deep_level as u32 + 1)
}

impl JobRecord {
    pub fn new(job_id: Uuid, request: JobRequest, created_at: DateTime<Utc>) -> Self {
        let total_steps = total_steps_for_deep_level(request.deep_level);
        Self {
            job_id,
            query: request.query,
            agent_type: request.agent_type,
            deep_level: request.deep_level,
            priority: request.priority,
            tags: request.tags,
            metadata: request.metadata,
            state: JobState::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            progress: 0.0,
            current_step: "queued".to_string(),
            steps_completed: 0,
            total_steps,
            searches_used: 0,
            sources_found: 0,
            result: None,
            error: None,
        }
    }

    /// Demote a `Running` record back to `Pending` on restart after a crash,
    /// clearing the start timestamp and progress markers picked up mid-run.
    pub fn demote_to_pending(&mut self) {
        self.state = JobState::Pending;
        self.started_at = None;
        self.progress = 0.0;
        self.steps_completed = 0;
        self.current_step = "requeued".to_string();
    }

    pub fn mark_running(&mut self, started_at: DateTime<Utc>) {
        self.state = JobState::Running;
        self.started_at = Some(started_at);
    }

    pub fn mark_completed(&mut self, completed_at: DateTime<Utc>, result: JobResult) {
        self.searches_used = result.searches_used;
        self.sources_found = result.sources_found;
        self.result = Some(result);
        self.progress = 100.0;
        self.state = JobState::Completed;
        self.completed_at = Some(completed_at);
    }

    pub fn mark_failed(&mut self, completed_at: DateTime<Utc>, error: JobError) {
        self.error = Some(error);
        self.state = JobState::Failed;
        self.completed_at = Some(completed_at);
    }

    pub fn mark_cancelled(&mut self, completed_at: DateTime<Utc>) {
        self.state = JobState::Cancelled;
        self.completed_at = Some(completed_at);
    }

    /// Clamp progress into `0.0..=100.0` and update the step counters.
    pub fn update_progress(&mut self, steps_completed: u32, current_step: impl Into<String>) {
        self.steps_completed = steps_completed.min(self.total_steps);
        self.current_step = current_step.into();
        self.progress = if self.total_steps == 0 {
            0.0
        } else {
            (self.steps_completed as f32 / self.total_steps as f32 * 100.0).clamp(0.0, 100.0)
        };
    }
}

/// Ordering for the priority queue: higher priority first, then FIFO by
/// `created_at` within the same priority band.
impl PartialEq for JobRecord {
    fn eq(&self, other: &Self) -> bool {
        self.job_id == other.job_id
    }
}
impl Eq for JobRecord {}

impl PartialOrd for JobRecord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JobRecord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            query: "rust async runtimes".into(),
            agent_type: "research".into(),
            deep_level: 2,
            priority: Priority::NORMAL,
            tags: HashSet::new(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn total_steps_formula() {
        assert_eq!(total_steps_for_deep_level(0), 5);
        assert_eq!(total_steps_for_deep_level(1), 20);
        assert_eq!(total_steps_for_deep_level(2), 35);
    }

    #[test]
    fn progress_is_100_iff_completed() {
        let now = Utc::now();
        let mut rec = JobRecord::new(Uuid::new_v4(), request(), now);
        rec.mark_running(now);
        rec.update_progress(10, "searching");
        assert!(rec.progress < 100.0);

        rec.mark_completed(
            now,
            JobResult {
                answer: "done".into(),
                sources: vec![],
                searches_used: 2,
                sources_found: 2,
                artifact_paths: vec![],
            },
        );
        assert_eq!(rec.progress, 100.0);
        assert_eq!(rec.state, JobState::Completed);
    }

    #[test]
    fn demote_resets_running_fields() {
        let now = Utc::now();
        let mut rec = JobRecord::new(Uuid::new_v4(), request(), now);
        rec.mark_running(now);
        rec.update_progress(5, "step 5");
        rec.demote_to_pending();
        assert_eq!(rec.state, JobState::Pending);
        assert!(rec.started_at.is_none());
        assert_eq!(rec.progress, 0.0);
    }

    #[test]
    fn priority_queue_ordering_is_descending_then_fifo() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);

        let mut low = JobRecord::new(Uuid::new_v4(), request(), t0);
        low.priority = Priority::LOW;
        let mut normal_early = JobRecord::new(Uuid::new_v4(), request(), t0);
        let mut normal_late = JobRecord::new(Uuid::new_v4(), request(), t1);
        let mut urgent = JobRecord::new(Uuid::new_v4(), request(), t1);
        urgent.priority = Priority::URGENT;

        let mut heap = std::collections::BinaryHeap::new();
        heap.push(low.clone());
        heap.push(normal_late.clone());
        heap.push(normal_early.clone());
        heap.push(urgent.clone());

        assert_eq!(heap.pop().unwrap().job_id, urgent.job_id);
        assert_eq!(heap.pop().unwrap().job_id, normal_early.job_id);
        assert_eq!(heap.pop().unwrap().job_id, normal_late.job_id);
        assert_eq!(heap.pop().unwrap().job_id, low.job_id);
    }
}
