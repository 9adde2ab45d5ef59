//! Job Queue & Lifecycle Manager (C6), built over the passive
//! [`JobRecord`] (C5) value object.
//!
//! Pending jobs are held in a priority-ordered max-heap (highest priority,
//! then earliest `created_at`, pops first); running/completed state lives
//! in one authoritative map so progress updates never have to reconcile
//! across three separate collections. A `tokio::sync::Semaphore` caps how
//! many jobs `next()` will hand out concurrently.

use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock as SyncRwLock;
use ra_domain::config::QueueConfig;
use ra_domain::error::{Error, Result};
use ra_domain::job::{JobError, JobRecord, JobRequest, JobResult, JobState};
use ra_domain::trace::TraceEvent;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

struct Inner {
    all: HashMap<Uuid, JobRecord>,
    pending_heap: BinaryHeap<JobRecord>,
}

/// A record popped off the pending queue and transitioned to `Running`,
/// paired with the semaphore permit and cancellation flag the executor
/// must hold/poll for the job's duration.
pub struct AcquiredJob {
    pub record: JobRecord,
    pub cancel_flag: Arc<AtomicBool>,
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<JobState>,
    pub tags: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub jobs: Vec<JobRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

type StateListener = dyn Fn(&JobRecord, &str) + Send + Sync;

pub struct JobQueue {
    inner: Mutex<Inner>,
    semaphore: Arc<Semaphore>,
    config: QueueConfig,
    listeners: SyncRwLock<Vec<Box<StateListener>>>,
    cancel_flags: SyncRwLock<HashMap<Uuid, Arc<AtomicBool>>>,
    new_job_notify: Notify,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        let config = config.clamped();
        Self {
            inner: Mutex::new(Inner {
                all: HashMap::new(),
                pending_heap: BinaryHeap::new(),
            }),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            config,
            listeners: SyncRwLock::new(Vec::new()),
            cancel_flags: SyncRwLock::new(HashMap::new()),
            new_job_notify: Notify::new(),
        }
    }

    pub fn add_state_listener(&self, callback: impl Fn(&JobRecord, &str) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(callback));
    }

    fn notify_listeners(&self, rec: &JobRecord, event: &str) {
        let listeners = self.listeners.read();
        for cb in listeners.iter() {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(rec, event))).is_err() {
                tracing::error!(job = %rec.job_id, event, "queue: state listener panicked, isolating");
            }
        }
    }

    // ── Admission & lookup ──────────────────────────────────────────

    pub async fn submit(&self, request: JobRequest) -> Result<Uuid> {
        if request.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if request.deep_level > 5 {
            return Err(Error::Validation("deep_level must be in 0..=5".into()));
        }
        if !(-100..=100).contains(&request.priority.0) {
            return Err(Error::Validation("priority must be in -100..=100".into()));
        }
        if request.tags.len() > 10 {
            return Err(Error::Validation("at most 10 tags are allowed".into()));
        }

        let mut inner = self.inner.lock().await;
        if inner.all.len() >= self.config.queue_ceiling {
            return Err(Error::QueueFull);
        }

        let job_id = Uuid::new_v4();
        let record = JobRecord::new(job_id, request, Utc::now());
        let total_steps = record.total_steps;
        let priority = record.priority.0;
        let deep_level = record.deep_level;
        let agent_type = record.agent_type.clone();

        inner.pending_heap.push(record.clone());
        inner.all.insert(job_id, record.clone());
        drop(inner);

        self.persist_one(record.clone());
        self.notify_listeners(&record, "submitted");
        self.new_job_notify.notify_waiters();
        TraceEvent::JobSubmitted {
            job_id: job_id.to_string(),
            agent_type,
            deep_level,
            priority,
            total_steps,
        }
        .emit();

        Ok(job_id)
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.inner.lock().await.all.get(&job_id).cloned()
    }

    pub async fn list(&self, filter: ListFilter) -> ListResult {
        let mut matched: Vec<JobRecord> = {
            let inner = self.inner.lock().await;
            inner
                .all
                .values()
                .filter(|r| filter.status.map(|s| r.state == s).unwrap_or(true))
                .filter(|r| filter.tags.is_empty() || filter.tags.iter().any(|t| r.tags.contains(t)))
                .cloned()
                .collect()
        };
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len();
        let limit = if filter.limit == 0 { 20 } else { filter.limit.min(100) };
        let offset = filter.offset;
        let jobs = matched.into_iter().skip(offset).take(limit).collect();

        ListResult {
            jobs,
            total,
            limit,
            offset,
        }
    }

    pub async fn cancel(&self, job_id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(rec) = inner.all.get_mut(&job_id) else {
            return false;
        };
        if rec.state.is_terminal() {
            return false;
        }
        let was_running = rec.state == JobState::Running;
        rec.mark_cancelled(Utc::now());
        let rec = rec.clone();
        drop(inner);

        if was_running {
            if let Some(flag) = self.cancel_flags.read().get(&job_id) {
                flag.store(true, Ordering::SeqCst);
            }
        }
        self.cancel_flags.write().remove(&job_id);

        self.persist_one(rec.clone());
        self.notify_listeners(&rec, "cancelled");
        TraceEvent::JobStateChanged {
            job_id: job_id.to_string(),
            from: if was_running { "running".into() } else { "pending".into() },
            to: "cancelled".into(),
        }
        .emit();
        true
    }

    // ── Worker-facing ────────────────────────────────────────────────

    /// Block until a concurrency slot and a pending job are both
    /// available, then transition the job to `Running`.
    pub async fn next(&self) -> AcquiredJob {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("queue semaphore is never closed");

        loop {
            let candidate = {
                let mut inner = self.inner.lock().await;
                inner.pending_heap.pop()
            };
            let Some(candidate) = candidate else {
                self.new_job_notify.notified().await;
                continue;
            };

            let mut inner = self.inner.lock().await;
            let Some(current) = inner.all.get(&candidate.job_id).cloned() else {
                continue;
            };
            if current.state != JobState::Pending {
                // Cancelled (or otherwise moved on) while it sat in the heap.
                continue;
            }

            let mut rec = current;
            rec.mark_running(Utc::now());
            inner.all.insert(rec.job_id, rec.clone());
            drop(inner);

            let cancel_flag = Arc::new(AtomicBool::new(false));
            self.cancel_flags.write().insert(rec.job_id, cancel_flag.clone());

            self.persist_one(rec.clone());
            self.notify_listeners(&rec, "started");
            TraceEvent::JobStateChanged {
                job_id: rec.job_id.to_string(),
                from: "pending".into(),
                to: "running".into(),
            }
            .emit();

            return AcquiredJob {
                record: rec,
                cancel_flag,
                _permit: permit,
            };
        }
    }

    pub async fn mark_completed(&self, job_id: Uuid, result: JobResult) {
        let rec = {
            let mut inner = self.inner.lock().await;
            let Some(rec) = inner.all.get_mut(&job_id) else {
                return;
            };
            rec.mark_completed(Utc::now(), result);
            rec.clone()
        };
        self.cancel_flags.write().remove(&job_id);
        self.persist_one(rec.clone());
        self.notify_listeners(&rec, "completed");
        TraceEvent::JobStateChanged {
            job_id: job_id.to_string(),
            from: "running".into(),
            to: "completed".into(),
        }
        .emit();
    }

    pub async fn mark_failed(&self, job_id: Uuid, error: JobError) {
        let rec = {
            let mut inner = self.inner.lock().await;
            let Some(rec) = inner.all.get_mut(&job_id) else {
                return;
            };
            rec.mark_failed(Utc::now(), error);
            rec.clone()
        };
        self.cancel_flags.write().remove(&job_id);
        self.persist_one(rec.clone());
        self.notify_listeners(&rec, "failed");
        TraceEvent::JobStateChanged {
            job_id: job_id.to_string(),
            from: "running".into(),
            to: "failed".into(),
        }
        .emit();
    }

    pub async fn update_progress(
        &self,
        job_id: Uuid,
        steps_completed: u32,
        current_step: impl Into<String>,
        searches_used: Option<u32>,
        sources_found: Option<u32>,
    ) {
        let rec = {
            let mut inner = self.inner.lock().await;
            let Some(rec) = inner.all.get_mut(&job_id) else {
                return;
            };
            rec.update_progress(steps_completed, current_step);
            if let Some(s) = searches_used {
                rec.searches_used = s;
            }
            if let Some(s) = sources_found {
                rec.sources_found = s;
            }
            rec.clone()
        };
        self.notify_listeners(&rec, "progress");
        TraceEvent::JobProgressUpdated {
            job_id: job_id.to_string(),
            progress: rec.progress,
            current_step: rec.current_step.clone(),
        }
        .emit();
    }

    // ── Persistence & recovery ───────────────────────────────────────

    fn persist_one(&self, rec: JobRecord) {
        let dir = self.config.persistence_dir.clone();
        tokio::spawn(async move {
            if let Err(e) = persist_job_record(&dir, &rec).await {
                tracing::warn!(job = %rec.job_id, error = %e, "queue: failed to persist job record");
            }
        });
    }

    /// Snapshot every tracked job to disk. Called by the periodic
    /// persistence worker and once more on graceful shutdown.
    pub async fn snapshot_all(&self) {
        let start = Instant::now();
        let records: Vec<JobRecord> = {
            let inner = self.inner.lock().await;
            inner.all.values().cloned().collect()
        };
        let count = records.len();
        for rec in &records {
            if let Err(e) = persist_job_record(&self.config.persistence_dir, rec).await {
                tracing::warn!(job = %rec.job_id, error = %e, "queue: snapshot persist failed");
            }
        }
        TraceEvent::QueuePersisted {
            job_count: count,
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
    }

    /// Load every persisted record, demoting interrupted `Running` jobs
    /// back to `Pending` and re-enqueuing pending work in priority order.
    /// Called once at startup, before the queue accepts new submissions.
    pub async fn recover(&self) {
        let dir = self.config.persistence_dir.clone();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(_) => {
                tracing::info!(dir = %dir.display(), "queue: no persistence directory to recover from");
                return;
            }
        };

        let mut pending = 0usize;
        let mut requeued_from_running = 0usize;
        let mut inner = self.inner.lock().await;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "queue recovery: failed to read directory entry");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "queue recovery: unreadable file, skipping");
                    continue;
                }
            };
            let mut rec: JobRecord = match serde_json::from_slice(&bytes) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "queue recovery: corrupt record, skipping");
                    continue;
                }
            };

            match rec.state {
                JobState::Running => {
                    rec.demote_to_pending();
                    inner.pending_heap.push(rec.clone());
                    inner.all.insert(rec.job_id, rec);
                    requeued_from_running += 1;
                }
                JobState::Pending => {
                    inner.pending_heap.push(rec.clone());
                    inner.all.insert(rec.job_id, rec);
                    pending += 1;
                }
                _ => {
                    inner.all.insert(rec.job_id, rec);
                }
            }
        }
        drop(inner);

        TraceEvent::QueueRecoveredOnStartup {
            pending,
            requeued_from_running,
        }
        .emit();
    }

    /// Remove terminal records (and their persisted files) older than the
    /// configured retention horizon. Called by the hourly cleanup worker.
    pub async fn cleanup_expired(&self) {
        let retention = chrono::Duration::seconds(self.config.completed_retention_secs as i64);
        let now = Utc::now();
        let expired: Vec<Uuid> = {
            let mut inner = self.inner.lock().await;
            let ids: Vec<Uuid> = inner
                .all
                .values()
                .filter(|r| r.state.is_terminal())
                .filter(|r| r.completed_at.map(|t| now - t > retention).unwrap_or(false))
                .map(|r| r.job_id)
                .collect();
            for id in &ids {
                inner.all.remove(id);
            }
            ids
        };

        let dir = self.config.persistence_dir.clone();
        for id in expired {
            let path = dir.join(format!("{id}.json"));
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(job = %id, error = %e, "queue cleanup: failed to remove persisted file");
                }
            }
        }
    }
}

async fn persist_job_record(dir: &Path, rec: &JobRecord) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let tmp = dir.join(format!("{}.json.tmp", rec.job_id));
    let final_path = dir.join(format!("{}.json", rec.job_id));
    let body = serde_json::to_vec_pretty(rec)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, &final_path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra_domain::job::Priority;
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn request(query: &str) -> JobRequest {
        JobRequest {
            query: query.into(),
            agent_type: "research".into(),
            deep_level: 1,
            priority: Priority::NORMAL,
            tags: HashSet::new(),
            metadata: StdHashMap::new(),
        }
    }

    fn queue_with_tempdir() -> (JobQueue, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            persistence_dir: dir.path().to_path_buf(),
            max_concurrent_jobs: 2,
            ..QueueConfig::default()
        };
        (JobQueue::new(config), dir)
    }

    #[tokio::test]
    async fn submit_rejects_empty_query() {
        let (queue, _dir) = queue_with_tempdir();
        let err = queue.submit(request("   ")).await.unwrap_err();
        assert_eq!(err.kind(), ra_domain::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn submit_rejects_too_many_tags() {
        let (queue, _dir) = queue_with_tempdir();
        let mut req = request("q");
        req.tags = (0..11).map(|i| i.to_string()).collect();
        let err = queue.submit(req).await.unwrap_err();
        assert_eq!(err.kind(), ra_domain::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn submit_fails_when_queue_full() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            persistence_dir: dir.path().to_path_buf(),
            queue_ceiling: 1,
            max_concurrent_jobs: 1,
            ..QueueConfig::default()
        };
        let queue = JobQueue::new(config);
        queue.submit(request("first")).await.unwrap();
        let err = queue.submit(request("second")).await.unwrap_err();
        assert_eq!(err.kind(), ra_domain::error::ErrorKind::QueueFull);
    }

    #[tokio::test]
    async fn next_pops_highest_priority_first() {
        let (queue, _dir) = queue_with_tempdir();
        let mut low = request("low");
        low.priority = Priority::LOW;
        let mut urgent = request("urgent");
        urgent.priority = Priority::URGENT;
        queue.submit(low).await.unwrap();
        let urgent_id = queue.submit(urgent).await.unwrap();

        let acquired = queue.next().await;
        assert_eq!(acquired.record.job_id, urgent_id);
        assert_eq!(acquired.record.state, JobState::Running);
    }

    #[tokio::test]
    async fn cancel_pending_job_marks_cancelled_and_is_skipped_by_next() {
        let (queue, _dir) = queue_with_tempdir();
        let id = queue.submit(request("to cancel")).await.unwrap();
        assert!(queue.cancel(id).await);

        let other_id = queue.submit(request("still pending")).await.unwrap();
        let acquired = queue.next().await;
        assert_eq!(acquired.record.job_id, other_id);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_terminal_jobs() {
        let (queue, _dir) = queue_with_tempdir();
        let id = queue.submit(request("q")).await.unwrap();
        assert!(queue.cancel(id).await);
        assert!(!queue.cancel(id).await);
    }

    #[tokio::test]
    async fn cancel_unknown_job_returns_false() {
        let (queue, _dir) = queue_with_tempdir();
        assert!(!queue.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn mark_completed_transitions_state_and_clears_cancel_flag() {
        let (queue, _dir) = queue_with_tempdir();
        queue.submit(request("q")).await.unwrap();
        let acquired = queue.next().await;
        queue
            .mark_completed(
                acquired.record.job_id,
                JobResult {
                    answer: "done".into(),
                    sources: vec![],
                    searches_used: 1,
                    sources_found: 1,
                    artifact_paths: vec![],
                },
            )
            .await;
        let rec = queue.get(acquired.record.job_id).await.unwrap();
        assert_eq!(rec.state, JobState::Completed);
        assert_eq!(rec.progress, 100.0);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_paginates() {
        let (queue, _dir) = queue_with_tempdir();
        for i in 0..3 {
            queue.submit(request(&format!("q{i}"))).await.unwrap();
        }
        let cancel_id = queue.submit(request("to cancel")).await.unwrap();
        queue.cancel(cancel_id).await;

        let pending = queue
            .list(ListFilter {
                status: Some(JobState::Pending),
                ..Default::default()
            })
            .await;
        assert_eq!(pending.total, 3);

        let page = queue
            .list(ListFilter {
                limit: 2,
                offset: 1,
                ..Default::default()
            })
            .await;
        assert_eq!(page.jobs.len(), 2);
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn recover_demotes_running_and_requeues_pending() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            persistence_dir: dir.path().to_path_buf(),
            ..QueueConfig::default()
        };
        let queue = JobQueue::new(config.clone());
        queue.submit(request("pending one")).await.unwrap();
        let acquired_id = {
            let acquired = queue.next().await;
            acquired.record.job_id
        };
        queue.snapshot_all().await;

        let fresh_queue = JobQueue::new(config);
        fresh_queue.recover().await;

        let recovered_running = fresh_queue.get(acquired_id).await.unwrap();
        assert_eq!(recovered_running.state, JobState::Pending);

        let acquired = fresh_queue.next().await;
        assert_eq!(acquired.record.state, JobState::Running);
    }

    #[tokio::test]
    async fn state_listener_is_invoked_and_panics_are_isolated() {
        let (queue, _dir) = queue_with_tempdir();
        let events: Arc<parking_lot::Mutex<Vec<String>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let events_clone = events.clone();
        queue.add_state_listener(move |_rec, event| {
            events_clone.lock().push(event.to_string());
        });
        queue.add_state_listener(|_rec, _event| panic!("listener misbehaves"));

        queue.submit(request("q")).await.unwrap();
        assert_eq!(events.lock().as_slice(), &["submitted".to_string()]);
    }
}
