use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job Queue & Lifecycle Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bounded-concurrency, priority-ordered job admission and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Size of the concurrency semaphore gating running executors.
    /// Clamped to `1..=64`.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Total tracked jobs (pending + running + completed) above which
    /// `submit` fails with `QUEUE_FULL`. Clamped to `max_concurrent_jobs..=100_000`.
    #[serde(default = "default_queue_ceiling")]
    pub queue_ceiling: usize,
    /// How long a terminal job record is retained before the cleanup
    /// sweep deletes it and its persisted file (seconds). Default 24h.
    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,
    /// How often the cleanup sweep runs (seconds).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// How often the full job table is snapshotted to disk (seconds).
    #[serde(default = "default_persistence_interval_secs")]
    pub persistence_interval_secs: u64,
    /// Directory holding one `{job_id}.json` file per job.
    #[serde(default = "default_persistence_dir")]
    pub persistence_dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_ceiling: default_queue_ceiling(),
            completed_retention_secs: default_completed_retention_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            persistence_interval_secs: default_persistence_interval_secs(),
            persistence_dir: default_persistence_dir(),
        }
    }
}

impl QueueConfig {
    /// Clamp `max_concurrent_jobs` to `1..=64` and `queue_ceiling` to be at
    /// least as large as the (already-clamped) concurrency limit.
    pub fn clamped(&self) -> Self {
        let max_concurrent_jobs = self.max_concurrent_jobs.clamp(1, 64);
        let queue_ceiling = self.queue_ceiling.clamp(max_concurrent_jobs, 100_000);
        Self {
            max_concurrent_jobs,
            queue_ceiling,
            completed_retention_secs: self.completed_retention_secs.max(1),
            cleanup_interval_secs: self.cleanup_interval_secs.max(1),
            persistence_interval_secs: self.persistence_interval_secs.max(1),
            persistence_dir: self.persistence_dir.clone(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    3
}
fn default_queue_ceiling() -> usize {
    1000
}
fn default_completed_retention_secs() -> u64 {
    24 * 3600
}
fn default_cleanup_interval_secs() -> u64 {
    3600
}
fn default_persistence_interval_secs() -> u64 {
    60
}
fn default_persistence_dir() -> PathBuf {
    PathBuf::from("./data/jobs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.max_concurrent_jobs, 3);
        assert_eq!(cfg.completed_retention_secs, 24 * 3600);
    }

    #[test]
    fn clamp_raises_ceiling_to_at_least_concurrency() {
        let cfg = QueueConfig {
            max_concurrent_jobs: 10,
            queue_ceiling: 2,
            ..QueueConfig::default()
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.max_concurrent_jobs, 10);
        assert_eq!(clamped.queue_ceiling, 10);
    }

    #[test]
    fn clamp_bounds_concurrency() {
        let cfg = QueueConfig {
            max_concurrent_jobs: 0,
            ..QueueConfig::default()
        };
        assert_eq!(cfg.clamped().max_concurrent_jobs, 1);

        let cfg = QueueConfig {
            max_concurrent_jobs: 1000,
            ..QueueConfig::default()
        };
        assert_eq!(cfg.clamped().max_concurrent_jobs, 64);
    }

    #[test]
    fn deserialize_missing_uses_defaults() {
        let cfg: QueueConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.max_concurrent_jobs, 3);
        assert_eq!(cfg.persistence_dir, PathBuf::from("./data/jobs"));
    }
}
