use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent Loop Engine budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-job reasoning/tool-execution budgets. Exhausting any one of these
/// gates the corresponding tool out of the toolkit rather than failing the
/// job outright; the engine keeps iterating with whatever tools remain
/// until a `final_answer` is produced or `max_iterations` is hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Hard ceiling on reasoning/tool-execution cycles per job.
    /// Clamped to `1..=100`.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Maximum `web_search` invocations per job. Clamped to `0..=50`.
    #[serde(default = "default_max_searches")]
    pub max_searches: u32,
    /// Maximum clarification round-trips per job. Clamped to `0..=10`.
    #[serde(default = "default_max_clarifications")]
    pub max_clarifications: u32,
    /// How long the engine waits for a clarification answer before failing
    /// the job (seconds).
    #[serde(default = "default_clarification_timeout_secs")]
    pub clarification_timeout_secs: u64,
    /// Which [`ReasoningStrategy`] the Job Executor instantiates:
    /// `planner_with_embedded_tool` (default), `native_tool_call`, or
    /// `two_phase`.
    #[serde(default = "default_reasoning_strategy")]
    pub reasoning_strategy: String,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_searches: default_max_searches(),
            max_clarifications: default_max_clarifications(),
            clarification_timeout_secs: default_clarification_timeout_secs(),
            reasoning_strategy: default_reasoning_strategy(),
        }
    }
}

impl AgentLoopConfig {
    /// Clamp every field into its documented range.
    pub fn clamped(&self) -> Self {
        Self {
            max_iterations: self.max_iterations.clamp(1, 100),
            max_searches: self.max_searches.clamp(0, 50),
            max_clarifications: self.max_clarifications.clamp(0, 10),
            clarification_timeout_secs: self.clarification_timeout_secs.clamp(1, 3600),
            reasoning_strategy: self.reasoning_strategy.clone(),
        }
    }
}

fn default_max_iterations() -> u32 {
    25
}
fn default_max_searches() -> u32 {
    8
}
fn default_max_clarifications() -> u32 {
    2
}
fn default_clarification_timeout_secs() -> u64 {
    300
}
fn default_reasoning_strategy() -> String {
    "planner_with_embedded_tool".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AgentLoopConfig::default();
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.max_searches, 8);
        assert_eq!(cfg.max_clarifications, 2);
    }

    #[test]
    fn clamp_below_min() {
        let cfg = AgentLoopConfig {
            max_iterations: 0,
            max_searches: 0,
            max_clarifications: 0,
            clarification_timeout_secs: 0,
            reasoning_strategy: default_reasoning_strategy(),
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.max_iterations, 1);
        assert_eq!(clamped.max_searches, 0);
        assert_eq!(clamped.clarification_timeout_secs, 1);
    }

    #[test]
    fn clamp_above_max() {
        let cfg = AgentLoopConfig {
            max_iterations: 1000,
            max_searches: 1000,
            max_clarifications: 1000,
            clarification_timeout_secs: 999_999,
            reasoning_strategy: default_reasoning_strategy(),
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.max_iterations, 100);
        assert_eq!(clamped.max_searches, 50);
        assert_eq!(clamped.max_clarifications, 10);
        assert_eq!(clamped.clarification_timeout_secs, 3600);
    }

    #[test]
    fn deserialize_missing_uses_defaults() {
        let cfg: AgentLoopConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.max_iterations, 25);
    }
}
