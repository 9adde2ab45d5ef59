use serde::Serialize;

/// Structured trace events emitted across all research-agent crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    JobSubmitted {
        job_id: String,
        agent_type: String,
        deep_level: u8,
        priority: i32,
        total_steps: u32,
    },
    JobStateChanged {
        job_id: String,
        from: String,
        to: String,
    },
    JobProgressUpdated {
        job_id: String,
        progress: f32,
        current_step: String,
    },
    AgentLoopIteration {
        job_id: String,
        iteration: u32,
        strategy: String,
        tool_name: Option<String>,
    },
    ToolCallStarted {
        job_id: String,
        call_id: String,
        tool_name: String,
    },
    ToolCallFinished {
        job_id: String,
        call_id: String,
        tool_name: String,
        duration_ms: u64,
        is_error: bool,
    },
    ClarificationRequested {
        job_id: String,
        clarifications_used: u32,
    },
    ClarificationProvided {
        job_id: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRequestFailed {
        provider: String,
        model: String,
        attempt: u32,
        error: String,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    BrokerSubscriberConnected {
        job_id: String,
        subscriber_count: usize,
    },
    BrokerSubscriberDisconnected {
        job_id: String,
        subscriber_count: usize,
    },
    BrokerEventDropped {
        job_id: String,
        dropped_total: u64,
    },
    QueuePersisted {
        job_count: usize,
        duration_ms: u64,
    },
    QueueRecoveredOnStartup {
        pending: usize,
        requeued_from_running: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ra_event");
    }
}
