use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE Fan-Out Broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-job event multiplexing to N live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Bound on each subscriber's event queue; once full, a newly
    /// published event is dropped rather than blocking the publisher
    /// (drop-on-overflow favors liveness over completeness).
    /// Clamped to `1..=10_000`.
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,
    /// How long a subscriber read blocks before a synthetic `keepalive`
    /// event is emitted (seconds).
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// How often the broker polls for client disconnects (milliseconds).
    #[serde(default = "default_disconnect_poll_ms")]
    pub disconnect_poll_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_size: default_subscriber_buffer_size(),
            keepalive_secs: default_keepalive_secs(),
            disconnect_poll_ms: default_disconnect_poll_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn clamped(&self) -> Self {
        Self {
            subscriber_buffer_size: self.subscriber_buffer_size.clamp(1, 10_000),
            keepalive_secs: self.keepalive_secs.max(1),
            disconnect_poll_ms: self.disconnect_poll_ms.max(50),
        }
    }
}

fn default_subscriber_buffer_size() -> usize {
    100
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_disconnect_poll_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.subscriber_buffer_size, 100);
        assert_eq!(cfg.keepalive_secs, 30);
    }

    #[test]
    fn clamp_below_min() {
        let cfg = BrokerConfig {
            subscriber_buffer_size: 0,
            keepalive_secs: 0,
            disconnect_poll_ms: 0,
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.subscriber_buffer_size, 1);
        assert_eq!(clamped.keepalive_secs, 1);
        assert_eq!(clamped.disconnect_poll_ms, 50);
    }

    #[test]
    fn clamp_above_max() {
        let cfg = BrokerConfig {
            subscriber_buffer_size: 999_999,
            keepalive_secs: 30,
            disconnect_poll_ms: 1000,
        };
        assert_eq!(cfg.clamped().subscriber_buffer_size, 10_000);
    }

    #[test]
    fn deserialize_missing_uses_defaults() {
        let cfg: BrokerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.subscriber_buffer_size, 100);
    }
}
