//! SSE Fan-Out Broker (C7) — per-job multiplexing of job lifecycle and
//! streaming events to N live HTTP subscribers.
//!
//! Deliberately NOT built on `tokio::sync::broadcast`: broadcast drops the
//! *oldest* buffered item and reports a lag count to a lagging reader,
//! whereas this broker must drop the *newest* (incoming) event on a full
//! subscriber queue and keep every other subscriber's delivery order
//! intact. A bounded `tokio::sync::mpsc` with `try_send` gives exactly
//! that: non-blocking publish, drop-on-overflow, no cross-subscriber
//! coupling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use ra_domain::config::BrokerConfig;
use ra_domain::error::ErrorKind;
use ra_domain::trace::TraceEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One logical SSE frame: an event name plus its JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl BrokerEvent {
    fn new(event: &str, data: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

struct Subscriber {
    sender: mpsc::Sender<BrokerEvent>,
}

struct JobChannel {
    subscribers: HashMap<Uuid, Subscriber>,
    dropped_total: u64,
}

/// Handle returned by `subscribe`. Holds the broker it came from so the
/// slot is reclaimed on drop even if the holder never reaches a normal
/// unsubscribe call — e.g. an SSE stream future dropped mid-`.await` when
/// the client disconnects.
pub struct Subscription {
    pub job_id: Uuid,
    pub subscriber_id: Uuid,
    pub receiver: mpsc::Receiver<BrokerEvent>,
    broker: Arc<SseBroker>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.job_id, self.subscriber_id);
    }
}

pub struct SseBroker {
    jobs: RwLock<HashMap<Uuid, JobChannel>>,
    config: BrokerConfig,
    total_dropped: AtomicU64,
}

impl SseBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            config: config.clamped(),
            total_dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(self: &Arc<Self>, job_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer_size);
        let subscriber_id = Uuid::new_v4();

        let count = {
            let mut jobs = self.jobs.write();
            let channel = jobs.entry(job_id).or_insert_with(|| JobChannel {
                subscribers: HashMap::new(),
                dropped_total: 0,
            });
            channel.subscribers.insert(subscriber_id, Subscriber { sender: tx });
            channel.subscribers.len()
        };

        TraceEvent::BrokerSubscriberConnected {
            job_id: job_id.to_string(),
            subscriber_count: count,
        }
        .emit();

        Subscription {
            job_id,
            subscriber_id,
            receiver: rx,
            broker: self.clone(),
        }
    }

    pub fn unsubscribe(&self, job_id: Uuid, subscriber_id: Uuid) {
        let count = {
            let mut jobs = self.jobs.write();
            let Some(channel) = jobs.get_mut(&job_id) else {
                return;
            };
            channel.subscribers.remove(&subscriber_id);
            let remaining = channel.subscribers.len();
            if remaining == 0 {
                jobs.remove(&job_id);
            }
            remaining
        };

        TraceEvent::BrokerSubscriberDisconnected {
            job_id: job_id.to_string(),
            subscriber_count: count,
        }
        .emit();
    }

    /// Non-blocking fan-out to every subscriber of `job_id`. A subscriber
    /// whose queue is full has its event silently dropped; the broker
    /// never blocks the publisher.
    pub fn broadcast(&self, job_id: Uuid, event: BrokerEvent) {
        let mut dropped_this_call = 0u64;
        {
            let mut jobs = self.jobs.write();
            let Some(channel) = jobs.get_mut(&job_id) else {
                return;
            };
            for sub in channel.subscribers.values() {
                if sub.sender.try_send(event.clone()).is_err() {
                    dropped_this_call += 1;
                    channel.dropped_total += 1;
                }
            }
        }
        if dropped_this_call > 0 {
            let total = self.total_dropped.fetch_add(dropped_this_call, Ordering::Relaxed) + dropped_this_call;
            TraceEvent::BrokerEventDropped {
                job_id: job_id.to_string(),
                dropped_total: total,
            }
            .emit();
        }
    }

    pub fn stream_connected(&self, job_id: Uuid) {
        self.broadcast(
            job_id,
            BrokerEvent::new(
                "stream_connected",
                serde_json::json!({ "job_id": job_id, "message": "subscribed" }),
            ),
        );
    }

    pub fn job_progress(
        &self,
        job_id: Uuid,
        progress: f32,
        current_step: &str,
        steps_completed: Option<u32>,
        total_steps: Option<u32>,
    ) {
        self.broadcast(
            job_id,
            BrokerEvent::new(
                "job_progress",
                serde_json::json!({
                    "job_id": job_id,
                    "progress": progress,
                    "current_step": current_step,
                    "steps_completed": steps_completed,
                    "total_steps": total_steps,
                    "timestamp": Utc::now(),
                }),
            ),
        );
    }

    /// `status` is one of `submitted | started | completed | cancelled`
    /// (maps onto `job_submitted | job_started | job_completed |
    /// job_cancelled` event names).
    pub fn job_status(&self, job_id: Uuid, status: &str) {
        self.broadcast(
            job_id,
            BrokerEvent::new(
                &format!("job_{status}"),
                serde_json::json!({
                    "job_id": job_id,
                    "status": status,
                    "timestamp": Utc::now(),
                }),
            ),
        );
    }

    pub fn job_error(&self, job_id: Uuid, kind: ErrorKind, message: &str) {
        self.broadcast(
            job_id,
            BrokerEvent::new(
                "job_error",
                serde_json::json!({
                    "job_id": job_id,
                    "error_type": kind,
                    "error_message": message,
                    "timestamp": Utc::now(),
                }),
            ),
        );
    }

    pub fn chunk(&self, job_id: Uuid, text: &str) {
        self.broadcast(job_id, BrokerEvent::new("chunk", serde_json::json!(text)));
    }

    pub fn keepalive(&self, job_id: Uuid) {
        self.broadcast(job_id, BrokerEvent::new("keepalive", serde_json::json!({})));
    }

    pub fn keepalive_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.keepalive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_registers_and_unsubscribe_removes() {
        let broker = Arc::new(SseBroker::new(BrokerConfig::default()));
        let job_id = Uuid::new_v4();
        let sub = broker.subscribe(job_id);
        assert_eq!(broker.jobs.read().get(&job_id).unwrap().subscribers.len(), 1);
        broker.unsubscribe(job_id, sub.subscriber_id);
        assert!(broker.jobs.read().get(&job_id).is_none());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let broker = Arc::new(SseBroker::new(BrokerConfig::default()));
        let job_id = Uuid::new_v4();
        let sub = broker.subscribe(job_id);
        assert_eq!(broker.jobs.read().get(&job_id).unwrap().subscribers.len(), 1);
        drop(sub);
        assert!(broker.jobs.read().get(&job_id).is_none());
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscriber() {
        let broker = Arc::new(SseBroker::new(BrokerConfig::default()));
        let job_id = Uuid::new_v4();
        let mut sub = broker.subscribe(job_id);
        broker.chunk(job_id, "hello");
        let event = sub.receiver.recv().await.unwrap();
        assert_eq!(event.event, "chunk");
    }

    #[tokio::test]
    async fn overflow_drops_newest_event_and_counts_it() {
        let config = BrokerConfig {
            subscriber_buffer_size: 1,
            ..BrokerConfig::default()
        };
        let broker = Arc::new(SseBroker::new(config));
        let job_id = Uuid::new_v4();
        let mut sub = broker.subscribe(job_id);

        broker.chunk(job_id, "first");
        broker.chunk(job_id, "second"); // dropped: queue already full

        let first = sub.receiver.recv().await.unwrap();
        assert_eq!(first.data, serde_json::json!("first"));
        assert_eq!(broker.total_dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_job_is_a_silent_no_op() {
        let broker = SseBroker::new(BrokerConfig::default());
        broker.chunk(Uuid::new_v4(), "nobody listening");
    }

    #[tokio::test]
    async fn each_subscriber_sees_events_in_publish_order() {
        let broker = Arc::new(SseBroker::new(BrokerConfig::default()));
        let job_id = Uuid::new_v4();
        let mut sub = broker.subscribe(job_id);
        broker.chunk(job_id, "one");
        broker.chunk(job_id, "two");
        broker.chunk(job_id, "three");

        assert_eq!(sub.receiver.recv().await.unwrap().data, serde_json::json!("one"));
        assert_eq!(sub.receiver.recv().await.unwrap().data, serde_json::json!("two"));
        assert_eq!(sub.receiver.recv().await.unwrap().data, serde_json::json!("three"));
    }
}
