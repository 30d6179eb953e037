//! Event bus adapter (§4.2).
//!
//! Generalizes the teacher's `TraceEvent::emit` (one structured record,
//! logged and forgotten) into a real pub/sub boundary: publish is
//! fire-and-forget from the caller's point of view, and every message
//! carries a unique id so downstream consumers can dedupe under
//! at-least-once delivery. `InMemoryEventBus` is the reference adapter
//! used by tests and the demo binary; a production deployment would swap
//! in a real bus (Kafka, NATS, …) behind the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use oc_domain::{Error, Result};

pub const TOPIC_DISCUSSION_EVENTS: &str = "discussion.events";
pub const TOPIC_AGENT_PARTICIPATE: &str = "agent.discussion.participate";
pub const TOPIC_ENHANCEMENT_REQUEST: &str = "conversation.enhancement.request";

#[derive(Debug, Clone)]
pub struct BusMessage {
    pub id: Uuid,
    pub topic: String,
    pub payload: Value,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Fire-and-forget publish. Implementations must not block the
    /// caller on an unbounded retry loop (§5 — backpressure); dropping a
    /// message under saturation and logging it is acceptable, since
    /// at-least-once delivery is the bus layer's job, not this trait's.
    async fn publish(&self, topic: &str, payload: Value) -> Result<()>;

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage>;
}

const CHANNEL_CAPACITY: usize = 256;

pub struct InMemoryEventBus {
    topics: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        if let Some(tx) = self.topics.read().get(topic) {
            return tx.clone();
        }
        let mut topics = self.topics.write();
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()> {
        let tx = self.sender_for(topic);
        let message = BusMessage {
            id: Uuid::new_v4(),
            topic: topic.to_owned(),
            payload,
        };
        // No subscribers is not an error — it just means nobody's
        // listening on this topic right now.
        if tx.send(message).is_err() {
            tracing::debug!(topic, "published with no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.sender_for(topic).subscribe()
    }
}

/// Publish and swallow the error, as every caller in the orchestrator
/// must (§7 — bus errors are logged, never fail the command).
pub async fn publish_best_effort(bus: &dyn EventBus, topic: &str, payload: Value) {
    if let Err(err) = bus.publish(topic, payload).await {
        tracing::warn!(topic, error = %err, "event bus publish failed");
    }
}

impl From<broadcast::error::RecvError> for Error {
    fn from(err: broadcast::error::RecvError) -> Self {
        Error::Bus(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let bus = InMemoryEventBus::new();
        let mut rx = bus.subscribe(TOPIC_AGENT_PARTICIPATE);
        bus.publish(TOPIC_AGENT_PARTICIPATE, serde_json::json!({"x": 1}))
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, TOPIC_AGENT_PARTICIPATE);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = InMemoryEventBus::new();
        let result = bus.publish(TOPIC_DISCUSSION_EVENTS, serde_json::json!({})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn each_message_has_a_unique_id() {
        let bus = InMemoryEventBus::new();
        let mut rx = bus.subscribe(TOPIC_DISCUSSION_EVENTS);
        bus.publish(TOPIC_DISCUSSION_EVENTS, serde_json::json!({})).await.unwrap();
        bus.publish(TOPIC_DISCUSSION_EVENTS, serde_json::json!({})).await.unwrap();
        let m1 = rx.recv().await.unwrap();
        let m2 = rx.recv().await.unwrap();
        assert_ne!(m1.id, m2.id);
    }
}
