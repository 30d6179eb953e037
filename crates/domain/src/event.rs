//! Structured events emitted on every state change.
//!
//! Mirrors the teacher's `TraceEvent`: a tagged enum serialized to JSON and
//! logged as a single `tracing` field, so downstream log pipelines can
//! parse it without a schema registry. Every event carries a unique id —
//! at-least-once delivery to subscribers is acceptable because consumers
//! dedupe on it (Design Note 6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{DiscussionId, EventId, MessageId, ParticipantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    StatusChanged {
        from: String,
        to: String,
    },
    TurnChanged {
        participant_id: Option<ParticipantId>,
        turn_number: u32,
    },
    ParticipantJoined {
        participant_id: ParticipantId,
        display_name: String,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    MessageSent {
        message_id: MessageId,
        participant_id: ParticipantId,
    },
    ReactionAdded {
        message_id: MessageId,
        participant_id: ParticipantId,
        emoji: String,
    },
}

impl EventData {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status_changed",
            Self::TurnChanged { .. } => "turn_changed",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
            Self::MessageSent { .. } => "message_sent",
            Self::ReactionAdded { .. } => "reaction_added",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub discussion_id: DiscussionId,
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl Event {
    pub fn new(discussion_id: DiscussionId, data: EventData, source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            discussion_id,
            data,
            timestamp,
            source: source.into(),
        }
    }

    /// Emit this event as a one-line structured JSON log record, the way
    /// `TraceEvent::emit` does for the teacher's context-building events.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(event = %json, "discussion_event");
    }

    /// JSON payload for a wire-level publish (`discussion.events` topic).
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_matches_closed_set() {
        let ev = EventData::MessageSent {
            message_id: MessageId::new(),
            participant_id: ParticipantId::new(),
        };
        assert_eq!(ev.type_name(), "message_sent");
    }

    #[test]
    fn event_has_unique_id_for_dedup() {
        let d = DiscussionId::new();
        let now = Utc::now();
        let e1 = Event::new(
            d,
            EventData::ParticipantLeft {
                participant_id: ParticipantId::new(),
            },
            "orchestrator",
            now,
        );
        let e2 = Event::new(
            d,
            EventData::ParticipantLeft {
                participant_id: ParticipantId::new(),
            },
            "orchestrator",
            now,
        );
        assert_ne!(e1.id, e2.id);
    }
}
