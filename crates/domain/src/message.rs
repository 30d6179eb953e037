//! Messages — append-only, from the core's point of view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DiscussionId, MessageId, ParticipantId};

/// The closed enumeration from §6. Unknown wire values degrade to
/// `Message` rather than failing — see [`MessageType::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Message,
    Question,
    Answer,
    Clarification,
    Objection,
    Agreement,
    Summary,
    Decision,
    ActionItem,
    System,
}

impl MessageType {
    /// Map an arbitrary caller-supplied string onto the closed set,
    /// falling back to `Message` for anything unrecognized (§6).
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "question" => Self::Question,
            "answer" => Self::Answer,
            "clarification" => Self::Clarification,
            "objection" => Self::Objection,
            "agreement" => Self::Agreement,
            "summary" => Self::Summary,
            "decision" => Self::Decision,
            "action_item" => Self::ActionItem,
            "system" => Self::System,
            "message" => Self::Message,
            _ => Self::Message,
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Message
    }
}

/// Typed answer to Design Note 1's "dynamic-typed metadata": a struct
/// with the one field the pipeline actually branches on
/// (`is_initial_participation`) plus a string-map escape hatch for
/// everything else callers attach.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub is_initial_participation: bool,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub discussion_id: DiscussionId,
    pub participant_id: ParticipantId,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(
        discussion_id: DiscussionId,
        participant_id: ParticipantId,
        content: impl Into<String>,
        message_type: MessageType,
        metadata: MessageMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            discussion_id,
            participant_id,
            content: content.into(),
            message_type,
            created_at,
            metadata,
        }
    }
}
