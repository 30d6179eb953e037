//! Participants — seats in a discussion, owned by either a user or an
//! agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, DiscussionId, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    Agent,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub discussion_id: DiscussionId,
    pub participant_type: ParticipantType,
    /// Set when `participant_type == Agent`.
    pub agent_id: Option<AgentId>,
    /// Set when `participant_type == User`.
    pub user_id: Option<String>,
    pub role: String,
    pub display_name: String,
    pub active: bool,
    /// When this participant joined the discussion. Round-robin ordering
    /// rotates over active participants sorted by this field, giving a
    /// stable join order independent of id generation.
    pub joined_at: DateTime<Utc>,
    pub message_count: u32,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Running tally of accepted contributions; used by `context_aware`
    /// to rank least-recently-spoken participants.
    pub contribution_score: f32,
    /// Bounded to `[0.0, 1.0]`.
    pub engagement_level: f32,
}

impl Participant {
    pub fn new_agent(
        discussion_id: DiscussionId,
        agent_id: AgentId,
        role: impl Into<String>,
        display_name: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            discussion_id,
            participant_type: ParticipantType::Agent,
            agent_id: Some(agent_id),
            user_id: None,
            role: role.into(),
            display_name: display_name.into(),
            active: true,
            joined_at,
            message_count: 0,
            last_message_at: None,
            contribution_score: 0.0,
            engagement_level: 0.0,
        }
    }

    pub fn new_user(
        discussion_id: DiscussionId,
        user_id: impl Into<String>,
        role: impl Into<String>,
        display_name: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            discussion_id,
            participant_type: ParticipantType::User,
            agent_id: None,
            user_id: Some(user_id.into()),
            role: role.into(),
            display_name: display_name.into(),
            active: true,
            joined_at,
            message_count: 0,
            last_message_at: None,
            contribution_score: 0.0,
            engagement_level: 0.0,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self.participant_type, ParticipantType::Agent)
    }

    /// Additive activity update applied after every accepted message:
    /// message count +1, contribution +1, engagement +0.1 clamped to 1.0.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.message_count += 1;
        self.contribution_score += 1.0;
        self.engagement_level = (self.engagement_level + 0.1).min(1.0);
        self.last_message_at = Some(now);
    }

    /// Tombstone rather than delete — removed participants keep their
    /// history but stop being eligible for turns or triggers.
    pub fn tombstone(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_update_is_additive_and_clamped() {
        let now = Utc::now();
        let mut p = Participant::new_agent(
            DiscussionId::new(),
            "agent-1".into(),
            "panelist",
            "Agent One",
            now,
        );
        for _ in 0..20 {
            p.record_activity(now);
        }
        assert_eq!(p.message_count, 20);
        assert_eq!(p.contribution_score, 20.0);
        assert!(p.engagement_level <= 1.0);
        assert_eq!(p.engagement_level, 1.0);
    }

    #[test]
    fn tombstone_deactivates_without_deleting() {
        let mut p = Participant::new_user(DiscussionId::new(), "u1", "member", "User One", Utc::now());
        p.tombstone();
        assert!(!p.active);
        assert_eq!(p.user_id.as_deref(), Some("u1"));
    }
}
