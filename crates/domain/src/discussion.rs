//! The discussion — root entity and distributed state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ids::{DiscussionId, ParticipantId};
use crate::turn_strategy::TurnStrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
    Cancelled,
}

/// Whether the discussion is still waiting for agents to speak for the
/// first time, or has moved into steady-state turn-taking (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Introduction,
    Main,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionSettings {
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default)]
    pub auto_moderation: bool,
    #[serde(default)]
    pub allow_reactions: bool,
}

fn default_max_participants() -> u32 {
    10
}
fn default_turn_timeout_secs() -> u64 {
    10
}
fn default_max_messages() -> u32 {
    100
}

impl Default for DiscussionSettings {
    fn default() -> Self {
        Self {
            max_participants: default_max_participants(),
            turn_timeout_secs: default_turn_timeout_secs(),
            max_messages: default_max_messages(),
            auto_moderation: false,
            allow_reactions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub current_turn: Option<ParticipantId>,
    pub turn_number: u32,
    pub turn_started_at: Option<DateTime<Utc>>,
    pub expected_end_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub message_count: u32,
    pub last_activity_at: DateTime<Utc>,
}

impl TurnState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            current_turn: None,
            turn_number: 0,
            turn_started_at: None,
            expected_end_at: None,
            phase: Phase::Introduction,
            message_count: 0,
            last_activity_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub title: String,
    pub topic: String,
    pub description: String,
    pub creator_id: String,
    pub status: DiscussionStatus,
    pub turn_strategy: TurnStrategyConfig,
    pub settings: DiscussionSettings,
    pub runtime: TurnState,
    pub metadata: HashMap<String, String>,
}

impl Discussion {
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        description: impl Into<String>,
        creator_id: impl Into<String>,
        turn_strategy: TurnStrategyConfig,
        settings: DiscussionSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DiscussionId::new(),
            title: title.into(),
            topic: topic.into(),
            description: description.into(),
            creator_id: creator_id.into(),
            status: DiscussionStatus::Draft,
            turn_strategy,
            settings,
            runtime: TurnState::fresh(now),
            metadata: HashMap::new(),
        }
    }

    /// §4.8: the only legal lifecycle edges. Returns the resolved target
    /// state or an `INVALID_STATE` error naming the illegal edge.
    pub fn check_transition(&self, to: DiscussionStatus) -> Result<()> {
        use DiscussionStatus::*;
        let ok = match (self.status, to) {
            (_, Archived) | (_, Cancelled) => true,
            (Draft, Active) => true,
            (Active, Paused) => true,
            (Paused, Active) => true,
            (Active, Completed) | (Paused, Completed) => true,
            (from, target) if from == target => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot transition from {:?} to {:?}",
                self.status, to
            )))
        }
    }

    /// Invariant 7: crossing the message cap transitions to `completed`.
    pub fn at_message_cap(&self) -> bool {
        self.runtime.message_count >= self.settings.max_messages
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.runtime.last_activity_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn_strategy::TurnStrategyConfig;

    fn sample() -> Discussion {
        Discussion::new(
            "Title",
            "Topic",
            "Desc",
            "creator-1",
            TurnStrategyConfig::RoundRobin { order_seed: 0 },
            DiscussionSettings::default(),
            Utc::now(),
        )
    }

    #[test]
    fn draft_can_start() {
        let d = sample();
        assert!(d.check_transition(DiscussionStatus::Active).is_ok());
    }

    #[test]
    fn draft_cannot_pause() {
        let d = sample();
        assert!(d.check_transition(DiscussionStatus::Paused).is_err());
    }

    #[test]
    fn any_state_can_archive_or_cancel() {
        let mut d = sample();
        d.status = DiscussionStatus::Completed;
        assert!(d.check_transition(DiscussionStatus::Archived).is_ok());
        assert!(d.check_transition(DiscussionStatus::Cancelled).is_ok());
    }

    #[test]
    fn pause_of_paused_is_idempotent_noop() {
        let mut d = sample();
        d.status = DiscussionStatus::Paused;
        assert!(d.check_transition(DiscussionStatus::Paused).is_ok());
    }

    #[test]
    fn message_cap_detection() {
        let mut d = sample();
        d.settings.max_messages = 5;
        d.runtime.message_count = 5;
        assert!(d.at_message_cap());
    }
}
