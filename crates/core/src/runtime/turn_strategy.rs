//! Pluggable turn-scheduling policy: one trait, one concrete adapter per
//! `TurnStrategyConfig` variant, selected by a factory (`build_strategy`)
//! from a discussion's persisted configuration. Structured as a trait
//! object the same way `LlmProvider` structures provider polymorphism —
//! a single `Send + Sync` trait over plain request/response-shaped data.

use oc_domain::{Discussion, Message, Participant, ParticipantId, TurnStrategyConfig};

/// What the strategy decided for the next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDecision {
    pub next_participant: Option<ParticipantId>,
    pub turn_number: u32,
    pub estimated_duration_secs: u64,
}

pub trait TurnStrategy: Send + Sync {
    /// Decide who speaks next, given the discussion, its currently active
    /// participants, and the message history (newest last).
    fn next_turn(
        &self,
        discussion: &Discussion,
        active: &[Participant],
        messages: &[Message],
    ) -> TurnDecision;

    /// Whether `participant` may currently post a non-initial message.
    /// Free-form strategies never enforce turn ownership.
    fn can_participate(&self, discussion: &Discussion, participant: &Participant) -> bool;

    fn is_free_form(&self) -> bool {
        false
    }

    /// Called once a decision has been applied to the discussion (new
    /// `current_turn` already set), so a strategy carrying its own
    /// stateful config — currently only `moderated`'s request queue — can
    /// update itself. Default: no-op.
    fn on_turn_applied(&self, _discussion: &mut Discussion, _decision: &TurnDecision) {}
}

/// Build the strategy object for a discussion's persisted configuration.
pub fn build_strategy(config: &TurnStrategyConfig) -> Box<dyn TurnStrategy> {
    match config {
        TurnStrategyConfig::RoundRobin { .. } => Box::new(RoundRobinStrategy),
        TurnStrategyConfig::ContextAware => Box::new(ContextAwareStrategy),
        TurnStrategyConfig::Moderated {
            moderator_participant_id,
            ..
        } => Box::new(ModeratedStrategy {
            moderator_participant_id: *moderator_participant_id,
        }),
        TurnStrategyConfig::FreeForm => Box::new(FreeFormStrategy),
    }
}

/// Participants sorted by `joined_at` ascending — the stable insertion
/// order round-robin and context-aware rotation both rely on.
pub(crate) fn stable_order(active: &[Participant]) -> Vec<&Participant> {
    let mut ordered: Vec<&Participant> = active.iter().collect();
    ordered.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
    ordered
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// round_robin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deterministic rotation over active participants in stable insertion
/// order. When a participant is removed the rotation closes the gap
/// naturally, since it only ever indexes into the *current* active set.
pub struct RoundRobinStrategy;

impl TurnStrategy for RoundRobinStrategy {
    fn next_turn(
        &self,
        discussion: &Discussion,
        active: &[Participant],
        _messages: &[Message],
    ) -> TurnDecision {
        let ordered = stable_order(active);
        if ordered.is_empty() {
            return TurnDecision {
                next_participant: None,
                turn_number: discussion.runtime.turn_number,
                estimated_duration_secs: discussion.settings.turn_timeout_secs,
            };
        }

        let current_index = discussion
            .runtime
            .current_turn
            .and_then(|id| ordered.iter().position(|p| p.id == id));

        let next_index = match current_index {
            Some(i) => (i + 1) % ordered.len(),
            None => 0,
        };

        TurnDecision {
            next_participant: Some(ordered[next_index].id),
            turn_number: discussion.runtime.turn_number + 1,
            estimated_duration_secs: discussion.settings.turn_timeout_secs,
        }
    }

    fn can_participate(&self, discussion: &Discussion, participant: &Participant) -> bool {
        match discussion.runtime.current_turn {
            Some(owner) => owner == participant.id,
            None => true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// context_aware
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Selects the least-recently-spoken eligible participant; if the previous
/// message ends with a question directed by `@mention`, the mentioned
/// participant wins instead. Falls back to round-robin ordering when no
/// participant has ever spoken.
pub struct ContextAwareStrategy;

impl ContextAwareStrategy {
    /// A trailing `@mention` naming an active participant's display name,
    /// when the message reads as a directed question.
    fn mentioned_participant<'a>(
        message: &Message,
        active: &'a [Participant],
    ) -> Option<&'a Participant> {
        if !message.content.trim_end().ends_with('?') {
            return None;
        }
        active.iter().find(|p| {
            let mention = format!("@{}", p.display_name);
            message.content.contains(&mention)
        })
    }
}

impl TurnStrategy for ContextAwareStrategy {
    fn next_turn(
        &self,
        discussion: &Discussion,
        active: &[Participant],
        messages: &[Message],
    ) -> TurnDecision {
        if let Some(mentioned) = messages.last().and_then(|m| Self::mentioned_participant(m, active))
        {
            return TurnDecision {
                next_participant: Some(mentioned.id),
                turn_number: discussion.runtime.turn_number + 1,
                estimated_duration_secs: discussion.settings.turn_timeout_secs,
            };
        }

        let ordered = stable_order(active);
        if ordered.is_empty() {
            return TurnDecision {
                next_participant: None,
                turn_number: discussion.runtime.turn_number,
                estimated_duration_secs: discussion.settings.turn_timeout_secs,
            };
        }

        // Least-recently-spoken: never-spoken participants (`None`) sort
        // before anyone with a timestamp.
        let least_recent = ordered
            .iter()
            .min_by_key(|p| p.last_message_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN))
            .expect("ordered is non-empty");

        TurnDecision {
            next_participant: Some(least_recent.id),
            turn_number: discussion.runtime.turn_number + 1,
            estimated_duration_secs: discussion.settings.turn_timeout_secs,
        }
    }

    fn can_participate(&self, discussion: &Discussion, participant: &Participant) -> bool {
        match discussion.runtime.current_turn {
            Some(owner) => owner == participant.id,
            None => true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// moderated
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The moderator always owns the turn between hand-offs. Users request
/// turns and are queued in `TurnStrategyConfig::Moderated::queue`; while
/// the moderator holds the floor, the next hand-off goes to the first
/// active queued requester instead, and the requester's end-of-turn
/// returns control to the moderator.
pub struct ModeratedStrategy {
    pub moderator_participant_id: ParticipantId,
}

impl TurnStrategy for ModeratedStrategy {
    fn next_turn(
        &self,
        discussion: &Discussion,
        active: &[Participant],
        _messages: &[Message],
    ) -> TurnDecision {
        let moderator_active = active.iter().any(|p| p.id == self.moderator_participant_id);
        let queue: &[ParticipantId] = match &discussion.turn_strategy {
            TurnStrategyConfig::Moderated { queue, .. } => queue.as_slice(),
            _ => &[],
        };

        let moderator_holds_floor = discussion.runtime.current_turn == Some(self.moderator_participant_id);

        let next_participant = if moderator_holds_floor {
            // Hand off to the first active queued requester; fall back to
            // keeping the floor if nobody queued is currently active.
            queue
                .iter()
                .find(|id| active.iter().any(|p| p.id == **id))
                .copied()
                .or_else(|| moderator_active.then_some(self.moderator_participant_id))
        } else {
            // A queued requester just held the floor; hand it back.
            moderator_active.then_some(self.moderator_participant_id)
        };

        TurnDecision {
            next_participant,
            turn_number: discussion.runtime.turn_number + 1,
            estimated_duration_secs: discussion.settings.turn_timeout_secs,
        }
    }

    fn can_participate(&self, discussion: &Discussion, participant: &Participant) -> bool {
        participant.id == self.moderator_participant_id
            || discussion.runtime.current_turn == Some(participant.id)
    }

    fn on_turn_applied(&self, discussion: &mut Discussion, decision: &TurnDecision) {
        if let (Some(next), TurnStrategyConfig::Moderated { queue, .. }) = (decision.next_participant, &mut discussion.turn_strategy) {
            queue.retain(|id| *id != next);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// free_form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// No turn enforcement at all. `next_turn` is only consulted by the
/// participation trigger to pick whom to nudge next, never to gate
/// `sendMessage` — `can_participate` always returns `true`.
pub struct FreeFormStrategy;

impl TurnStrategy for FreeFormStrategy {
    fn next_turn(
        &self,
        discussion: &Discussion,
        active: &[Participant],
        _messages: &[Message],
    ) -> TurnDecision {
        let ordered = stable_order(active);
        let next_participant = ordered
            .iter()
            .min_by_key(|p| p.last_message_at.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN))
            .map(|p| p.id);

        TurnDecision {
            next_participant,
            turn_number: discussion.runtime.turn_number + 1,
            estimated_duration_secs: discussion.settings.turn_timeout_secs,
        }
    }

    fn can_participate(&self, _discussion: &Discussion, _participant: &Participant) -> bool {
        true
    }

    fn is_free_form(&self) -> bool {
        true
    }
}
