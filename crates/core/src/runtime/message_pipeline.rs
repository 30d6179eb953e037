//! `sendMessage` — the one pipeline every caller (human, agent, the
//! participation trigger) funnels through. Staged the way
//! `runtime::turn::run_turn` stages a turn: each phase does one thing,
//! persists it, and either continues or returns early with a typed
//! error. No phase half-applies its effect — a rejected message never
//! touches the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use oc_domain::{
    AgentId, Discussion, DiscussionId, DiscussionStatus, Error, Event, EventData, Message, MessageMetadata,
    MessageType, Participant, ParticipantId, Result,
};

use crate::runtime::broadcaster::Broadcaster;
use crate::runtime::cache::DiscussionCache;
use crate::runtime::event_bus::{publish_best_effort, EventBus, TOPIC_DISCUSSION_EVENTS};
use crate::runtime::participants::ParticipantManager;
use crate::storage::StoragePort;

/// Who is sending, named one of two ways depending on the caller.
pub enum Sender {
    Participant(ParticipantId),
    Agent(AgentId),
}

pub struct SendMessageRequest {
    pub discussion_id: DiscussionId,
    pub sender: Sender,
    pub content: String,
    /// Raw wire value; normalized via [`MessageType::normalize`].
    pub message_type: String,
    pub metadata: MessageMetadata,
}

pub struct MessageOutcome {
    pub message: Message,
    pub discussion: Discussion,
    pub events: Vec<Event>,
}

pub struct MessagePipeline {
    store: Arc<dyn StoragePort>,
    cache: Arc<DiscussionCache>,
    broadcaster: Arc<Broadcaster>,
    bus: Arc<dyn EventBus>,
    participants: ParticipantManager,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn StoragePort>,
        cache: Arc<DiscussionCache>,
        broadcaster: Arc<Broadcaster>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            participants: ParticipantManager::new(store.clone()),
            store,
            cache,
            broadcaster,
            bus,
        }
    }

    pub async fn send_message(&self, request: SendMessageRequest, now: DateTime<Utc>) -> Result<MessageOutcome> {
        // ── Phase 1: load the discussion, bypassing the cache ──
        // A stale cached status could let a message through after a
        // pause that another caller just committed to the store.
        let mut discussion = self
            .store
            .get_discussion(request.discussion_id)
            .await?
            .ok_or_else(|| Error::NotFound(request.discussion_id.to_string()))?;

        if !matches!(discussion.status, DiscussionStatus::Active) {
            return Err(Error::InvalidState(format!(
                "discussion is {:?}, not active",
                discussion.status
            )));
        }

        // ── Phase 2: resolve the sender ──
        let participant = match &request.sender {
            Sender::Participant(id) => self.participants.by_id(*id).await?,
            Sender::Agent(agent_id) => self.participants.by_agent_id(request.discussion_id, agent_id).await?,
        };

        // ── Phase 3: reject inactive senders ──
        if !participant.active {
            return Err(Error::ParticipantInactive(participant.id.to_string()));
        }

        // ── Phase 4: turn check ──
        // Free-form discussions never enforce ownership. A participant's
        // very first message is always accepted regardless of whose turn
        // it is, so a newly-joined participant isn't locked out waiting
        // for a rotation that doesn't know about them yet.
        let is_initial = request.metadata.is_initial_participation;
        let owns_turn = discussion.runtime.current_turn == Some(participant.id);
        if !discussion.turn_strategy.is_free_form() && !owns_turn && !is_initial {
            return Err(Error::NotYourTurn(participant.id.to_string()));
        }

        // ── Phase 5: normalize and construct ──
        let message_type = MessageType::normalize(&request.message_type);
        let message = Message::new(
            request.discussion_id,
            participant.id,
            request.content,
            message_type,
            request.metadata,
            now,
        );

        // ── Phase 6: persist the message ──
        self.store.append_message(message.clone()).await?;

        // ── Phase 7: update sender activity ──
        self.participants.update_activity(participant.id, now).await?;

        // ── Phase 8: update discussion counters and phase ──
        discussion.runtime.message_count += 1;
        discussion.touch(now);
        let active = self.participants.active_of(discussion.id).await?;
        advance_phase_if_needed(&mut discussion, &active);

        let crossed_cap = discussion.at_message_cap();
        if crossed_cap {
            discussion.status = DiscussionStatus::Completed;
        }

        self.store.update_discussion(discussion.clone()).await?;
        self.cache.put(discussion.clone());

        // ── Phase 9: emit and publish ──
        let mut events = vec![Event::new(
            discussion.id,
            EventData::MessageSent {
                message_id: message.id,
                participant_id: participant.id,
            },
            "message_pipeline",
            now,
        )];

        if crossed_cap {
            events.push(Event::new(
                discussion.id,
                EventData::StatusChanged {
                    from: "active".into(),
                    to: "completed".into(),
                },
                "message_pipeline",
                now,
            ));
        }

        for event in &events {
            event.emit();
            self.broadcaster.broadcast(event);
            publish_best_effort(self.bus.as_ref(), TOPIC_DISCUSSION_EVENTS, event.payload()).await;
        }

        Ok(MessageOutcome {
            message,
            discussion,
            events,
        })
    }
}

/// Introduction phase ends once every currently-active participant has
/// sent at least one message; steady-state turn rotation only begins in
/// `Phase::Main`.
fn advance_phase_if_needed(discussion: &mut Discussion, active: &[Participant]) {
    if discussion.runtime.phase == oc_domain::Phase::Introduction
        && !active.is_empty()
        && active.iter().all(|p| p.message_count > 0)
    {
        discussion.runtime.phase = oc_domain::Phase::Main;
    }
}
