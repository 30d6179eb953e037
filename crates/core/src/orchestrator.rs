//! The orchestrator — lifecycle state machine and command dispatch
//! surface every caller funnels through (§4.8). Generalizes the
//! teacher's `state::AppState` Clone-of-Arcs composition (every
//! subsystem wired in once at construction, no hidden singletons)
//! together with `runtime::runs::Run`'s status-snapshot shape, into the
//! one type that owns a discussion's full command surface: create,
//! start/pause/resume/stop/archive/cancel, participant membership,
//! `sendMessage`, turn advancement, reactions, and the periodic
//! sweepers that drive agent participation without anyone calling in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use oc_domain::{
    AgentId, Discussion, DiscussionId, DiscussionSettings, DiscussionStatus, Error, Event, EventData,
    MessageId, MessageMetadata, OrchestratorConfig, Participant, ParticipantId, ParticipantType, Result,
    TurnStrategyConfig,
};

use crate::clock::Clock;
use crate::runtime::broadcaster::Broadcaster;
use crate::runtime::cache::DiscussionCache;
use crate::runtime::event_bus::{publish_best_effort, EventBus, TOPIC_DISCUSSION_EVENTS, TOPIC_ENHANCEMENT_REQUEST};
use crate::runtime::message_pipeline::{MessageOutcome, MessagePipeline, Sender, SendMessageRequest};
use crate::runtime::operation_lock::OperationLockMap;
use crate::runtime::participants::ParticipantManager;
use crate::runtime::participation_trigger::{HealthMonitor, ParticipationTrigger};
use crate::runtime::timer::TimerRegistry;
use crate::runtime::turn_strategy::{build_strategy, TurnDecision};
use crate::storage::StoragePort;

/// What every public command returns: the data the caller asked for,
/// plus the events that were emitted producing it. Callers never
/// observe a panic across this boundary (§7) — only this, or an
/// `Error` with a stable `.kind()`.
#[derive(Debug, Clone)]
pub struct CommandOutcome<T> {
    pub data: T,
    pub events: Vec<Event>,
}

impl<T> CommandOutcome<T> {
    fn new(data: T, events: Vec<Event>) -> Self {
        Self { data, events }
    }
}

pub struct CreateDiscussionRequest {
    pub title: String,
    pub topic: String,
    pub description: String,
    pub turn_strategy: TurnStrategyConfig,
    pub settings: DiscussionSettings,
    pub initial_participants: Vec<ParticipantSpec>,
}

pub struct ParticipantSpec {
    pub participant_type: ParticipantType,
    pub agent_id: Option<AgentId>,
    pub user_id: Option<String>,
    pub role: String,
    pub display_name: String,
}

impl ParticipantSpec {
    pub fn agent(agent_id: impl Into<AgentId>, role: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            participant_type: ParticipantType::Agent,
            agent_id: Some(agent_id.into()),
            user_id: None,
            role: role.into(),
            display_name: display_name.into(),
        }
    }

    pub fn user(user_id: impl Into<String>, role: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            participant_type: ParticipantType::User,
            agent_id: None,
            user_id: Some(user_id.into()),
            role: role.into(),
            display_name: display_name.into(),
        }
    }
}

/// Either naming scheme a `sendMessage` caller may use to identify
/// itself — resolved participant-id-then-agent-id (§10 Open Question).
pub enum ParticipantOrAgentId {
    Participant(ParticipantId),
    Agent(AgentId),
}

#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    pub cached_discussions: usize,
    pub active_timers: usize,
    pub tracked_locks: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub evicted_discussions: usize,
    pub orphaned_locks_cleared: usize,
}

fn build_participant(discussion_id: DiscussionId, spec: ParticipantSpec, now: DateTime<Utc>) -> Participant {
    match spec.participant_type {
        ParticipantType::Agent => Participant::new_agent(
            discussion_id,
            spec.agent_id.unwrap_or_else(|| AgentId::from(String::new())),
            spec.role,
            spec.display_name,
            now,
        ),
        ParticipantType::User => Participant::new_user(
            discussion_id,
            spec.user_id.unwrap_or_default(),
            spec.role,
            spec.display_name,
            now,
        ),
    }
}

fn status_tag(status: DiscussionStatus) -> String {
    format!("{status:?}").to_lowercase()
}

fn apply_turn_decision(discussion: &mut Discussion, decision: &TurnDecision, now: DateTime<Utc>) {
    discussion.runtime.current_turn = decision.next_participant;
    discussion.runtime.turn_number = decision.turn_number;
    discussion.runtime.turn_started_at = Some(now);
    discussion.runtime.expected_end_at = decision
        .next_participant
        .map(|_| now + Duration::seconds(decision.estimated_duration_secs.max(1) as i64));
}

pub struct Orchestrator {
    store: Arc<dyn StoragePort>,
    bus: Arc<dyn EventBus>,
    broadcaster: Arc<Broadcaster>,
    cache: Arc<DiscussionCache>,
    timers: Arc<TimerRegistry>,
    locks: Arc<OperationLockMap>,
    participants: ParticipantManager,
    pipeline: MessagePipeline,
    participation_trigger: Arc<ParticipationTrigger>,
    health_monitor: Arc<HealthMonitor>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StoragePort>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        let broadcaster = Arc::new(Broadcaster::new());
        let cache = Arc::new(DiscussionCache::new());
        let participation_trigger = Arc::new(ParticipationTrigger::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            config.participation.clone(),
        ));
        let health_monitor = Arc::new(HealthMonitor::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            config.health.clone(),
        ));

        Self {
            participants: ParticipantManager::new(store.clone()),
            pipeline: MessagePipeline::new(store.clone(), cache.clone(), broadcaster.clone(), bus.clone()),
            store,
            bus,
            broadcaster,
            cache,
            timers: Arc::new(TimerRegistry::new()),
            locks: Arc::new(OperationLockMap::new()),
            participation_trigger,
            health_monitor,
            clock,
            config,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load(&self, id: DiscussionId, bypass_cache: bool) -> Result<Discussion> {
        if !bypass_cache {
            if let Some(cached) = self.cache.get(id) {
                return Ok(cached);
            }
        }
        let discussion = self
            .store
            .get_discussion(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.cache.put(discussion.clone());
        Ok(discussion)
    }

    async fn persist(&self, discussion: &Discussion) -> Result<()> {
        self.store.update_discussion(discussion.clone()).await?;
        self.cache.put(discussion.clone());
        Ok(())
    }

    async fn emit_all(&self, events: &[Event]) {
        for event in events {
            event.emit();
            self.broadcaster.broadcast(event);
            publish_best_effort(self.bus.as_ref(), TOPIC_DISCUSSION_EVENTS, event.payload()).await;
        }
    }

    fn reschedule_timer(self: &Arc<Self>, id: DiscussionId, next_participant: Option<ParticipantId>, duration_secs: u64) {
        self.timers.cancel(id);
        // No eligible participant: leave the turn unset and don't arm a
        // timer that would just fire into an empty rotation.
        if next_participant.is_none() {
            return;
        }
        let orchestrator = self.clone();
        self.timers.schedule(
            id,
            std::time::Duration::from_secs(duration_secs.max(1)),
            Box::new(move || Box::pin(async move { orchestrator.on_turn_timer_fired(id).await })),
        );
    }

    /// Timer callback: re-checks status before acting, since the
    /// discussion may have been paused or stopped between the timer
    /// firing and this callback actually running.
    async fn on_turn_timer_fired(self: Arc<Self>, id: DiscussionId) {
        let discussion = match self.store.get_discussion(id).await {
            Ok(Some(d)) => d,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(discussion_id = %id, error = %err, "turn timer: failed to load discussion");
                return;
            }
        };
        if discussion.status != DiscussionStatus::Active {
            return;
        }
        if let Err(err) = self.advance_turn(id, None).await {
            tracing::warn!(discussion_id = %id, error = %err, "turn timer: advance_turn failed");
        }
    }

    async fn fire_initial_participation(self: Arc<Self>, id: DiscussionId) {
        if let Err(err) = self.participation_trigger.trigger_for(id).await {
            tracing::warn!(discussion_id = %id, error = %err, "initial participation trigger failed");
        }
    }

    // ── Lifecycle commands ──

    pub async fn create_discussion(
        &self,
        request: CreateDiscussionRequest,
        creator_id: &str,
    ) -> Result<CommandOutcome<Discussion>> {
        request.turn_strategy.validate()?;
        let now = self.now();
        let mut discussion = Discussion::new(
            request.title,
            request.topic,
            request.description,
            creator_id,
            request.turn_strategy,
            request.settings,
            now,
        );
        self.store.create_discussion(discussion.clone()).await?;

        let mut events = Vec::new();
        for spec in request.initial_participants {
            let participant = build_participant(discussion.id, spec, now);
            self.participants.create(participant.clone()).await?;
            events.push(Event::new(
                discussion.id,
                EventData::ParticipantJoined {
                    participant_id: participant.id,
                    display_name: participant.display_name.clone(),
                },
                "orchestrator",
                now,
            ));
        }
        discussion.touch(now);
        self.persist(&discussion).await?;
        self.emit_all(&events).await;
        self.request_bulk_enhancement(&discussion).await;
        Ok(CommandOutcome::new(discussion, events))
    }

    /// Fires once per discussion at creation time: a bulk query asking an
    /// external enrichment worker (knowledge-graph lookups, topic
    /// expansion, whatever the deployment wires up) for context the
    /// participation trigger can fold into its curated message history.
    /// Out of scope per §1 — this only publishes the request.
    async fn request_bulk_enhancement(&self, discussion: &Discussion) {
        let payload = serde_json::json!({
            "discussion_id": discussion.id,
            "topic": discussion.topic,
            "description": discussion.description,
        });
        publish_best_effort(self.bus.as_ref(), TOPIC_ENHANCEMENT_REQUEST, payload).await;
    }

    pub async fn start_discussion(self: &Arc<Self>, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;

        if discussion.status == DiscussionStatus::Active {
            return Ok(CommandOutcome::new(discussion, Vec::new()));
        }
        discussion.check_transition(DiscussionStatus::Active)?;

        let active = self.participants.active_of(id).await?;
        if active.len() < 2 {
            return Err(Error::InvalidState(
                "starting a discussion requires at least 2 active participants".into(),
            ));
        }

        let strategy = build_strategy(&discussion.turn_strategy);
        let recent = self.store.list_messages(id, 1).await?;
        let decision = strategy.next_turn(&discussion, &active, &recent);

        let from = status_tag(discussion.status);
        discussion.status = DiscussionStatus::Active;
        apply_turn_decision(&mut discussion, &decision, now);
        strategy.on_turn_applied(&mut discussion, &decision);
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![
            Event::new(
                id,
                EventData::StatusChanged {
                    from,
                    to: status_tag(DiscussionStatus::Active),
                },
                "orchestrator",
                now,
            ),
            Event::new(
                id,
                EventData::TurnChanged {
                    participant_id: decision.next_participant,
                    turn_number: decision.turn_number,
                },
                "orchestrator",
                now,
            ),
        ];
        self.emit_all(&events).await;
        self.reschedule_timer(id, decision.next_participant, decision.estimated_duration_secs);

        let initial_trigger = self.clone();
        tokio::spawn(async move {
            initial_trigger.fire_initial_participation(id).await;
        });

        Ok(CommandOutcome::new(discussion, events))
    }

    pub async fn pause_discussion(&self, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        if discussion.status == DiscussionStatus::Paused {
            return Ok(CommandOutcome::new(discussion, Vec::new()));
        }
        let from = status_tag(discussion.status);
        discussion.check_transition(DiscussionStatus::Paused)?;
        self.timers.cancel(id);
        discussion.status = DiscussionStatus::Paused;
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::StatusChanged {
                from,
                to: status_tag(DiscussionStatus::Paused),
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        Ok(CommandOutcome::new(discussion, events))
    }

    pub async fn resume_discussion(self: &Arc<Self>, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        if discussion.status == DiscussionStatus::Active {
            return Ok(CommandOutcome::new(discussion, Vec::new()));
        }
        let from = status_tag(discussion.status);
        discussion.check_transition(DiscussionStatus::Active)?;
        discussion.status = DiscussionStatus::Active;
        discussion.runtime.turn_started_at = Some(now);
        let timeout = discussion.settings.turn_timeout_secs;
        discussion.runtime.expected_end_at = discussion
            .runtime
            .current_turn
            .map(|_| now + Duration::seconds(timeout.max(1) as i64));
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::StatusChanged {
                from,
                to: status_tag(DiscussionStatus::Active),
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        self.reschedule_timer(id, discussion.runtime.current_turn, timeout);
        Ok(CommandOutcome::new(discussion, events))
    }

    pub async fn stop_discussion(&self, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        let from = status_tag(discussion.status);
        discussion.check_transition(DiscussionStatus::Completed)?;
        self.timers.cancel(id);
        discussion.status = DiscussionStatus::Completed;
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::StatusChanged {
                from,
                to: status_tag(DiscussionStatus::Completed),
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        Ok(CommandOutcome::new(discussion, events))
    }

    /// Supplemental: `Discussion::check_transition` permits `any →
    /// archived` (§4.8) even though §6's command enumeration doesn't
    /// name it explicitly — exposed here rather than left dead.
    pub async fn archive_discussion(&self, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        self.terminal_transition(id, DiscussionStatus::Archived).await
    }

    /// Supplemental: `any → cancelled`, same rationale as `archive_discussion`.
    pub async fn cancel_discussion(&self, id: DiscussionId) -> Result<CommandOutcome<Discussion>> {
        self.terminal_transition(id, DiscussionStatus::Cancelled).await
    }

    async fn terminal_transition(&self, id: DiscussionId, to: DiscussionStatus) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        if discussion.status == to {
            return Ok(CommandOutcome::new(discussion, Vec::new()));
        }
        let from = status_tag(discussion.status);
        discussion.check_transition(to)?;
        self.timers.cancel(id);
        discussion.status = to;
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::StatusChanged {
                from,
                to: status_tag(to),
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        Ok(CommandOutcome::new(discussion, events))
    }

    // ── Membership ──

    pub async fn add_participant(&self, id: DiscussionId, spec: ParticipantSpec) -> Result<CommandOutcome<Participant>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        let active = self.participants.active_of(id).await?;
        if active.len() as u32 >= discussion.settings.max_participants {
            return Err(Error::LimitExceeded(format!(
                "discussion already has the maximum of {} active participants",
                discussion.settings.max_participants
            )));
        }

        let participant = build_participant(id, spec, now);
        self.participants.create(participant.clone()).await?;
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::ParticipantJoined {
                participant_id: participant.id,
                display_name: participant.display_name.clone(),
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        Ok(CommandOutcome::new(participant, events))
    }

    pub async fn remove_participant(&self, id: DiscussionId, participant_id: ParticipantId) -> Result<CommandOutcome<Participant>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let discussion = self.load(id, true).await?;
        let participant = self.participants.deactivate(participant_id).await?;
        self.cache.put(discussion);

        let events = vec![Event::new(id, EventData::ParticipantLeft { participant_id }, "orchestrator", now)];
        self.emit_all(&events).await;
        Ok(CommandOutcome::new(participant, events))
    }

    // ── Messaging & turns ──

    pub async fn send_message(
        &self,
        id: DiscussionId,
        sender: ParticipantOrAgentId,
        content: impl Into<String>,
        message_type: Option<String>,
        metadata: Option<MessageMetadata>,
    ) -> Result<CommandOutcome<MessageOutcome>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let sender = match sender {
            ParticipantOrAgentId::Participant(pid) => Sender::Participant(pid),
            ParticipantOrAgentId::Agent(aid) => Sender::Agent(aid),
        };
        let outcome = self
            .pipeline
            .send_message(
                SendMessageRequest {
                    discussion_id: id,
                    sender,
                    content: content.into(),
                    message_type: message_type.unwrap_or_else(|| "message".into()),
                    metadata: metadata.unwrap_or_default(),
                },
                now,
            )
            .await?;
        // Crossing the message cap completes the discussion inside the
        // pipeline itself; cancel the outstanding turn timer immediately
        // rather than leaving it to fire into a discussion that's no
        // longer active.
        if outcome.discussion.status != DiscussionStatus::Active {
            self.timers.cancel(id);
        }
        let events = outcome.events.clone();
        Ok(CommandOutcome::new(outcome, events))
    }

    pub async fn advance_turn(self: &Arc<Self>, id: DiscussionId, _advanced_by: Option<&str>) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        if discussion.status != DiscussionStatus::Active {
            return Err(Error::InvalidState(format!(
                "cannot advance turn: discussion is {:?}",
                discussion.status
            )));
        }
        self.timers.cancel(id);

        let active = self.participants.active_of(id).await?;
        let recent = self.store.list_messages(id, 20).await?;
        let strategy = build_strategy(&discussion.turn_strategy);
        let decision = strategy.next_turn(&discussion, &active, &recent);

        apply_turn_decision(&mut discussion, &decision, now);
        strategy.on_turn_applied(&mut discussion, &decision);
        discussion.touch(now);
        self.persist(&discussion).await?;

        let events = vec![Event::new(
            id,
            EventData::TurnChanged {
                participant_id: decision.next_participant,
                turn_number: decision.turn_number,
            },
            "orchestrator",
            now,
        )];
        self.emit_all(&events).await;
        self.reschedule_timer(id, decision.next_participant, decision.estimated_duration_secs);
        Ok(CommandOutcome::new(discussion, events))
    }

    /// A participant voluntarily yields the floor. Only the current turn
    /// owner may call this; it is equivalent to an immediate
    /// `advance_turn`.
    pub async fn end_turn(self: &Arc<Self>, id: DiscussionId, participant_id: ParticipantId) -> Result<CommandOutcome<Discussion>> {
        {
            let discussion = self.load(id, true).await?;
            if discussion.runtime.current_turn != Some(participant_id) {
                return Err(Error::NotYourTurn(participant_id.to_string()));
            }
        }
        self.advance_turn(id, Some(&participant_id.to_string())).await
    }

    /// Queue a turn request. Only meaningful for `moderated` discussions,
    /// where the moderator hands control to the head of the queue; other
    /// strategies have no concept of a request to grant, so this is
    /// rejected rather than silently ignored.
    pub async fn request_turn(&self, id: DiscussionId, participant_id: ParticipantId) -> Result<CommandOutcome<Discussion>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let mut discussion = self.load(id, true).await?;
        let participant = self.participants.by_id(participant_id).await?;
        if !participant.active || participant.discussion_id != id {
            return Err(Error::ParticipantInactive(participant_id.to_string()));
        }

        match &mut discussion.turn_strategy {
            TurnStrategyConfig::Moderated {
                queue,
                moderator_participant_id,
            } => {
                if *moderator_participant_id != participant_id && !queue.contains(&participant_id) {
                    queue.push(participant_id);
                }
            }
            _ => {
                return Err(Error::InvalidConfig(
                    "requestTurn only applies to the moderated strategy".into(),
                ));
            }
        }
        discussion.touch(now);
        self.persist(&discussion).await?;
        Ok(CommandOutcome::new(discussion, Vec::new()))
    }

    pub async fn add_reaction(
        &self,
        id: DiscussionId,
        message_id: MessageId,
        participant_id: ParticipantId,
        emoji: impl Into<String>,
    ) -> Result<CommandOutcome<()>> {
        let now = self.now();
        let _guard = self.locks.acquire(id, now).await;
        let discussion = self.load(id, true).await?;
        if !discussion.settings.allow_reactions {
            return Err(Error::InvalidConfig("reactions are disabled for this discussion".into()));
        }
        let participant = self.participants.by_id(participant_id).await?;
        if !participant.active {
            return Err(Error::ParticipantInactive(participant_id.to_string()));
        }

        // Reactions are event-only: the storage port has no reaction CRUD
        // of its own (see DESIGN.md), so there is nothing further to
        // persist beyond the emitted event.
        let event = Event::new(
            id,
            EventData::ReactionAdded {
                message_id,
                participant_id,
                emoji: emoji.into(),
            },
            "orchestrator",
            now,
        );
        self.emit_all(std::slice::from_ref(&event)).await;
        Ok(CommandOutcome::new((), vec![event]))
    }

    // ── Reads ──

    pub async fn get_discussion(&self, id: DiscussionId, bypass_cache: bool) -> Result<Discussion> {
        self.load(id, bypass_cache).await
    }

    pub async fn verify_participant_access(&self, id: DiscussionId, user_id: &str) -> Result<bool> {
        let participants = self.participants.all_of(id).await?;
        Ok(participants.iter().any(|p| p.active && p.user_id.as_deref() == Some(user_id)))
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            cached_discussions: self.cache.len(),
            active_timers: self.timers.active_count(),
            tracked_locks: self.locks.tracked_count(),
        }
    }

    // ── Maintenance ──

    pub async fn cleanup(&self) -> CleanupReport {
        let now = self.now();
        let evicted = self.cache.sweep_expired(now, Duration::seconds(self.config.cache.ttl_secs as i64));
        for id in &evicted {
            self.timers.cancel(*id);
            self.broadcaster.prune_idle(*id);
        }
        let orphaned = self.locks.sweep_orphaned(now, Duration::seconds(self.config.cleanup.orphan_lock_secs as i64));
        self.participation_trigger.scrub_stale_entries(now, Duration::minutes(10));

        CleanupReport {
            evicted_discussions: evicted.len(),
            orphaned_locks_cleared: orphaned,
        }
    }

    /// Spawns the three periodic sweepers (participation, health,
    /// cleanup) as background tasks, mirroring the gateway binary's
    /// `tokio::spawn`-per-subsystem startup sequence. Returns the join
    /// handles so the caller can hold or abort them.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let participation = self.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                participation.config.participation.sweep_interval_secs,
            ));
            loop {
                interval.tick().await;
                if participation.shutting_down.load(Ordering::Relaxed) {
                    break;
                }
                participation.participation_trigger.sweep().await;
            }
        }));

        let health = self.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(health.config.health.sweep_interval_secs));
            loop {
                interval.tick().await;
                if health.shutting_down.load(Ordering::Relaxed) {
                    break;
                }
                health.health_monitor.sweep().await;
            }
        }));

        let cleanup = self.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(cleanup.config.cleanup.sweep_interval_secs));
            loop {
                interval.tick().await;
                if cleanup.shutting_down.load(Ordering::Relaxed) {
                    break;
                }
                let report = cleanup.cleanup().await;
                if report.evicted_discussions > 0 || report.orphaned_locks_cleared > 0 {
                    tracing::info!(?report, "cleanup sweep");
                }
            }
        }));

        handles
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }
}
