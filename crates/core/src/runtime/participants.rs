//! Participant manager — a thin lookup/update layer in front of the
//! storage port. It owns no state of its own; every call delegates
//! straight through, the way `sessions::store::SessionStore` stays the
//! single source of truth for its callers instead of letting a second
//! cache drift out of sync.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use oc_domain::{AgentId, DiscussionId, Error, Participant, ParticipantId, Result};

use crate::storage::StoragePort;

pub struct ParticipantManager {
    store: Arc<dyn StoragePort>,
}

impl ParticipantManager {
    pub fn new(store: Arc<dyn StoragePort>) -> Self {
        Self { store }
    }

    pub async fn by_id(&self, id: ParticipantId) -> Result<Participant> {
        self.store
            .get_participant(id)
            .await?
            .ok_or_else(|| Error::ParticipantNotFound(id.to_string()))
    }

    /// Resolve by agent id within a discussion. Distinguishes "never
    /// joined" from "joined, then removed" so callers can surface
    /// `PARTICIPANT_NOT_FOUND` vs `PARTICIPANT_INACTIVE` correctly.
    pub async fn by_agent_id(&self, discussion_id: DiscussionId, agent_id: &AgentId) -> Result<Participant> {
        let all = self.store.get_participants(discussion_id).await?;
        all.into_iter()
            .find(|p| p.agent_id.as_ref() == Some(agent_id))
            .ok_or_else(|| Error::ParticipantNotFound(agent_id.to_string()))
    }

    pub async fn active_of(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>> {
        self.store.get_active_participants(discussion_id).await
    }

    pub async fn all_of(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>> {
        self.store.get_participants(discussion_id).await
    }

    /// Apply `record_activity` and persist. Returns the updated
    /// participant so the caller can fold it into the command outcome
    /// without a second round-trip.
    pub async fn update_activity(&self, participant_id: ParticipantId, now: DateTime<Utc>) -> Result<Participant> {
        let mut participant = self.by_id(participant_id).await?;
        participant.record_activity(now);
        self.store.update_participant(participant.clone()).await?;
        Ok(participant)
    }

    pub async fn deactivate(&self, participant_id: ParticipantId) -> Result<Participant> {
        let mut participant = self.by_id(participant_id).await?;
        participant.tombstone();
        self.store.update_participant(participant.clone()).await?;
        Ok(participant)
    }

    pub async fn create(&self, participant: Participant) -> Result<()> {
        self.store.create_participant(participant).await
    }
}
