//! The storage port — the narrow interface the core uses to persist and
//! retrieve discussions, participants, and messages (§4.10). The core
//! never assumes a specific backing store; `InMemoryStore` is the
//! reference implementation used by tests and the demo binary, playing
//! the role `sessions::store::SessionStore` plays for the gateway, minus
//! any particular persistence format.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use oc_domain::{Discussion, DiscussionId, DiscussionStatus, Error, Message, Participant, ParticipantId, Result};

/// Optional filter for `search_discussions`; `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct DiscussionFilter {
    pub status: Option<DiscussionStatus>,
}

#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn create_discussion(&self, discussion: Discussion) -> Result<()>;
    async fn get_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>>;
    async fn update_discussion(&self, discussion: Discussion) -> Result<()>;
    async fn search_discussions(&self, filter: DiscussionFilter) -> Result<Vec<Discussion>>;

    async fn append_message(&self, message: Message) -> Result<()>;
    async fn list_messages(&self, discussion_id: DiscussionId, limit: usize) -> Result<Vec<Message>>;
    async fn message_count(&self, discussion_id: DiscussionId) -> Result<usize>;

    async fn create_participant(&self, participant: Participant) -> Result<()>;
    async fn update_participant(&self, participant: Participant) -> Result<()>;
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>>;
    async fn get_active_participants(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>>;
    /// All participants of a discussion, active or tombstoned — needed to
    /// distinguish `PARTICIPANT_NOT_FOUND` from `PARTICIPANT_INACTIVE`
    /// when resolving by agent id (§4.7).
    async fn get_participants(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>>;
}

#[derive(Default)]
struct InMemoryStoreInner {
    discussions: HashMap<DiscussionId, Discussion>,
    participants: HashMap<ParticipantId, Participant>,
    /// Newest-last, per discussion.
    messages: HashMap<DiscussionId, Vec<Message>>,
}

/// Reference `StoragePort` implementation: everything lives behind one
/// `RwLock`, matching `SessionStore`'s single-lock-over-a-HashMap shape.
/// All methods are safe to call concurrently (§4.10).
pub struct InMemoryStore {
    inner: RwLock<InMemoryStoreInner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(InMemoryStoreInner::default()),
        }
    }
}

#[async_trait]
impl StoragePort for InMemoryStore {
    async fn create_discussion(&self, discussion: Discussion) -> Result<()> {
        let mut inner = self.inner.write();
        inner.discussions.insert(discussion.id, discussion);
        Ok(())
    }

    async fn get_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>> {
        Ok(self.inner.read().discussions.get(&id).cloned())
    }

    async fn update_discussion(&self, discussion: Discussion) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.discussions.contains_key(&discussion.id) {
            return Err(Error::NotFound(discussion.id.to_string()));
        }
        inner.discussions.insert(discussion.id, discussion);
        Ok(())
    }

    async fn search_discussions(&self, filter: DiscussionFilter) -> Result<Vec<Discussion>> {
        let inner = self.inner.read();
        Ok(inner
            .discussions
            .values()
            .filter(|d| match filter.status {
                Some(s) => d.status == s,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn append_message(&self, message: Message) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .messages
            .entry(message.discussion_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(&self, discussion_id: DiscussionId, limit: usize) -> Result<Vec<Message>> {
        let inner = self.inner.read();
        let all = inner.messages.get(&discussion_id).cloned().unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn message_count(&self, discussion_id: DiscussionId) -> Result<usize> {
        let inner = self.inner.read();
        Ok(inner.messages.get(&discussion_id).map(|m| m.len()).unwrap_or(0))
    }

    async fn create_participant(&self, participant: Participant) -> Result<()> {
        let mut inner = self.inner.write();
        inner.participants.insert(participant.id, participant);
        Ok(())
    }

    async fn update_participant(&self, participant: Participant) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.participants.contains_key(&participant.id) {
            return Err(Error::ParticipantNotFound(participant.id.to_string()));
        }
        inner.participants.insert(participant.id, participant);
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.inner.read().participants.get(&id).cloned())
    }

    async fn get_active_participants(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>> {
        let inner = self.inner.read();
        Ok(inner
            .participants
            .values()
            .filter(|p| p.discussion_id == discussion_id && p.active)
            .cloned()
            .collect())
    }

    async fn get_participants(&self, discussion_id: DiscussionId) -> Result<Vec<Participant>> {
        let inner = self.inner.read();
        Ok(inner
            .participants
            .values()
            .filter(|p| p.discussion_id == discussion_id)
            .cloned()
            .collect())
    }
}
