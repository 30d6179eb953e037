//! Discussion cache (§4.4).
//!
//! An in-memory write-through view over the storage port, modeled on
//! `sessions::store::SessionStore`'s `RwLock<HashMap>`. The cache is
//! authoritative for the active-set snapshot observed during a single
//! command; the store stays authoritative across restarts — a cache miss
//! always falls back to a store read (the orchestrator's job, not this
//! type's; see `Orchestrator::get_discussion`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use oc_domain::{Discussion, DiscussionId};

pub struct DiscussionCache {
    entries: RwLock<HashMap<DiscussionId, Discussion>>,
}

impl Default for DiscussionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscussionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: DiscussionId) -> Option<Discussion> {
        self.entries.read().get(&id).cloned()
    }

    pub fn put(&self, discussion: Discussion) {
        self.entries.write().insert(discussion.id, discussion);
    }

    pub fn remove(&self, id: DiscussionId) -> Option<Discussion> {
        self.entries.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry whose `runtime.last_activity_at` is older than
    /// `ttl`. Returns the evicted ids so the caller can cancel their
    /// timers (cache eviction and timer cancellation must happen
    /// together — §4.4).
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> Vec<DiscussionId> {
        let mut entries = self.entries.write();
        let expired: Vec<DiscussionId> = entries
            .values()
            .filter(|d| now.signed_duration_since(d.runtime.last_activity_at) > ttl)
            .map(|d| d.id)
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }
}
