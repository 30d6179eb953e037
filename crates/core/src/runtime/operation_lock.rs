//! Per-discussion operation lock.
//!
//! `sendMessage`, `advanceTurn`, and lifecycle transitions are serialized
//! per discussion id (§5) — directly modeled on
//! `runtime::session_lock::SessionLockMap`, generalized from "one turn at
//! a time" to "one orchestrator command at a time" and used to make
//! clear-then-set atomic for the timer registry too (Design Note 3).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

use oc_domain::DiscussionId;

pub struct OperationLockMap {
    locks: SyncMutex<HashMap<DiscussionId, Arc<Mutex<()>>>>,
    held_since: RwLock<HashMap<DiscussionId, DateTime<Utc>>>,
}

impl Default for OperationLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLockMap {
    pub fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
            held_since: RwLock::new(HashMap::new()),
        }
    }

    /// Acquire exclusive access for `discussion_id`. Held for the
    /// duration of the command — released on drop.
    pub async fn acquire(&self, discussion_id: DiscussionId, now: DateTime<Utc>) -> OperationGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock();
            locks
                .entry(discussion_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let permit = mutex.lock_owned().await;
        self.held_since.write().insert(discussion_id, now);
        OperationGuard {
            discussion_id,
            map: self,
            _permit: permit,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Safety net: forcibly drop the registry entry for any lock held
    /// longer than `max_age`. This never releases an in-flight guard —
    /// it only abandons the map entry so a fresh lock is minted on the
    /// next `acquire`, which should never be observably necessary
    /// (§5 — "should never trigger").
    pub fn sweep_orphaned(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> usize {
        let stale: Vec<DiscussionId> = self
            .held_since
            .read()
            .iter()
            .filter(|(_, since)| now.signed_duration_since(**since) > max_age)
            .map(|(id, _)| *id)
            .collect();

        if !stale.is_empty() {
            let mut locks = self.locks.lock();
            let mut held = self.held_since.write();
            for id in &stale {
                locks.remove(id);
                held.remove(id);
                tracing::warn!(discussion_id = %id, "cleared orphaned operation lock");
            }
        }
        stale.len()
    }
}

pub struct OperationGuard<'a> {
    discussion_id: DiscussionId,
    map: &'a OperationLockMap,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.map.held_since.write().remove(&self.discussion_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    #[tokio::test]
    async fn sequential_access_same_discussion() {
        let map = OperationLockMap::new();
        let id = DiscussionId::new();
        let now = Utc::now();
        let g1 = map.acquire(id, now).await;
        drop(g1);
        let g2 = map.acquire(id, now).await;
        drop(g2);
    }

    #[tokio::test]
    async fn different_discussions_do_not_block_each_other() {
        let map = StdArc::new(OperationLockMap::new());
        let now = Utc::now();
        let a = map.acquire(DiscussionId::new(), now).await;
        let b = map.acquire(DiscussionId::new(), now).await;
        assert_eq!(map.tracked_count(), 2);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn drop_releases_held_since_tracking() {
        let map = OperationLockMap::new();
        let id = DiscussionId::new();
        let now = Utc::now();
        {
            let _g = map.acquire(id, now).await;
            assert_eq!(map.held_since.read().len(), 1);
        }
        assert_eq!(map.held_since.read().len(), 0);
    }

    #[tokio::test]
    async fn orphaned_lock_is_swept_after_threshold() {
        let map = OperationLockMap::new();
        let id = DiscussionId::new();
        let held_at = Utc::now() - chrono::Duration::minutes(10);
        let _guard = map.acquire(id, held_at).await;
        let swept = map.sweep_orphaned(Utc::now(), chrono::Duration::minutes(5));
        assert_eq!(swept, 1);
    }
}
