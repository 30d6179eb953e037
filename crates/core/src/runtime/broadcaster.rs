//! Broadcaster (§4.3) — per-discussion subscriber set.
//!
//! Directly modeled on `runtime::runs::RunStore`'s per-run
//! `broadcast::Sender` bookkeeping: one channel per discussion id,
//! created lazily on first subscribe, torn down when nobody's listening.
//! `tokio::sync::broadcast` already gives us "one slow/lagged subscriber
//! never blocks the others" for free — a lagged receiver just misses
//! messages and keeps going.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use oc_domain::{DiscussionId, Event};

const CHANNEL_CAPACITY: usize = 128;

pub struct Broadcaster {
    channels: RwLock<HashMap<DiscussionId, broadcast::Sender<Event>>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new subscriber for `discussion_id`. Concurrent-safe;
    /// subscribers may appear and disappear at any time.
    pub fn subscribe(&self, discussion_id: DiscussionId) -> broadcast::Receiver<Event> {
        if let Some(tx) = self.channels.read().get(&discussion_id) {
            return tx.subscribe();
        }
        let mut channels = self.channels.write();
        channels
            .entry(discussion_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver `event` to every current subscriber of its discussion.
    /// A missing channel (nobody ever subscribed) is not an error.
    pub fn broadcast(&self, event: &Event) {
        let channels = self.channels.read();
        if let Some(tx) = channels.get(&event.discussion_id) {
            // `send` returns the receiver count, or Err if there are
            // none — either way this never blocks and never fails the
            // caller's command.
            let _ = tx.send(event.clone());
        }
    }

    pub fn subscriber_count(&self, discussion_id: DiscussionId) -> usize {
        self.channels
            .read()
            .get(&discussion_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel for a discussion with no live subscribers
    /// (called from the cleanup sweep alongside cache eviction).
    pub fn prune_idle(&self, discussion_id: DiscussionId) {
        let mut channels = self.channels.write();
        if channels
            .get(&discussion_id)
            .map(|tx| tx.receiver_count() == 0)
            .unwrap_or(false)
        {
            channels.remove(&discussion_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use oc_domain::EventData;

    fn sample_event(discussion_id: DiscussionId) -> Event {
        Event::new(
            discussion_id,
            EventData::StatusChanged {
                from: "draft".into(),
                to: "active".into(),
            },
            "test",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn delivers_to_all_live_subscribers() {
        let b = Broadcaster::new();
        let id = DiscussionId::new();
        let mut r1 = b.subscribe(id);
        let mut r2 = b.subscribe(id);
        b.broadcast(&sample_event(id));
        assert!(r1.recv().await.is_ok());
        assert!(r2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers_does_not_panic() {
        let b = Broadcaster::new();
        b.broadcast(&sample_event(DiscussionId::new()));
    }

    #[tokio::test]
    async fn one_dropped_subscriber_does_not_affect_another() {
        let b = Broadcaster::new();
        let id = DiscussionId::new();
        let r1 = b.subscribe(id);
        let mut r2 = b.subscribe(id);
        drop(r1);
        b.broadcast(&sample_event(id));
        assert!(r2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn prune_idle_removes_channel_with_no_subscribers() {
        let b = Broadcaster::new();
        let id = DiscussionId::new();
        {
            let _r = b.subscribe(id);
        }
        b.prune_idle(id);
        assert_eq!(b.subscriber_count(id), 0);
    }
}
