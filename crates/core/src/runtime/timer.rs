//! Clock & timer registry (§4.1).
//!
//! At most one outstanding timer per discussion id; setting a new timer
//! while one exists atomically cancels the previous one (the HashMap
//! entry is the single source of truth, swapped under one lock — the
//! same "clear-then-set" shape `session_lock::SessionLockMap` uses for
//! run permits). Callbacks run on the tokio worker pool and must re-check
//! discussion status themselves before acting, since the discussion may
//! have been paused between the timer firing and the callback running.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use oc_domain::DiscussionId;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type TimerCallback = Box<dyn FnOnce() -> BoxFuture + Send>;

pub struct TimerRegistry {
    handles: Mutex<HashMap<DiscussionId, JoinHandle<()>>>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `callback` to run after `duration`. Any existing timer
    /// for `discussion_id` is cancelled first. A callback panic is
    /// caught by the surrounding `tokio::spawn` and never propagates
    /// past the registry — errors inside the callback itself are the
    /// callback's own job to log (§4.1: "failures ... are logged and
    /// swallowed; they never abort the registry").
    pub fn schedule(&self, discussion_id: DiscussionId, duration: std::time::Duration, callback: TimerCallback) {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            callback().await;
        });
        let mut handles = self.handles.lock();
        if let Some(old) = handles.insert(discussion_id, handle) {
            old.abort();
        }
    }

    /// Idempotent: cancelling a timer that doesn't exist is a no-op.
    pub fn cancel(&self, discussion_id: DiscussionId) {
        if let Some(handle) = self.handles.lock().remove(&discussion_id) {
            handle.abort();
        }
    }

    pub fn has_timer(&self, discussion_id: DiscussionId) -> bool {
        self.handles.lock().contains_key(&discussion_id)
    }

    pub fn active_count(&self) -> usize {
        self.handles.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_after_duration() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicU32::new(0));
        let id = DiscussionId::new();
        let fired2 = fired.clone();
        registry.schedule(
            id,
            std::time::Duration::from_millis(10),
            Box::new(move || {
                Box::pin(async move {
                    fired2.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rescheduling_cancels_previous_timer() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicU32::new(0));
        let id = DiscussionId::new();

        let f1 = fired.clone();
        registry.schedule(
            id,
            std::time::Duration::from_millis(200),
            Box::new(move || Box::pin(async move { f1.fetch_add(1, Ordering::SeqCst); })),
        );

        let f2 = fired.clone();
        registry.schedule(
            id,
            std::time::Duration::from_millis(10),
            Box::new(move || Box::pin(async move { f2.fetch_add(10, Ordering::SeqCst); })),
        );

        tokio::time::sleep(std::time::Duration::from_millis(260)).await;
        // Only the second timer should have fired; the first was aborted.
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let registry = TimerRegistry::new();
        registry.cancel(DiscussionId::new());
        registry.cancel(DiscussionId::new());
    }

    #[tokio::test]
    async fn at_most_one_timer_per_discussion() {
        let registry = TimerRegistry::new();
        let id = DiscussionId::new();
        for _ in 0..5 {
            registry.schedule(id, std::time::Duration::from_secs(5), Box::new(|| Box::pin(async {})));
        }
        assert_eq!(registry.active_count(), 1);
    }
}
