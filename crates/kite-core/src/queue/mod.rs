mod limiter;
pub use limiter::{
    BackoffConfig, BucketConfig, BucketLimiter, ExponentialLimiter, MaxOfLimiter, RateLimiter,
    default_controller_limiter,
};

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};
use tracing::trace;

use kite_model::ResourceKey;

use crate::{
    metrics::{ControllerMetrics, NoopMetrics},
    sync::lock,
};

/// Deduplicating, rate-limited queue of resource keys.
///
/// A key is in at most one of three places at a time from the queue's point of view:
/// - *ready*: enqueued and waiting for a worker;
/// - *in flight*: handed out by [`ChangeQueue::get`] and not yet [`ChangeQueue::done`];
/// - *delayed*: scheduled by [`ChangeQueue::add_after`] and not yet due.
///
/// Adding a ready key is a no-op. Adding an in-flight key marks it dirty, and it is re-queued
/// as soon as the worker calls `done`, so no change is lost and no two workers ever hold the
/// same key.
#[derive(Clone)]
pub struct ChangeQueue {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    limiter: Box<dyn RateLimiter>,
    metrics: Arc<dyn ControllerMetrics>,
}

#[derive(Default)]
struct QueueState {
    /// Ready keys in FIFO order.
    queue: VecDeque<ResourceKey>,
    /// Keys that need processing (ready, or in flight with a newer change).
    dirty: HashSet<ResourceKey>,
    /// Keys currently held by a worker.
    processing: HashSet<ResourceKey>,
    /// Delayed keys and the instant they become ready.
    waiting: HashMap<ResourceKey, Instant>,
    shutting_down: bool,
}

impl QueueState {
    /// Returns `true` if the key was appended to the ready queue.
    fn insert(&mut self, key: ResourceKey) -> bool {
        if self.shutting_down || !self.dirty.insert(key.clone()) {
            return false;
        }
        if self.processing.contains(&key) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    fn promote_due(&mut self, now: Instant) {
        let mut due: Vec<(Instant, ResourceKey)> = self
            .waiting
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (*at, k.clone()))
            .collect();
        if due.is_empty() {
            return;
        }
        due.sort();
        for (_, key) in due {
            self.waiting.remove(&key);
            self.insert(key);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.waiting.values().min().copied()
    }
}

impl ChangeQueue {
    pub fn new(limiter: impl RateLimiter + 'static) -> Self {
        Self::with_metrics(Box::new(limiter), Arc::new(NoopMetrics))
    }

    pub fn with_metrics(limiter: Box<dyn RateLimiter>, metrics: Arc<dyn ControllerMetrics>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                limiter,
                metrics,
            }),
        }
    }

    /// Queue with the default controller limiter.
    pub fn with_default_limiter() -> Self {
        Self::new(default_controller_limiter(
            BackoffConfig::default(),
            BucketConfig::default(),
        ))
    }

    /// Mark `key` as needing processing.
    pub fn add(&self, key: ResourceKey) {
        let queued = {
            let mut st = lock(&self.shared.state);
            let queued = st.insert(key);
            if queued {
                self.shared.metrics.queue_added();
                self.shared.metrics.queue_depth(st.queue.len());
            }
            queued
        };
        if queued {
            self.shared.notify.notify_one();
        }
    }

    /// Wait for the next ready key.
    ///
    /// Returns `None` once the queue has been shut down; callers must stop pulling work then.
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a wakeup between the check and the await is
            // not lost.
            notified.as_mut().enable();

            let deadline = {
                let mut st = lock(&self.shared.state);
                if st.shutting_down {
                    return None;
                }
                st.promote_due(Instant::now());
                if let Some(key) = st.queue.pop_front() {
                    st.dirty.remove(&key);
                    st.processing.insert(key.clone());
                    self.shared.metrics.queue_depth(st.queue.len());
                    return Some(key);
                }
                st.next_deadline()
            };

            match deadline {
                Some(at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release a key obtained from [`ChangeQueue::get`].
    ///
    /// If the key was added again while in flight it goes straight back to the ready queue.
    pub fn done(&self, key: &ResourceKey) {
        let requeued = {
            let mut st = lock(&self.shared.state);
            st.processing.remove(key);
            if st.dirty.contains(key) && !st.shutting_down {
                st.queue.push_back(key.clone());
                self.shared.metrics.queue_depth(st.queue.len());
                true
            } else {
                false
            }
        };
        if requeued {
            trace!(%key, "key changed while in flight; requeued");
            self.shared.notify.notify_one();
        }
    }

    /// Make `key` ready after `delay`.
    ///
    /// A key already waiting keeps the earlier of the two deadlines.
    pub fn add_after(&self, key: ResourceKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut st = lock(&self.shared.state);
            if st.shutting_down {
                return;
            }
            let at = Instant::now() + delay;
            st.waiting
                .entry(key)
                .and_modify(|cur| {
                    if at < *cur {
                        *cur = at;
                    }
                })
                .or_insert(at);
        }
        // Every sleeping worker recomputes its deadline.
        self.shared.notify.notify_waiters();
    }

    /// Schedule a retry of `key` after the limiter's backoff.
    pub fn add_rate_limited(&self, key: ResourceKey) {
        let delay = self.shared.limiter.when(&key);
        trace!(%key, delay_ms = delay.as_millis() as u64, "retry scheduled");
        self.shared.metrics.queue_retried();
        self.add_after(key, delay);
    }

    /// Clear retry history for `key`.
    pub fn forget(&self, key: &ResourceKey) {
        self.shared.limiter.forget(key);
    }

    pub fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.shared.limiter.num_requeues(key)
    }

    /// Close the queue and wake every blocked [`ChangeQueue::get`].
    ///
    /// In-flight keys may still be released with `done`; nothing is handed out afterwards.
    pub fn shutdown(&self) {
        lock(&self.shared.state).shutting_down = true;
        self.shared.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        lock(&self.shared.state).shutting_down
    }

    /// Number of ready keys.
    pub fn len(&self) -> usize {
        lock(&self.shared.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys waiting on a delay.
    pub fn delayed(&self) -> usize {
        lock(&self.shared.state).waiting.len()
    }
}
