use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::QueueKey;
use super::RateLimiter;
use super::WorkQueue;
use crate::metrics::WORKQUEUE_RETRIES;

/// Upper bound on how long the delaying loop sleeps without re-checking.
const MAX_WAIT: Duration = Duration::from_secs(10);

/// A key waiting for its backoff to elapse.
struct Waiting<K> {
    ready_at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for Waiting<K> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<K> Eq for Waiting<K> {}

impl<K> PartialOrd for Waiting<K> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Waiting<K> {
    // Reversed: BinaryHeap is a max-heap, the earliest deadline must be on top.
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct DelayState<K> {
    heap: BinaryHeap<Waiting<K>>,
    /// Live entry per key; heap entries not matching are stale
    earliest: HashMap<K, (Instant, u64)>,
    next_seq: u64,
}

struct Delayed<K> {
    state: Mutex<DelayState<K>>,
    wakeup: Notify,
}

impl<K: QueueKey> Delayed<K> {
    /// Records `key` as ready at `ready_at`; an earlier pending deadline wins.
    fn insert(
        &self,
        key: K,
        ready_at: Instant,
    ) -> bool {
        let mut state = self.state.lock();
        if let Some((existing, _)) = state.earliest.get(&key) {
            if *existing <= ready_at {
                return false;
            }
        }
        let seq = state.next_seq;
        state.next_seq = state.next_seq.wrapping_add(1);
        state.earliest.insert(key.clone(), (ready_at, seq));
        state.heap.push(Waiting { ready_at, seq, key });
        true
    }

    /// Moves every due key into `queue`; returns the next deadline.
    fn drain_ready(
        &self,
        queue: &WorkQueue<K>,
        now: Instant,
    ) -> Option<Instant> {
        let mut state = self.state.lock();
        while let Some(top) = state.heap.peek() {
            if top.ready_at > now {
                return Some(top.ready_at);
            }
            let Some(entry) = state.heap.pop() else {
                break;
            };
            if state.earliest.get(&entry.key) == Some(&(entry.ready_at, entry.seq)) {
                state.earliest.remove(&entry.key);
                trace!(key = ?entry.key, "backoff elapsed");
                queue.add(entry.key);
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.state.lock().earliest.len()
    }
}

/// Work queue with delayed and rate-limited re-adds.
///
/// Owns a background delaying loop; must be created inside a tokio runtime.
/// The loop stops on [`RateLimitingQueue::shut_down`] or when the queue is dropped.
pub struct RateLimitingQueue<K: QueueKey> {
    queue: Arc<WorkQueue<K>>,
    delayed: Arc<Delayed<K>>,
    limiter: Box<dyn RateLimiter<K>>,
    cancel: CancellationToken,
}

impl<K: QueueKey> RateLimitingQueue<K> {
    pub fn new(
        name: impl Into<String>,
        limiter: Box<dyn RateLimiter<K>>,
    ) -> Self {
        let queue = Arc::new(WorkQueue::new(name));
        let delayed = Arc::new(Delayed {
            state: Mutex::new(DelayState {
                heap: BinaryHeap::new(),
                earliest: HashMap::new(),
                next_seq: 0,
            }),
            wakeup: Notify::new(),
        });
        let cancel = CancellationToken::new();

        tokio::spawn(waiting_loop(queue.clone(), delayed.clone(), cancel.clone()));

        Self {
            queue,
            delayed,
            limiter,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    pub fn add(
        &self,
        key: K,
    ) {
        self.queue.add(key);
    }

    /// Adds `key` once `delay` has elapsed.
    pub fn add_after(
        &self,
        key: K,
        delay: Duration,
    ) {
        if self.queue.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.queue.add(key);
            return;
        }
        if self.delayed.insert(key, Instant::now() + delay) {
            self.delayed.wakeup.notify_one();
        }
    }

    /// Requeues `key` after the limiter's backoff; counts as one failure.
    pub fn add_rate_limited(
        &self,
        key: K,
    ) {
        let delay = self.limiter.when(&key);
        WORKQUEUE_RETRIES.with_label_values(&[self.queue.name()]).inc();
        debug!(?key, ?delay, queue = %self.queue.name(), "rate limited requeue");
        self.add_after(key, delay);
    }

    pub fn forget(
        &self,
        key: &K,
    ) {
        self.limiter.forget(key);
    }

    pub fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.limiter.num_requeues(key)
    }

    pub async fn get(&self) -> Option<K> {
        self.queue.get().await
    }

    pub fn done(
        &self,
        key: &K,
    ) {
        self.queue.done(key);
    }

    /// Keys ready for dispatch (excludes keys still backing off).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Keys still waiting for their backoff to elapse.
    pub fn waiting(&self) -> usize {
        self.delayed.len()
    }

    pub fn shut_down(&self) {
        self.cancel.cancel();
        self.queue.shut_down();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }
}

impl<K: QueueKey> Drop for RateLimitingQueue<K> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn waiting_loop<K: QueueKey>(
    queue: Arc<WorkQueue<K>>,
    delayed: Arc<Delayed<K>>,
    cancel: CancellationToken,
) {
    loop {
        let now = Instant::now();
        let deadline = delayed
            .drain_ready(&queue, now)
            .unwrap_or(now + MAX_WAIT)
            .min(now + MAX_WAIT);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(queue = %queue.name(), "delaying loop stopped");
                return;
            }
            _ = delayed.wakeup.notified() => {}
            _ = sleep_until(deadline) => {}
        }
    }
}
