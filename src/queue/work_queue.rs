use std::collections::HashSet;
use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::QueueKey;
use crate::metrics::WORKQUEUE_ADDS;
use crate::metrics::WORKQUEUE_DEPTH;

struct State<K> {
    /// Dispatch order; every entry is also in `dirty`
    queue: VecDeque<K>,
    /// Keys that need processing (queued, or waiting for their current run to finish)
    dirty: HashSet<K>,
    /// Keys handed out by `get` and not yet `done`
    processing: HashSet<K>,
    shutting_down: bool,
}

/// FIFO work queue with per-key deduplication and exclusive dispatch.
///
/// Safe to share between one producer and any number of workers.
pub struct WorkQueue<K: QueueKey> {
    name: String,
    state: Mutex<State<K>>,
    available: Notify,
}

impl<K: QueueKey> WorkQueue<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            available: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks `key` as needing processing.
    ///
    /// No-op when the key is already queued or the queue is shutting down.
    /// A key currently being processed is only marked dirty; `done` requeues it.
    pub fn add(
        &self,
        key: K,
    ) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        if !state.dirty.insert(key.clone()) {
            return;
        }
        WORKQUEUE_ADDS.with_label_values(&[&self.name]).inc();

        if state.processing.contains(&key) {
            debug!(?key, queue = %self.name, "key is in flight, marked dirty");
            return;
        }

        state.queue.push_back(key);
        self.update_depth(&state);
        drop(state);
        self.available.notify_one();
    }

    /// Waits for the next key and marks it as processing.
    ///
    /// Returns `None` once the queue is shutting down.
    pub async fn get(&self) -> Option<K> {
        loop {
            // Registered before checking state so a concurrent add/shutdown is not missed.
            let notified = self.available.notified();
            {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    self.update_depth(&state);
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.available.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Finishes processing of `key`; requeues it if it was added meanwhile.
    pub fn done(
        &self,
        key: &K,
    ) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.shutting_down || !state.dirty.contains(key) {
            return;
        }
        state.queue.push_back(key.clone());
        self.update_depth(&state);
        drop(state);
        self.available.notify_one();
    }

    /// Keys waiting for dispatch.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unblocks every current and future `get`; undispatched keys are dropped.
    pub fn shut_down(&self) {
        let mut state = self.state.lock();
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        let dropped = state.queue.len();
        state.queue.clear();
        state.dirty.clear();
        self.update_depth(&state);
        drop(state);

        debug!(queue = %self.name, dropped, "work queue shutting down");
        self.available.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    fn update_depth(
        &self,
        state: &State<K>,
    ) {
        WORKQUEUE_DEPTH
            .with_label_values(&[&self.name])
            .set(state.queue.len() as i64);
    }
}
