use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::metrics::RECONCILE_DURATION;
use crate::metrics::RECONCILE_TOTAL;
use crate::ChangeNotice;
use crate::Key;
use crate::LocalCache;
use crate::Notifier;
use crate::NotifyError;
use crate::RateLimitingQueue;
use crate::Resource;

/// Result of one pass through the reconcile state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Notified; the retry counter was reset
    Succeeded,
    /// Failed and scheduled again after backoff. `attempt` counts failures so far.
    Requeued { attempt: u32 },
    /// Failed for the last allowed time and was given up on
    Dropped,
    /// The queue is shutting down; the worker must exit
    Stopped,
}

/// Turns queued keys into notifications.
pub struct Reconciler<R: Resource> {
    cache: Arc<LocalCache<R>>,
    queue: Arc<RateLimitingQueue<Key>>,
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
    notify_timeout: Option<Duration>,
    message_prefix: String,
}

/// Marks the key done when dropped, including when a worker unwinds.
struct InFlight<'a> {
    queue: &'a RateLimitingQueue<Key>,
    key: &'a Key,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

impl<R: Resource> Reconciler<R> {
    pub fn new(
        cache: Arc<LocalCache<R>>,
        queue: Arc<RateLimitingQueue<Key>>,
        notifier: Arc<dyn Notifier>,
        max_retries: u32,
        notify_timeout: Option<Duration>,
        message_prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            queue,
            notifier,
            max_retries,
            notify_timeout,
            message_prefix: message_prefix.into(),
        }
    }

    /// Processes keys until the queue shuts down.
    pub async fn run_worker(&self) {
        while self.process_next_item().await != ProcessOutcome::Stopped {}
    }

    /// Blocks for the next key, dispatches it and applies the retry policy.
    pub async fn process_next_item(&self) -> ProcessOutcome {
        let Some(key) = self.queue.get().await else {
            return ProcessOutcome::Stopped;
        };

        let in_flight = InFlight {
            queue: &self.queue,
            key: &key,
        };
        let timer = RECONCILE_DURATION.with_label_values(&[R::KIND]).start_timer();
        let result = self.sync(&key).await;
        timer.observe_duration();
        drop(in_flight);

        self.handle_result(key, result)
    }

    async fn sync(
        &self,
        key: &Key,
    ) -> Result<(), NotifyError> {
        let notice = match self.cache.get(key) {
            Some(obj) => ChangeNotice::created(&obj),
            None => ChangeNotice::deleted::<R>(key),
        };
        let message = notice.render(&self.message_prefix);

        match self.notify_timeout {
            Some(t) => timeout(t, self.notifier.notify(&message))
                .await
                .map_err(|_| NotifyError::Timeout(t))?,
            None => self.notifier.notify(&message).await,
        }
    }

    fn handle_result(
        &self,
        key: Key,
        result: Result<(), NotifyError>,
    ) -> ProcessOutcome {
        let e = match result {
            Ok(()) => {
                debug!(%key, kind = R::KIND, "dispatched");
                self.queue.forget(&key);
                RECONCILE_TOTAL.with_label_values(&[R::KIND, "success"]).inc();
                return ProcessOutcome::Succeeded;
            }
            Err(e) => e,
        };

        let attempt = self.queue.num_requeues(&key) + 1;
        if attempt < self.max_retries {
            warn!(%key, kind = R::KIND, attempt, error = %e, "error syncing, will retry");
            RECONCILE_TOTAL.with_label_values(&[R::KIND, "retry"]).inc();
            self.queue.add_rate_limited(key);
            ProcessOutcome::Requeued { attempt }
        } else {
            error!(%key, kind = R::KIND, attempt, error = %e, "dropping key out of the queue, giving up");
            RECONCILE_TOTAL.with_label_values(&[R::KIND, "dropped"]).inc();
            self.queue.forget(&key);
            ProcessOutcome::Dropped
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.queue.is_shutting_down()
    }
}
