use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;

/// Runs `task` up to `policy.max_retries` times, bounding each attempt by
/// `policy.timeout_ms` and doubling the pause between attempts up to
/// `policy.max_delay_ms`.
///
/// A timed out attempt is reported through `on_timeout`. The last error is
/// returned once attempts are exhausted.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P, E>(
    task: F,
    policy: BackoffPolicy,
    on_timeout: fn(Duration) -> E,
) -> std::result::Result<P, E>
where
    F: Fn() -> T,
    T: Future<Output = std::result::Result<P, E>>,
    E: Debug,
{
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let e = match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) => e,
            Err(_) => on_timeout(timeout_duration),
        };

        if attempt >= policy.max_retries {
            warn!(attempt, "task failed after max retries: {:?}", e);
            return Err(e);
        }
        warn!(attempt, ?delay, "task failed, backing off: {:?}", e);

        sleep(with_jitter(delay)).await;
        delay = (delay * 2).min(max_delay);
    }
}

/// Adds up to 10% random jitter so concurrent retries spread out.
fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// Spawns a named task, logging its error instead of dropping it silently.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
