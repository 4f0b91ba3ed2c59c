use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::QueueKey;
use crate::RateLimiterConfig;

/// Decides how long a key waits before it is eligible again.
pub trait RateLimiter<K>: Send + Sync {
    /// Delay for the next requeue of `key`; records one more failure.
    fn when(
        &self,
        key: &K,
    ) -> Duration;

    /// Stops tracking `key`, resetting its backoff.
    fn forget(
        &self,
        key: &K,
    );

    /// Failures recorded for `key` since the last `forget`.
    fn num_requeues(
        &self,
        key: &K,
    ) -> u32;
}

/// Per-key `base * 2^failures`, capped at `max`.
pub struct ItemExponentialFailureRateLimiter<K: QueueKey> {
    failures: DashMap<K, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<K: QueueKey> ItemExponentialFailureRateLimiter<K> {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay,
        }
    }

    fn backoff(
        &self,
        exp: u32,
    ) -> Duration {
        2u32.checked_pow(exp)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl<K: QueueKey> RateLimiter<K> for ItemExponentialFailureRateLimiter<K> {
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        let mut failures = self.failures.entry(key.clone()).or_insert(0);
        let exp = *failures;
        *failures = exp.saturating_add(1);
        self.backoff(exp)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        self.failures.remove(key);
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.failures.get(key).map_or(0, |f| *f)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket: `burst` immediate requeues, then `qps` per second
/// across all keys.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    pub fn new(
        qps: f64,
        burst: u32,
    ) -> Self {
        Self {
            qps,
            burst: f64::from(burst),
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }
}

impl<K> RateLimiter<K> for BucketRateLimiter {
    fn when(
        &self,
        _key: &K,
    ) -> Duration {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;

        // Reserve a token even when the bucket is empty; the debt is the wait.
        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }

    fn forget(
        &self,
        _key: &K,
    ) {
    }

    fn num_requeues(
        &self,
        _key: &K,
    ) -> u32 {
        0
    }
}

/// Waits for the slowest of its members.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfRateLimiter<K> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K: Send + Sync> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        self.limiters
            .iter()
            .map(|l| l.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        self.limiters.iter().for_each(|l| l.forget(key));
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter<K: QueueKey>(config: &RateLimiterConfig) -> MaxOfRateLimiter<K> {
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            config.base_delay(),
            config.max_delay(),
        )),
        Box::new(BucketRateLimiter::new(config.qps, config.burst)),
    ])
}
