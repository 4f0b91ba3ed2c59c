//! Deduplicating, rate-limited change queue.
//!
//! Layers, leaves first:
//! - [`WorkQueue`]: FIFO with dirty/processing sets, so a key is never handed
//!   to two workers at once and a change arriving mid-processing is
//!   re-dispatched exactly once after `done`.
//! - [`RateLimiter`]: computes how long a failed key waits before it is
//!   eligible again.
//! - [`RateLimitingQueue`]: the two above plus a delaying loop that re-adds
//!   keys once their backoff has elapsed.

mod rate_limiter;
mod rate_limiting_queue;
mod work_queue;
pub use rate_limiter::*;
pub use rate_limiting_queue::*;
pub use work_queue::*;

#[cfg(test)]
mod rate_limiting_queue_test;
#[cfg(test)]
mod work_queue_test;

use std::fmt::Debug;
use std::hash::Hash;

/// Anything usable as a queue entry.
pub trait QueueKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
