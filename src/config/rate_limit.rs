use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::DEFAULT_BASE_DELAY_MS;
use crate::constants::DEFAULT_BUCKET_BURST;
use crate::constants::DEFAULT_BUCKET_QPS;
use crate::constants::DEFAULT_MAX_DELAY_MS;
use crate::Result;

/// Change queue requeue policy.
///
/// The effective delay of a rate-limited requeue is the longer of the per-key
/// exponential backoff and the overall token bucket.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimiterConfig {
    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Token bucket refill rate shared by all keys
    #[serde(default = "default_qps")]
    pub qps: f64,

    /// Token bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            qps: default_qps(),
            burst: default_burst(),
        }
    }
}

impl RateLimiterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(invalid("rate_limit.base_delay_ms cannot be 0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(format!(
                "rate_limit.max_delay_ms {} must be >= base_delay_ms {}",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if !self.qps.is_finite() || self.qps <= 0.0 {
            return Err(invalid(format!("rate_limit.qps {} must be positive", self.qps)));
        }
        if self.burst == 0 {
            return Err(invalid("rate_limit.burst cannot be 0"));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_qps() -> f64 {
    DEFAULT_BUCKET_QPS
}
fn default_burst() -> u32 {
    DEFAULT_BUCKET_BURST
}
