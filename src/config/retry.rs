use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.max_retries == 0 {
            return Err(invalid(format!("{name}.max_retries must be at least 1")));
        }
        if self.timeout_ms == 0 {
            return Err(invalid(format!("{name}.timeout_ms cannot be 0")));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(format!(
                "{name}.max_delay_ms {} must be >= base_delay_ms {}",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Longest time a caller can wait on this policy: every attempt timing
    /// out, plus the capped doubling pauses with full jitter.
    pub fn worst_case(&self) -> Duration {
        let attempts = Duration::from_millis(self.timeout_ms).saturating_mul(self.max_retries as u32);
        let mut pauses = Duration::ZERO;
        let mut delay = self.base_delay_ms;
        for _ in 1..self.max_retries {
            pauses += Duration::from_millis(delay + delay / 10);
            delay = delay.saturating_mul(2).min(self.max_delay_ms);
        }
        attempts + pauses
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    5000
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5000
}
