use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::DEFAULT_KUBECTL_PATH;
use crate::constants::DEFAULT_RELIST_BACKOFF_MS;
use crate::Result;

/// kubectl-backed list/watch transport
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,

    /// Delay before re-listing after the watch stream ends
    #[serde(default = "default_relist_backoff_ms")]
    pub relist_backoff_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            kubectl_path: default_kubectl_path(),
            relist_backoff_ms: default_relist_backoff_ms(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kubectl_path.trim().is_empty() {
            return Err(invalid("watch.kubectl_path cannot be empty"));
        }
        Ok(())
    }

    pub fn relist_backoff(&self) -> Duration {
        Duration::from_millis(self.relist_backoff_ms)
    }
}

fn default_kubectl_path() -> String {
    DEFAULT_KUBECTL_PATH.to_string()
}
fn default_relist_backoff_ms() -> u64 {
    DEFAULT_RELIST_BACKOFF_MS
}
