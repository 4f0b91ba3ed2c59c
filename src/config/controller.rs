use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::DEFAULT_CACHE_SYNC_TIMEOUT_MS;
use crate::constants::DEFAULT_MAX_RETRIES;
use crate::constants::DEFAULT_MESSAGE_PREFIX;
use crate::constants::DEFAULT_NOTIFY_TIMEOUT_MS;
use crate::constants::DEFAULT_WORKER_RESTART_INTERVAL_MS;
use crate::Result;

/// Which resource collection the controller watches
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    Deployment,
    Pod,
}

/// Reconcile loop parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Number of workers pulling from the change queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per change before the key is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long to wait for the initial listing (0 waits forever)
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,

    /// Delay before a crashed worker is restarted
    #[serde(default = "default_worker_restart_interval_ms")]
    pub worker_restart_interval_ms: u64,

    /// Per-attempt budget for a notifier call (0 disables the timeout)
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,

    /// Leading tag of every chat message
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,

    #[serde(default)]
    pub resource_kind: ResourceKind,

    /// Restrict the watch to one namespace; all namespaces when unset
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
            worker_restart_interval_ms: default_worker_restart_interval_ms(),
            notify_timeout_ms: default_notify_timeout_ms(),
            message_prefix: default_message_prefix(),
            resource_kind: ResourceKind::default(),
            namespace: None,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(invalid("controller.workers must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("controller.max_retries must be at least 1"));
        }
        if self.worker_restart_interval_ms == 0 {
            return Err(invalid("controller.worker_restart_interval_ms cannot be 0"));
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() || ns.contains('/') {
                return Err(invalid(format!("controller.namespace {ns:?} is not a valid namespace")));
            }
        }
        Ok(())
    }

    pub fn cache_sync_timeout(&self) -> Option<Duration> {
        (self.cache_sync_timeout_ms > 0).then(|| Duration::from_millis(self.cache_sync_timeout_ms))
    }

    pub fn notify_timeout(&self) -> Option<Duration> {
        (self.notify_timeout_ms > 0).then(|| Duration::from_millis(self.notify_timeout_ms))
    }

    pub fn worker_restart_interval(&self) -> Duration {
        Duration::from_millis(self.worker_restart_interval_ms)
    }
}

fn default_workers() -> usize {
    1
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_cache_sync_timeout_ms() -> u64 {
    DEFAULT_CACHE_SYNC_TIMEOUT_MS
}
fn default_worker_restart_interval_ms() -> u64 {
    DEFAULT_WORKER_RESTART_INTERVAL_MS
}
fn default_notify_timeout_ms() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_MS
}
fn default_message_prefix() -> String {
    DEFAULT_MESSAGE_PREFIX.to_string()
}
