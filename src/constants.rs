// -
// Reconcile loop

/// Attempts made for a single change before the key is dropped
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delay before a crashed worker is restarted
pub(crate) const DEFAULT_WORKER_RESTART_INTERVAL_MS: u64 = 1000;

pub(crate) const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

pub(crate) const DEFAULT_CACHE_SYNC_TIMEOUT_MS: u64 = 60_000;

pub(crate) const DEFAULT_MESSAGE_PREFIX: &str = "DeployBot";

// -
// Rate limiting

/// Per-key exponential backoff base (5ms) and ceiling (1000s)
pub(crate) const DEFAULT_BASE_DELAY_MS: u64 = 5;
pub(crate) const DEFAULT_MAX_DELAY_MS: u64 = 1_000_000;

/// Overall token bucket shared by all keys
pub(crate) const DEFAULT_BUCKET_QPS: f64 = 10.0;
pub(crate) const DEFAULT_BUCKET_BURST: u32 = 100;

// -
// Watch transport

pub(crate) const DEFAULT_KUBECTL_PATH: &str = "kubectl";
pub(crate) const DEFAULT_RELIST_BACKOFF_MS: u64 = 1000;

// -
// Mattermost API v4 routes

pub(crate) const MATTERMOST_LOGIN_PATH: &str = "/api/v4/users/login";
pub(crate) const MATTERMOST_POSTS_PATH: &str = "/api/v4/posts";
pub(crate) const MATTERMOST_TOKEN_HEADER: &str = "Token";
