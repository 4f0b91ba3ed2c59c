//! Error hierarchy for the watch / queue / reconcile pipeline.
//!
//! Per-key processing failures stay inside the reconcile loop; only
//! configuration, cache-sync and fatal startup failures surface to the caller
//! of [`crate::Controller::run`].

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Downstream notification failures (transient, retried per key)
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Initial cache synchronization failures
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Watch transport failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Local I/O failures (log directory, signal handlers)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Background task could not be joined
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the chat server
    #[error("Chat server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Channel {channel} not found in team {team}")]
    ChannelNotFound { team: String, channel: String },

    /// Notifier call exceeded the per-attempt budget
    #[error("Notification timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Timed out waiting for caches to sync after {0:?}")]
    Timeout(Duration),

    /// The watch source failed before delivering its initial listing
    #[error("Watch source failed before initial sync: {0}")]
    SourceFailed(String),

    /// The watch source returned without ever listing
    #[error("Watch source stopped before initial sync")]
    SourceStopped,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to spawn watch transport: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Watch transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode watch payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The API server reported an error status on the stream
    #[error("Watch stream error: {0}")]
    Status(String),

    #[error("Watch event channel closed")]
    StreamClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Object has no name")]
    MissingName,
}

