//! Notifier capability: delivers one human readable message per processed
//! change.
//!
//! Implementations are long-lived and injected once into the controller;
//! any session or connection they need is held and refreshed internally.

mod log_notifier;
mod mattermost;
mod message;
pub use log_notifier::*;
pub use mattermost::*;
pub use message::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::NotifyError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Delivers `message`. An `Err` is treated as transient by the caller.
    async fn notify(
        &self,
        message: &str,
    ) -> Result<(), NotifyError>;
}
