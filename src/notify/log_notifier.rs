use async_trait::async_trait;
use tracing::info;

use super::Notifier;
use crate::NotifyError;

/// Writes notifications to the log only. Used when no chat server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        message: &str,
    ) -> Result<(), NotifyError> {
        info!(target: "deploybot::notify", "{message}");
        Ok(())
    }
}
