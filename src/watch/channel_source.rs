use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ResourceEventHandler;
use super::WatchEvent;
use super::WatchSource;
use crate::Resource;
use crate::Result;
use crate::WatchError;

/// Watch source fed through a channel.
///
/// For embedders that own their transport, and for tests. The sender side
/// must start with a [`WatchEvent::Listed`]. Dropping every sender ends the
/// watch with [`WatchError::StreamClosed`].
pub struct ChannelWatchSource<R> {
    rx: Mutex<mpsc::UnboundedReceiver<WatchEvent<R>>>,
}

impl<R: Resource> ChannelWatchSource<R> {
    pub fn new() -> (mpsc::UnboundedSender<WatchEvent<R>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl<R: Resource> WatchSource<R> for ChannelWatchSource<R> {
    async fn run(
        &self,
        handler: Arc<dyn ResourceEventHandler<R>>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut rx = self.rx.lock().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(kind = R::KIND, "channel watch stopped");
                    return Ok(());
                }
                event = rx.recv() => match event {
                    Some(event) => event.dispatch(handler.as_ref()),
                    None => return Err(WatchError::StreamClosed.into()),
                },
            }
        }
    }
}
