use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::future::Fuse;
use futures::future::FusedFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Reconciler;
use crate::utils::async_task::spawn_task;
use crate::ControllerConfig;
use crate::Error;
use crate::Informer;
use crate::Key;
use crate::LocalCache;
use crate::RateLimitingQueue;
use crate::Resource;
use crate::ResourceEventHandler;
use crate::Result;
use crate::SyncError;
use crate::WatchSource;

/// Watches one resource kind and dispatches its changes to a notifier.
///
/// Built with [`crate::ControllerBuilder`].
pub struct Controller<R: Resource> {
    pub(super) config: ControllerConfig,
    pub(super) cache: Arc<LocalCache<R>>,
    pub(super) queue: Arc<RateLimitingQueue<Key>>,
    pub(super) informer: Arc<Informer<R>>,
    pub(super) source: Arc<dyn WatchSource<R>>,
    pub(super) reconciler: Arc<Reconciler<R>>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl<R: Resource> Controller<R> {
    pub fn cache(&self) -> &Arc<LocalCache<R>> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<RateLimitingQueue<Key>> {
        &self.queue
    }

    /// Runs until the shutdown signal fires.
    ///
    /// Returns `Ok` on shutdown, including shutdown before the cache synced.
    /// Returns [`SyncError`] when the initial listing times out or the watch
    /// source fails before delivering it. In both cases no key is dispatched.
    pub async fn run(mut self) -> Result<()> {
        info!(kind = R::KIND, workers = self.config.workers, "starting controller");

        let source_token = CancellationToken::new();
        let mut source_task = {
            let source = self.source.clone();
            let handler: Arc<dyn ResourceEventHandler<R>> = self.informer.clone();
            let token = source_token.clone();
            tokio::spawn(async move { source.run(handler, token).await }).fuse()
        };

        info!(kind = R::KIND, "waiting for informer cache to sync");
        let sync_timeout = self.config.cache_sync_timeout();
        tokio::select! {
            biased;
            _ = self.shutdown_signal.changed() => {
                info!(kind = R::KIND, "shutdown requested before cache sync");
                self.stop_source(&source_token, source_task).await;
                self.queue.shut_down();
                return Ok(());
            }
            synced = self.cache.wait_for_sync(sync_timeout) => {
                if let Err(e) = synced {
                    error!(kind = R::KIND, "failed to wait for cache to sync: {e}");
                    self.stop_source(&source_token, source_task).await;
                    self.queue.shut_down();
                    return Err(e.into());
                }
            }
            joined = &mut source_task => {
                // Listing may have landed right before the source gave up.
                if !self.informer.has_synced() {
                    let e = source_exit_before_sync(joined);
                    error!(kind = R::KIND, "watch source exited before cache sync: {e}");
                    self.queue.shut_down();
                    return Err(e.into());
                }
                log_source_exit(joined);
            }
        }

        info!(kind = R::KIND, items = self.cache.len(), "cache synced, starting workers");
        let mut handles = Vec::with_capacity(self.config.workers);
        let restart_interval = self.config.worker_restart_interval();
        for id in 0..self.config.workers {
            let reconciler = self.reconciler.clone();
            spawn_task(
                &format!("{}-worker-{id}", R::KIND.to_lowercase()),
                move || supervise_worker(id, reconciler, restart_interval),
                Some(&mut handles),
            );
        }

        tokio::select! {
            _ = self.shutdown_signal.changed() => {}
            joined = &mut source_task => {
                // Keep serving what is cached until told to stop.
                log_source_exit(joined);
                let _ = self.shutdown_signal.changed().await;
            }
        }

        info!(kind = R::KIND, "shutting down controller");
        self.stop_source(&source_token, source_task).await;
        self.queue.shut_down();
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("worker task could not be joined: {e}");
            }
        }
        info!(kind = R::KIND, "controller stopped");
        Ok(())
    }

    async fn stop_source(
        &self,
        token: &CancellationToken,
        task: Fuse<JoinHandle<Result<()>>>,
    ) {
        token.cancel();
        if !task.is_terminated() {
            log_source_exit(task.await);
        }
    }
}

/// Runs one worker slot, restarting the worker after a panic.
async fn supervise_worker<R: Resource>(
    id: usize,
    reconciler: Arc<Reconciler<R>>,
    restart_interval: Duration,
) -> Result<()> {
    loop {
        let worker = reconciler.clone();
        match tokio::spawn(async move { worker.run_worker().await }).await {
            Ok(()) => {
                debug!(id, kind = R::KIND, "worker stopped");
                return Ok(());
            }
            Err(e) if e.is_panic() => {
                if reconciler.is_shutting_down() {
                    return Ok(());
                }
                error!(id, kind = R::KIND, "worker crashed, restarting in {restart_interval:?}: {e}");
                tokio::time::sleep(restart_interval).await;
            }
            Err(e) => return Err(Error::TaskFailed(e)),
        }
    }
}

fn source_exit_before_sync(joined: std::result::Result<Result<()>, JoinError>) -> SyncError {
    match joined {
        Ok(Ok(())) => SyncError::SourceStopped,
        Ok(Err(e)) => SyncError::SourceFailed(e.to_string()),
        Err(e) => SyncError::SourceFailed(e.to_string()),
    }
}

fn log_source_exit(joined: std::result::Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => debug!("watch source stopped"),
        Ok(Err(e)) => error!("watch source failed: {e}"),
        Err(e) => error!("watch source task failed: {e}"),
    }
}
