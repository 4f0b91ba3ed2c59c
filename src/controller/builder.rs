//! Assembles a [`Controller`] for one resource kind.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let controller = ControllerBuilder::<Deployment>::new(config, shutdown_rx)
//!     .watch_source(Arc::new(KubectlWatchSource::new(&watch_config, None)))
//!     .notifier(Arc::new(MattermostNotifier::new(mattermost_config)))
//!     .build()?;
//! controller.run().await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use super::Controller;
use super::Reconciler;
use crate::default_controller_rate_limiter;
use crate::meta_namespace_key_func;
use crate::BotConfig;
use crate::Error;
use crate::Informer;
use crate::Key;
use crate::KeyFunc;
use crate::LocalCache;
use crate::LogNotifier;
use crate::Notifier;
use crate::RateLimiter;
use crate::RateLimitingQueue;
use crate::Resource;
use crate::Result;
use crate::WatchSource;

pub struct ControllerBuilder<R: Resource> {
    config: BotConfig,
    shutdown_signal: watch::Receiver<()>,
    source: Option<Arc<dyn WatchSource<R>>>,
    notifier: Option<Arc<dyn Notifier>>,
    key_func: KeyFunc<R>,
    rate_limiter: Option<Box<dyn RateLimiter<Key>>>,
}

impl<R: Resource> ControllerBuilder<R> {
    pub fn new(
        config: BotConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
            source: None,
            notifier: None,
            key_func: meta_namespace_key_func::<R>,
            rate_limiter: None,
        }
    }

    /// Required.
    pub fn watch_source(
        mut self,
        source: Arc<dyn WatchSource<R>>,
    ) -> Self {
        self.source = Some(source);
        self
    }

    /// Defaults to [`LogNotifier`].
    pub fn notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Defaults to [`meta_namespace_key_func`].
    pub fn key_func(
        mut self,
        key_func: KeyFunc<R>,
    ) -> Self {
        self.key_func = key_func;
        self
    }

    /// Defaults to [`default_controller_rate_limiter`] built from the `rate_limit` section.
    pub fn rate_limiter(
        mut self,
        rate_limiter: Box<dyn RateLimiter<Key>>,
    ) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Wires cache, queue, informer and reconciler together.
    ///
    /// Must be called inside a tokio runtime: the queue starts its delaying
    /// loop immediately.
    pub fn build(self) -> Result<Controller<R>> {
        let config = self.config.validate()?;
        let source = self
            .source
            .ok_or_else(|| Error::Fatal(format!("no watch source configured for {}", R::KIND)))?;
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Box::new(default_controller_rate_limiter(&config.rate_limit)));

        let cache = Arc::new(LocalCache::new());
        let queue = Arc::new(RateLimitingQueue::new(R::KIND.to_lowercase(), rate_limiter));
        let informer = Arc::new(Informer::new(cache.clone(), queue.clone(), self.key_func));
        let reconciler = Arc::new(Reconciler::new(
            cache.clone(),
            queue.clone(),
            notifier,
            config.controller.max_retries,
            config.controller.notify_timeout(),
            config.controller.message_prefix.clone(),
        ));

        Ok(Controller {
            config: config.controller,
            cache,
            queue,
            informer,
            source,
            reconciler,
            shutdown_signal: self.shutdown_signal,
        })
    }
}
