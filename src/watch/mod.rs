//! Watch source capability.
//!
//! A [`WatchSource`] lists and watches a remote collection and drives a
//! [`ResourceEventHandler`] with what it observes. The handler is expected to
//! be cheap and non-blocking; in this crate it is the [`crate::Informer`],
//! which applies every event to the local cache synchronously.

mod channel_source;
mod kubectl_source;
pub use channel_source::*;
pub use kubectl_source::*;


use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Resource;
use crate::Result;

/// Callbacks a watch source invokes, in arrival order per object.
pub trait ResourceEventHandler<R>: Send + Sync {
    fn on_add(
        &self,
        obj: R,
    );

    fn on_update(
        &self,
        obj: R,
    );

    fn on_delete(
        &self,
        obj: R,
    );

    /// A full listing of the collection; objects missing from it no longer exist.
    fn on_replace(
        &self,
        objs: Vec<R>,
    );
}

/// One observation from a watch transport.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<R> {
    /// Full listing (initial or after a relist)
    Listed(Vec<R>),
    Added(R),
    Modified(R),
    Deleted(R),
}

impl<R> WatchEvent<R> {
    pub fn dispatch(
        self,
        handler: &dyn ResourceEventHandler<R>,
    ) {
        match self {
            WatchEvent::Listed(objs) => handler.on_replace(objs),
            WatchEvent::Added(obj) => handler.on_add(obj),
            WatchEvent::Modified(obj) => handler.on_update(obj),
            WatchEvent::Deleted(obj) => handler.on_delete(obj),
        }
    }
}

/// Lists and watches one resource collection.
#[async_trait]
pub trait WatchSource<R: Resource>: Send + Sync + 'static {
    /// Runs until `shutdown` is cancelled or the transport fails for good.
    ///
    /// Must deliver one `on_replace` with the initial listing before any other
    /// callback. Returning `Err` before that listing is a fatal startup error.
    async fn run(
        &self,
        handler: Arc<dyn ResourceEventHandler<R>>,
        shutdown: CancellationToken,
    ) -> Result<()>;
}
