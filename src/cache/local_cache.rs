use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::Key;
use crate::SyncError;

/// Thread-safe mirror of the watched collection, keyed by [`Key`].
///
/// Written only by the informer (watch callbacks), read by reconcile workers.
/// Snapshots are replaced wholesale on every put.
pub struct LocalCache<R> {
    items: DashMap<Key, R>,
    synced_tx: watch::Sender<bool>,
}

impl<R> Default for LocalCache<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> LocalCache<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (synced_tx, _) = watch::channel(false);
        Self {
            items: DashMap::new(),
            synced_tx,
        }
    }

    /// Returns true when `key` was not cached before.
    pub fn put(
        &self,
        key: Key,
        snapshot: R,
    ) -> bool {
        self.items.insert(key, snapshot).is_none()
    }

    /// Removes `key`, returning the last known snapshot.
    pub fn delete(
        &self,
        key: &Key,
    ) -> Option<R> {
        self.items.remove(key).map(|(_, v)| v)
    }

    pub fn get(
        &self,
        key: &Key,
    ) -> Option<R> {
        self.items.get(key).map(|v| v.value().clone())
    }

    pub fn contains(
        &self,
        key: &Key,
    ) -> bool {
        self.items.contains_key(key)
    }

    pub fn list_keys(&self) -> Vec<Key> {
        self.items.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True once the initial full listing has been applied.
    pub fn has_synced(&self) -> bool {
        *self.synced_tx.borrow()
    }

    pub(crate) fn mark_synced(&self) {
        if !self.has_synced() {
            debug!(items = self.len(), "cache synced");
            self.synced_tx.send_replace(true);
        }
    }

    /// Waits until [`LocalCache::has_synced`] turns true, up to `timeout`
    /// (`None` waits forever).
    pub async fn wait_for_sync(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), SyncError> {
        let mut rx = self.synced_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while borrowed.
        let wait = async move {
            rx.wait_for(|synced| *synced)
                .await
                .map(|_| ())
                .map_err(|_| SyncError::SourceStopped)
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, wait)
                .await
                .map_err(|_| SyncError::Timeout(t))?,
            None => wait.await,
        }
    }
}
