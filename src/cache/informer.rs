use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::LocalCache;
use crate::Key;
use crate::KeyFunc;
use crate::RateLimitingQueue;
use crate::Resource;
use crate::ResourceEventHandler;

/// Applies watch callbacks to the local cache and enqueues changed keys.
///
/// Cache writes happen synchronously in the callback, so the cache always
/// holds the latest observed state regardless of queue backlog.
pub struct Informer<R: Resource> {
    cache: Arc<LocalCache<R>>,
    queue: Arc<RateLimitingQueue<Key>>,
    key_func: KeyFunc<R>,
}

impl<R: Resource> Informer<R> {
    pub fn new(
        cache: Arc<LocalCache<R>>,
        queue: Arc<RateLimitingQueue<Key>>,
        key_func: KeyFunc<R>,
    ) -> Self {
        Self {
            cache,
            queue,
            key_func,
        }
    }

    pub fn cache(&self) -> &Arc<LocalCache<R>> {
        &self.cache
    }

    pub fn has_synced(&self) -> bool {
        self.cache.has_synced()
    }

    fn key_of(
        &self,
        obj: &R,
    ) -> Option<Key> {
        match (self.key_func)(obj) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kind = R::KIND, error = %e, ?obj, "dropping event without a usable key");
                None
            }
        }
    }
}

impl<R: Resource> ResourceEventHandler<R> for Informer<R> {
    fn on_add(
        &self,
        obj: R,
    ) {
        if let Some(key) = self.key_of(&obj) {
            debug!(kind = R::KIND, %key, "added");
            self.cache.put(key.clone(), obj);
            self.queue.add(key);
        }
    }

    fn on_update(
        &self,
        obj: R,
    ) {
        if let Some(key) = self.key_of(&obj) {
            debug!(kind = R::KIND, %key, "updated");
            self.cache.put(key, obj);
        }
    }

    fn on_delete(
        &self,
        obj: R,
    ) {
        if let Some(key) = self.key_of(&obj) {
            debug!(kind = R::KIND, %key, "deleted");
            self.cache.delete(&key);
            self.queue.add(key);
        }
    }

    fn on_replace(
        &self,
        objs: Vec<R>,
    ) {
        let mut listed = HashSet::with_capacity(objs.len());
        for obj in objs {
            let Some(key) = self.key_of(&obj) else {
                continue;
            };
            listed.insert(key.clone());
            if self.cache.put(key.clone(), obj) {
                self.queue.add(key);
            }
        }

        // Cached objects missing from a full listing were deleted while unobserved.
        for key in self.cache.list_keys() {
            if !listed.contains(&key) {
                debug!(kind = R::KIND, %key, "gone after relist");
                self.cache.delete(&key);
                self.queue.add(key);
            }
        }

        self.cache.mark_synced();
    }
}
