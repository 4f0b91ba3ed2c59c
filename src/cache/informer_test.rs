use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::meta_namespace_key_func;
use crate::Deployment;
use crate::ItemExponentialFailureRateLimiter;
use crate::Key;
use crate::ObjectMeta;
use crate::RateLimitingQueue;
use crate::ResourceEventHandler;

fn deployment(name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta::namespaced("ns", name),
        ..Default::default()
    }
}

fn setup() -> (Informer<Deployment>, Arc<RateLimitingQueue<Key>>) {
    let queue = Arc::new(RateLimitingQueue::new(
        "informer-test",
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1),
        )),
    ));
    let informer = Informer::new(
        Arc::new(LocalCache::new()),
        queue.clone(),
        meta_namespace_key_func::<Deployment>,
    );
    (informer, queue)
}

async fn drain(queue: &RateLimitingQueue<Key>) -> Vec<String> {
    let mut keys = Vec::new();
    while !queue.is_empty() {
        if let Some(k) = queue.get().await {
            queue.done(&k);
            keys.push(k.to_string());
        }
    }
    keys
}

#[tokio::test]
async fn add_updates_cache_and_enqueues() {
    let (informer, queue) = setup();
    informer.on_add(deployment("foo"));

    let key = Key::new(Some("ns"), "foo");
    assert!(informer.cache().contains(&key));
    assert_eq!(drain(&queue).await, vec!["ns/foo"]);
}

#[tokio::test]
async fn update_refreshes_cache_without_enqueueing() {
    let (informer, queue) = setup();
    informer.on_add(deployment("foo"));
    drain(&queue).await;

    let mut updated = deployment("foo");
    updated.spec.replicas = Some(5);
    informer.on_update(updated);

    let key = Key::new(Some("ns"), "foo");
    assert_eq!(informer.cache().get(&key).unwrap().spec.replicas, Some(5));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn delete_removes_from_cache_and_enqueues() {
    let (informer, queue) = setup();
    informer.on_add(deployment("foo"));
    drain(&queue).await;

    informer.on_delete(deployment("foo"));
    assert!(informer.cache().is_empty());
    assert_eq!(drain(&queue).await, vec!["ns/foo"]);
}

#[tokio::test]
async fn delete_of_unknown_object_still_enqueues() {
    let (informer, queue) = setup();
    informer.on_delete(deployment("ghost"));
    assert_eq!(drain(&queue).await, vec!["ns/ghost"]);
}

#[tokio::test]
async fn objects_without_a_name_are_skipped() {
    let (informer, queue) = setup();
    informer.on_add(Deployment::default());
    assert!(informer.cache().is_empty());
    assert!(queue.is_empty());
}

#[tokio::test]
async fn initial_replace_enqueues_everything_and_marks_synced() {
    let (informer, queue) = setup();
    assert!(!informer.has_synced());

    informer.on_replace(vec![deployment("a"), deployment("b")]);

    assert!(informer.has_synced());
    assert_eq!(informer.cache().len(), 2);
    assert_eq!(drain(&queue).await, vec!["ns/a", "ns/b"]);
}

#[tokio::test]
async fn relist_deletes_vanished_objects_and_adds_new_ones() {
    let (informer, queue) = setup();
    informer.on_replace(vec![deployment("a"), deployment("b")]);
    drain(&queue).await;

    informer.on_replace(vec![deployment("b"), deployment("c")]);

    assert!(!informer.cache().contains(&Key::new(Some("ns"), "a")));
    assert!(informer.cache().contains(&Key::new(Some("ns"), "c")));
    let mut keys = drain(&queue).await;
    keys.sort();
    assert_eq!(keys, vec!["ns/a", "ns/c"]);
}
