use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::*;

#[tokio::test]
async fn add_is_deduplicated_while_queued() {
    let q = WorkQueue::new("dedup");
    q.add("ns/foo".to_string());
    q.add("ns/foo".to_string());
    assert_eq!(q.len(), 1);

    assert_eq!(q.get().await.as_deref(), Some("ns/foo"));
    assert!(q.is_empty());
}

#[tokio::test]
async fn keys_are_dispatched_in_fifo_order() {
    let q = WorkQueue::new("fifo");
    for k in ["a", "b", "c"] {
        q.add(k.to_string());
    }
    assert_eq!(q.get().await.as_deref(), Some("a"));
    assert_eq!(q.get().await.as_deref(), Some("b"));
    assert_eq!(q.get().await.as_deref(), Some("c"));
}

#[tokio::test]
async fn in_flight_key_is_not_dispatched_twice() {
    let q = Arc::new(WorkQueue::new("exclusive"));
    q.add("k".to_string());
    let first = q.get().await;
    assert_eq!(first.as_deref(), Some("k"));

    // Re-added while processing: held back until done
    q.add("k".to_string());
    assert!(q.is_empty());
    let second = timeout(Duration::from_millis(50), q.get()).await;
    assert!(second.is_err(), "key must not be handed out while in flight");

    q.done(&"k".to_string());
    assert_eq!(q.get().await.as_deref(), Some("k"));
}

#[tokio::test]
async fn dirty_key_is_requeued_exactly_once() {
    let q = WorkQueue::new("dirty");
    q.add("k".to_string());
    let key = q.get().await.unwrap();

    q.add("k".to_string());
    q.add("k".to_string());
    q.done(&key);
    assert_eq!(q.len(), 1);

    let key = q.get().await.unwrap();
    q.done(&key);
    assert!(q.is_empty());
}

#[tokio::test]
async fn done_without_new_changes_does_not_requeue() {
    let q = WorkQueue::new("clean");
    q.add("k".to_string());
    let key = q.get().await.unwrap();
    q.done(&key);
    assert!(q.is_empty());
}

#[tokio::test]
async fn blocked_get_is_woken_by_add() {
    let q = Arc::new(WorkQueue::new("wake"));
    let waiter = {
        let q = q.clone();
        tokio::spawn(async move { q.get().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    q.add("k".to_string());

    let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(got.as_deref(), Some("k"));
}

#[tokio::test]
async fn shut_down_unblocks_waiting_workers() {
    let q = Arc::new(WorkQueue::<String>::new("shutdown"));
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    q.shut_down();

    for w in waiters {
        let got = timeout(Duration::from_secs(1), w).await.unwrap().unwrap();
        assert!(got.is_none());
    }
    assert!(q.get().await.is_none());
}

#[tokio::test]
async fn shut_down_drops_undispatched_keys_and_ignores_adds() {
    let q = WorkQueue::new("drain");
    q.add("a".to_string());
    q.add("b".to_string());
    q.shut_down();

    assert!(q.is_empty());
    assert!(q.get().await.is_none());

    q.add("c".to_string());
    assert!(q.is_empty());
}

#[tokio::test]
async fn done_after_shutdown_does_not_requeue() {
    let q = WorkQueue::new("late-done");
    q.add("k".to_string());
    let key = q.get().await.unwrap();
    q.add("k".to_string());
    q.shut_down();
    q.done(&key);
    assert!(q.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_never_share_a_key() {
    use std::collections::HashSet;

    let q = Arc::new(WorkQueue::<String>::new("concurrent"));
    let in_flight = Arc::new(parking_lot::Mutex::new(HashSet::new()));
    let processed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let q = q.clone();
            let in_flight = in_flight.clone();
            let processed = processed.clone();
            tokio::spawn(async move {
                while let Some(key) = q.get().await {
                    assert!(in_flight.lock().insert(key.clone()), "{key} dispatched twice");
                    tokio::task::yield_now().await;
                    in_flight.lock().remove(&key);
                    processed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    q.done(&key);
                }
            })
        })
        .collect();

    for round in 0..50 {
        for k in 0..5 {
            q.add(format!("ns/key-{}", (round + k) % 5));
        }
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    q.shut_down();
    for w in workers {
        w.await.unwrap();
    }
    assert!(processed.load(std::sync::atomic::Ordering::SeqCst) >= 5);
}
