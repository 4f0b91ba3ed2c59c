use std::time::Duration;

use tokio::time::timeout;
use tokio::time::Instant;

use super::*;

fn exponential_queue(name: &str) -> RateLimitingQueue<String> {
    RateLimitingQueue::new(
        name,
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(10),
            Duration::from_secs(10),
        )),
    )
}

#[tokio::test(start_paused = true)]
async fn add_after_delays_eligibility() {
    let q = exponential_queue("add-after");
    let start = Instant::now();
    q.add_after("k".to_string(), Duration::from_millis(250));
    assert!(q.is_empty());
    assert_eq!(q.waiting(), 1);

    assert_eq!(q.get().await.as_deref(), Some("k"));
    assert!(start.elapsed() >= Duration::from_millis(250));
    assert_eq!(q.waiting(), 0);
}

#[tokio::test(start_paused = true)]
async fn add_after_keeps_the_earliest_deadline() {
    let q = exponential_queue("earliest");
    let start = Instant::now();
    q.add_after("k".to_string(), Duration::from_secs(5));
    q.add_after("k".to_string(), Duration::from_millis(100));
    q.add_after("k".to_string(), Duration::from_secs(1));
    assert_eq!(q.waiting(), 1);

    assert_eq!(q.get().await.as_deref(), Some("k"));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_secs(1));
    q.done(&"k".to_string());

    // The stale later deadlines do not produce a second dispatch
    let again = timeout(Duration::from_secs(6), q.get()).await;
    assert!(again.is_err());
}

#[tokio::test(start_paused = true)]
async fn zero_delay_adds_immediately() {
    let q = exponential_queue("zero");
    q.add_after("k".to_string(), Duration::ZERO);
    assert_eq!(q.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn consecutive_rate_limited_requeues_wait_longer() {
    let q = exponential_queue("growth");
    let key = "ns/foo".to_string();

    let mut last = Duration::ZERO;
    for attempt in 1..=4 {
        let start = Instant::now();
        q.add_rate_limited(key.clone());
        let got = q.get().await.unwrap();
        let waited = start.elapsed();
        q.done(&got);

        assert!(waited >= last, "attempt {attempt}: {waited:?} < {last:?}");
        last = waited;
        assert_eq!(q.num_requeues(&key), attempt);
    }
    assert!(last >= Duration::from_millis(80));

    q.forget(&key);
    assert_eq!(q.num_requeues(&key), 0);
}

#[tokio::test(start_paused = true)]
async fn shut_down_discards_waiting_keys() {
    let q = exponential_queue("shutdown");
    q.add_after("k".to_string(), Duration::from_millis(50));
    q.shut_down();

    assert!(q.get().await.is_none());
    q.add_after("j".to_string(), Duration::from_millis(10));
    q.add("j".to_string());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(q.is_empty());
    assert!(q.is_shutting_down());
}

#[tokio::test(start_paused = true)]
async fn delayed_key_in_flight_is_marked_dirty() {
    let q = exponential_queue("dirty-delayed");
    q.add("k".to_string());
    let key = q.get().await.unwrap();

    q.add_after("k".to_string(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(50)).await;
    // Backoff elapsed while processing: held until done
    assert!(q.is_empty());

    q.done(&key);
    assert_eq!(q.get().await.as_deref(), Some("k"));
}
