use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio::time::Instant;

use super::*;
use crate::BotConfig;
use crate::ChannelWatchSource;
use crate::Deployment;
use crate::Error;
use crate::KubectlWatchSource;
use crate::MockNotifier;
use crate::Notifier;
use crate::NotifyError;
use crate::ObjectMeta;
use crate::SyncError;
use crate::WatchEvent;

fn config() -> BotConfig {
    let mut config = BotConfig::default();
    config.controller.workers = 2;
    config.controller.cache_sync_timeout_ms = 0;
    config.controller.notify_timeout_ms = 1000;
    config
}

fn deployment(name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta::namespaced("ns", name),
        ..Default::default()
    }
}

fn recording_notifier() -> (MockNotifier, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().returning(move |msg| {
        let _ = tx.send(msg.to_string());
        Ok(())
    });
    (notifier, rx)
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification within deadline")
        .expect("notifier alive")
}

#[tokio::test]
async fn add_and_delete_events_are_notified() {
    let (events, source) = ChannelWatchSource::<Deployment>::new();
    let (notifier, mut messages) = recording_notifier();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let controller = ControllerBuilder::new(config(), shutdown_rx)
        .watch_source(Arc::new(source))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();
    let running = tokio::spawn(controller.run());

    events.send(WatchEvent::Listed(vec![])).unwrap();
    events.send(WatchEvent::Added(deployment("foo"))).unwrap();
    assert_eq!(next_message(&mut messages).await, "DeployBot - Created a new Deployment - foo");

    events.send(WatchEvent::Deleted(deployment("foo"))).unwrap();
    assert_eq!(next_message(&mut messages).await, "DeployBot - Deleted Deployment - ns/foo");

    shutdown_tx.send(()).unwrap();
    assert!(running.await.unwrap().is_ok());
}

#[tokio::test]
async fn nothing_is_dispatched_before_initial_listing() {
    let (events, source) = ChannelWatchSource::<Deployment>::new();
    let (notifier, mut messages) = recording_notifier();
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let controller = ControllerBuilder::new(config(), shutdown_rx)
        .watch_source(Arc::new(source))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();
    let cache = controller.cache().clone();
    let running = tokio::spawn(controller.run());

    events.send(WatchEvent::Added(deployment("early"))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(messages.try_recv().is_err());
    assert!(!cache.has_synced());

    events.send(WatchEvent::Listed(vec![deployment("early")])).unwrap();
    assert_eq!(next_message(&mut messages).await, "DeployBot - Created a new Deployment - early");
    assert!(cache.has_synced());

    shutdown_tx.send(()).unwrap();
    assert!(running.await.unwrap().is_ok());
    assert!(messages.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn sync_timeout_is_fatal() {
    let (_events, source) = ChannelWatchSource::<Deployment>::new();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().never();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());

    let mut config = config();
    config.controller.cache_sync_timeout_ms = 500;
    let controller = ControllerBuilder::new(config, shutdown_rx)
        .watch_source(Arc::new(source))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();

    let result = controller.run().await;
    assert!(matches!(result, Err(Error::Sync(SyncError::Timeout(_)))));
}

#[tokio::test]
async fn source_failure_before_sync_is_fatal() {
    let (events, source) = ChannelWatchSource::<Deployment>::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let controller = ControllerBuilder::new(config(), shutdown_rx)
        .watch_source(Arc::new(source))
        .build()
        .unwrap();

    drop(events);
    let result = controller.run().await;
    assert!(matches!(result, Err(Error::Sync(SyncError::SourceFailed(_)))));
}

#[tokio::test]
async fn shutdown_before_sync_returns_ok() {
    let (_events, source) = ChannelWatchSource::<Deployment>::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let controller = ControllerBuilder::new(config(), shutdown_rx)
        .watch_source(Arc::new(source))
        .build()
        .unwrap();
    let queue = controller.queue().clone();
    let running = tokio::spawn(controller.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(queue.is_shutting_down());
}

#[tokio::test]
async fn source_ending_after_sync_keeps_workers_running() {
    let (events, source) = ChannelWatchSource::<Deployment>::new();
    let (notifier, mut messages) = recording_notifier();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let controller = ControllerBuilder::new(config(), shutdown_rx)
        .watch_source(Arc::new(source))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();
    let queue = controller.queue().clone();
    let running = tokio::spawn(controller.run());

    events.send(WatchEvent::Listed(vec![deployment("a")])).unwrap();
    drop(events);
    assert_eq!(next_message(&mut messages).await, "DeployBot - Created a new Deployment - a");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!running.is_finished());
    assert!(!queue.is_shutting_down());

    shutdown_tx.send(()).unwrap();
    assert!(running.await.unwrap().is_ok());
}

#[tokio::test]
async fn build_requires_a_watch_source() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let result = ControllerBuilder::<Deployment>::new(config(), shutdown_rx).build();
    assert!(matches!(result, Err(Error::Fatal(_))));
}

#[tokio::test]
async fn build_rejects_invalid_config() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(());
    let (_events, source) = ChannelWatchSource::<Deployment>::new();
    let mut config = config();
    config.controller.max_retries = 0;

    let result = ControllerBuilder::new(config, shutdown_rx)
        .watch_source(Arc::new(source))
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn hung_initial_listing_does_not_block_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let kubectl = dir.path().join("kubectl");
    std::fs::write(&kubectl, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&kubectl, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = config();
    config.watch.kubectl_path = kubectl.to_string_lossy().into_owned();
    let source = KubectlWatchSource::<Deployment>::new(&config.watch, None);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let controller = ControllerBuilder::new(config, shutdown_rx)
        .watch_source(Arc::new(source))
        .build()
        .unwrap();
    let running = tokio::spawn(controller.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    let result = timeout(Duration::from_secs(3), running)
        .await
        .expect("controller should stop while the listing hangs")
        .unwrap();
    assert!(result.is_ok());
}

/// Panics on its first call, then forwards messages with the time they arrived.
struct CrashOnceNotifier {
    crashed: AtomicBool,
    tx: mpsc::UnboundedSender<(String, Instant)>,
}

#[async_trait]
impl Notifier for CrashOnceNotifier {
    async fn notify(
        &self,
        message: &str,
    ) -> std::result::Result<(), NotifyError> {
        if !self.crashed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(("crash".to_string(), Instant::now()));
            panic!("notifier blew up");
        }
        let _ = self.tx.send((message.to_string(), Instant::now()));
        Ok(())
    }
}

async fn next_timed(rx: &mut mpsc::UnboundedReceiver<(String, Instant)>) -> (String, Instant) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message within deadline")
        .expect("notifier alive")
}

#[tokio::test]
async fn crashed_worker_is_restarted_and_releases_its_key() {
    let (events, source) = ChannelWatchSource::<Deployment>::new();
    let (tx, mut messages) = mpsc::unbounded_channel();
    let notifier = CrashOnceNotifier {
        crashed: AtomicBool::new(false),
        tx,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut config = config();
    config.controller.workers = 1;
    config.controller.worker_restart_interval_ms = 200;
    let controller = ControllerBuilder::new(config, shutdown_rx)
        .watch_source(Arc::new(source))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();
    let running = tokio::spawn(controller.run());

    events.send(WatchEvent::Listed(vec![deployment("a")])).unwrap();
    let (first, crashed_at) = next_timed(&mut messages).await;
    assert_eq!(first, "crash");

    // The crashed key must not stay marked in flight, or this re-add would never dispatch.
    events.send(WatchEvent::Deleted(deployment("a"))).unwrap();
    events.send(WatchEvent::Added(deployment("b"))).unwrap();

    let (second, restarted_at) = next_timed(&mut messages).await;
    assert_eq!(second, "DeployBot - Deleted Deployment - ns/a");
    assert!(restarted_at - crashed_at >= Duration::from_millis(200));

    let (third, _) = next_timed(&mut messages).await;
    assert_eq!(third, "DeployBot - Created a new Deployment - b");

    shutdown_tx.send(()).unwrap();
    assert!(running.await.unwrap().is_ok());
}
