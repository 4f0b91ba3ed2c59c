use std::time::Duration;

use super::*;

#[test]
fn default_controller_config_is_valid() {
    let config = ControllerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.cache_sync_timeout(), Some(Duration::from_secs(60)));
    assert_eq!(config.notify_timeout(), Some(Duration::from_secs(10)));
    assert_eq!(config.worker_restart_interval(), Duration::from_secs(1));
}

#[test]
fn zero_workers_or_retries_are_rejected() {
    let config = ControllerConfig {
        workers: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = ControllerConfig {
        max_retries: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn zero_timeouts_disable_the_limit() {
    let config = ControllerConfig {
        cache_sync_timeout_ms: 0,
        notify_timeout_ms: 0,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.cache_sync_timeout(), None);
    assert_eq!(config.notify_timeout(), None);
}

#[test]
fn namespace_must_be_a_single_segment() {
    let config = ControllerConfig {
        namespace: Some("a/b".to_string()),
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = ControllerConfig {
        namespace: Some(String::new()),
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = ControllerConfig {
        namespace: Some("prod".to_string()),
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}
