//! Prometheus metrics for the change queue and the reconcile loop.
//!
//! Metrics are always recorded; they are only exported once
//! [`start_server`] registers them and serves `/metrics`.


use std::net::SocketAddr;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref WORKQUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("deploybot_workqueue_depth", "Keys waiting to be dispatched"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref WORKQUEUE_ADDS: IntCounterVec = IntCounterVec::new(
        Opts::new("deploybot_workqueue_adds_total", "Keys accepted by the queue"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref WORKQUEUE_RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("deploybot_workqueue_retries_total", "Rate-limited requeues"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deploybot_reconcile_total", "Reconcile attempts by result"),
        &["kind", "result"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "deploybot_reconcile_duration_seconds",
            "Time spent dispatching one key"
        )
        .buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets")),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 5] = [
        Box::new(WORKQUEUE_DEPTH.clone()),
        Box::new(WORKQUEUE_ADDS.clone()),
        Box::new(WORKQUEUE_RETRIES.clone()),
        Box::new(RECONCILE_TOTAL.clone()),
        Box::new(RECONCILE_DURATION.clone()),
    ];
    for c in collectors {
        if let Err(e) = registry.register(c) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `/metrics` on `port` until `shutdown_signal` fires.
pub async fn start_server(
    addr: SocketAddr,
    mut shutdown_signal: watch::Receiver<()>,
) {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!(%addr, "metrics server listening");
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(encode_metrics(&REGISTRY))
}

pub(crate) fn encode_metrics(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
