use std::path::Path;
use std::sync::Arc;

use deploybot::start_server;
use deploybot::BotConfig;
use deploybot::ControllerBuilder;
use deploybot::Deployment;
use deploybot::Error;
use deploybot::KubectlWatchSource;
use deploybot::LogNotifier;
use deploybot::MattermostNotifier;
use deploybot::Notifier;
use deploybot::Pod;
use deploybot::Resource;
use deploybot::ResourceKind;
use deploybot::Result;
use serde::de::DeserializeOwned;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = BotConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.log.log_dir)?;
    info!(?config, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if config.monitoring.enabled {
        tokio::spawn(start_server(config.monitoring.listen_addr, graceful_rx.clone()));
    }

    // One notifier for the lifetime of the process
    let notifier: Arc<dyn Notifier> = if config.mattermost.is_enabled() {
        Arc::new(MattermostNotifier::new(config.mattermost.clone()))
    } else {
        info!("no mattermost url configured, notifications go to the log");
        Arc::new(LogNotifier)
    };

    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let result = match config.controller.resource_kind {
        ResourceKind::Deployment => run_controller::<Deployment>(config, notifier, graceful_rx).await,
        ResourceKind::Pod => run_controller::<Pod>(config, notifier, graceful_rx).await,
    };
    if let Err(e) = &result {
        error!("controller stops: {:?}", e);
    }

    info!("Exiting program.");
    result
}

async fn run_controller<R: Resource + DeserializeOwned>(
    config: BotConfig,
    notifier: Arc<dyn Notifier>,
    shutdown: watch::Receiver<()>,
) -> Result<()> {
    let source = KubectlWatchSource::<R>::new(&config.watch, config.controller.namespace.clone());
    ControllerBuilder::<R>::new(config, shutdown)
        .watch_source(Arc::new(source))
        .notifier(notifier)
        .build()?
        .run()
        .await
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::SignalSenderClosed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = tracing_appender::rolling::never(log_dir, "deploybot.log");

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();

    Ok(guard)
}
