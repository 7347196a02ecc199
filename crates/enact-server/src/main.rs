use std::sync::Arc;

use anyhow::Context;
use enact_core::app::{CommitFailure, DispatcherBuilder, WorkerPool};
use enact_core::impls::{FileStatusStore, HttpDeliveryClient, InMemoryStatusStore};
use enact_core::ports::{StatusStore, SystemClock, UlidGenerator};
use enact_server::app::{AppState, build_app};
use enact_server::config::{Config, REMOTE_TOKEN};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    enact_server::observability::init();
    info!(version = env!("CARGO_PKG_VERSION"), "enact starting");

    let mut config = Config::from_env().context("load configuration")?;
    if config.remote_token.is_none() {
        warn!("{REMOTE_TOKEN} is not set, worker requests will be unauthenticated");
    }

    let store: Arc<dyn StatusStore> = match &config.state_path {
        Some(path) => Arc::new(
            FileStatusStore::open(path)
                .await
                .with_context(|| format!("open status store {}", path.display()))?,
        ),
        None => {
            warn!("no status file configured, terminal statuses are kept in memory only");
            Arc::new(InMemoryStatusStore::new())
        }
    };

    let client = HttpDeliveryClient::new(
        &config.remote,
        config.remote_token.take(),
        config.remote_timeout,
    )
    .context("build delivery client")?;
    info!(endpoint = %client.endpoint(), timeout_s = config.remote_timeout.as_secs(), "worker endpoint");

    let (failures_tx, failures_rx) = mpsc::channel(64);
    let reporter = tokio::spawn(report_commit_failures(failures_rx));

    let dispatcher = DispatcherBuilder::new()
        .delivery_client(Arc::new(client))
        .status_store(Arc::clone(&store))
        .retry_policy(config.retry_policy.clone())
        .clock(Arc::new(SystemClock))
        .commit_failures(failures_tx)
        .build()
        .context("build dispatcher")?;
    let pool = WorkerPool::spawn(config.pool.clone(), Arc::new(dispatcher))
        .context("start worker pool")?;

    let app = build_app(AppState {
        submitter: pool.submitter(),
        store,
        ids: Arc::new(UlidGenerator::new(SystemClock)),
    });

    let listener = tokio::net::TcpListener::bind(config.addr.as_str())
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Always drain the pool, even when the server stopped with an error.
    info!("draining worker pool");
    pool.shutdown_and_join().await;
    let _ = reporter.await;

    served.context("serve")?;
    info!("enact stopped");
    Ok(())
}

/// Logs each unpersisted outcome as one JSON line so it can be replayed.
async fn report_commit_failures(mut rx: mpsc::Receiver<CommitFailure>) {
    while let Some(failure) = rx.recv().await {
        match serde_json::to_string(&failure.record) {
            Ok(record) => error!(%record, error = %failure.error, "unpersisted terminal status"),
            Err(e) => error!(task_id = %failure.record.task_id, error = %e, "unpersisted terminal status"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
