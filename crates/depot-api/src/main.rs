//! # depot: Binary Entry Point
//!
//! Reads configuration from the environment, connects the object store, and
//! serves the API and metrics listeners until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use depot_api::config::{AppConfig, LogFormat};
use depot_api::state::AppState;
use depot_integrity::ScanScheduler;
use depot_store::S3Backend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing before configuration so that config
    // warnings use the selected format.
    init_tracing(LogFormat::from_env());

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let backend = S3Backend::connect(&config.store)
        .await
        .context("failed to connect object store")?;
    let state = AppState::new(Arc::new(backend), &config).context("failed to build state")?;
    let token = CancellationToken::new();

    // Metrics listener.
    let metrics_listener = tokio::net::TcpListener::bind(&config.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", config.metrics_addr))?;
    tracing::info!(addr = %config.metrics_addr, "metrics listening");
    let metrics_app = depot_api::metrics_router(state.metrics.clone());
    let metrics_token = token.clone();
    tokio::spawn(async move {
        let served = axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(metrics_token.cancelled_owned())
            .await;
        if let Err(err) = served {
            tracing::error!(error = %err, "metrics listener failed");
        }
    });

    // Checksum scanner.
    if let Some(interval) = config.scan_interval {
        let scanner = Arc::new(state.checksum_integrity(&config.scan_prefix));
        let scheduler =
            ScanScheduler::new(scanner, interval).with_observer(state.metrics.scan_observer());
        tracing::info!(
            interval = %humantime::format_duration(interval),
            prefix = %config.scan_prefix,
            "checksum scanner enabled"
        );
        tokio::spawn(scheduler.run(token.clone()));
    }

    let app = depot_api::app(state);
    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    tracing::info!(addr = %config.server_addr, "depot listening");

    let server_token = token.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_token.cancelled_owned())
            .await
    });

    tokio::select! {
        served = &mut server => {
            token.cancel();
            served.context("server task panicked")?.context("server failed")?;
            return Ok(());
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    token.cancel();
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
        Ok(served) => {
            served.context("server task panicked")?.context("server failed")?;
            tracing::info!("shutdown complete");
        }
        Err(_) => {
            tracing::warn!(
                timeout = ?SHUTDOWN_TIMEOUT,
                "in-flight requests did not finish before the shutdown timeout"
            );
            server.abort();
        }
    }
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
}
