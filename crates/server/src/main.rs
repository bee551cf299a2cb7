//! copyr.ai API server entry point.
//!
//! Logs are JSON on stdout; set `RUST_LOG` to adjust verbosity.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use copyr_core::{AppConfig, CacheDb};
use copyr_server::scheduler::Scheduler;
use copyr_server::{AppState, build_router};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(environment = %config.environment, db = %config.db_path.display(), "starting copyr.ai API");

    let db = CacheDb::open(&config.db_path).await.context("failed to open cache database")?;
    let bind_addr = config.bind_addr.clone();
    let scheduler_enabled = config.scheduler_enabled;
    let state = AppState::new(config, db).context("failed to build source clients")?;

    let cancel = CancellationToken::new();
    let scheduler = scheduler_enabled.then(|| tokio::spawn(Scheduler::new(state.clone(), cancel.clone()).run()));

    let listener =
        tokio::net::TcpListener::bind(&bind_addr).await.with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, build_router(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("server error")?;

    cancel.cancel();
    if let Some(handle) = scheduler
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "scheduler task failed");
    }
    Ok(())
}
