//! alpha-sync entry point.
//!
//! Boots the offline cache and sync proxy behind an HTTP listener. The
//! desktop shell points its web view at this address and drives lifecycle
//! and push events through the `/__sync` routes. Logs go to stderr as JSON.

use std::sync::Arc;

use alpha_sync_core::{AppConfig, LocalDb};
use alpha_sync_proxy::{FetchConfig, HttpNetwork, NotificationDispatcher, SyncProxy};
use anyhow::{Context, Result};
use tokio::signal;
use tracing_subscriber::EnvFilter;

mod bridge;
mod drain;
mod error;
mod routes;

use bridge::ShellBridge;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let origin = config.origin_url()?;

    let db = LocalDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let network = Arc::new(HttpNetwork::new(FetchConfig::from_app_config(&config))?);
    let proxy = Arc::new(SyncProxy::from_config(&config, db, network)?);

    let bridge = Arc::new(ShellBridge::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        config.notification.clone(),
        bridge.clone(),
        bridge.clone(),
    ));

    start_lifecycle(&proxy, &bridge).await;
    let drain = drain::spawn_periodic_drain(proxy.clone(), config.sync_interval());

    let state = AppState { proxy, dispatcher, bridge, origin: Arc::new(origin) };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!("alpha-sync listening on http://{} for {}", config.listen_addr, config.origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drain.abort();
    tracing::info!("alpha-sync stopped");
    Ok(())
}

/// Install then activate immediately. A failed install leaves the proxy
/// forwarding without interception.
async fn start_lifecycle(proxy: &SyncProxy, bridge: &ShellBridge) {
    if let Err(e) = proxy.lifecycle().install().await {
        tracing::error!("install failed, serving without offline support: {e}");
        return;
    }
    if let Err(e) = proxy.lifecycle().activate(bridge).await {
        tracing::error!("activation failed: {e}");
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("received Ctrl+C, shutting down");
}
