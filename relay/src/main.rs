//! WhatsApp webhook relay server.
//!
//! This binary:
//! 1. Connects to the WhatsApp bridge
//! 2. Starts the dispatch broker and its user and group workers
//! 3. Serves the webhook endpoints until SIGINT/SIGTERM
//! 4. Drains the broker within the grace period and releases the bridge

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay::config::debug_from_env;
use relay::{router, service, AppState, BridgeConnector, Config, DispatchSettings, Dispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let default_level = if debug_from_env() { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("service_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        webhook_secret_configured = config.webhook_secret.is_some(),
        queue_capacity = config.queue_capacity,
        shutdown_grace_ms = config.shutdown_grace_ms,
        bridge_url = %config.bridge_url,
        debug = config.debug,
        "config_loaded"
    );
    if config.webhook_secret.is_none() {
        warn!("webhook_secret_missing_all_sends_will_be_rejected");
    }

    // Connect to WhatsApp and start the workers
    let connector =
        BridgeConnector::new(config.bridge_url.clone(), config.bridge_request_timeout())
            .context("Failed to build WhatsApp bridge client")?;
    let dispatcher = Dispatcher::start(&connector, DispatchSettings::from(&config))
        .await
        .context("Failed to connect to WhatsApp bridge")?;

    let app = router(AppState::new(config.clone(), dispatcher.broker()));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    service::serve(
        listener,
        app,
        &dispatcher,
        shutdown,
        config.http_shutdown_timeout(),
    )
    .await
    .context("Server error")?;

    info!("shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
