//! Runs the HTTP server alongside the dispatch broker until shutdown.

use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;

/// Serve `app` until `shutdown` fires or the server fails.
///
/// Either way, the HTTP side is stopped (bounded by `http_timeout`) while the
/// dispatcher drains, and any server error is returned.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    dispatcher: &Dispatcher,
    shutdown: CancellationToken,
    http_timeout: Duration,
) -> io::Result<()> {
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let server = async move { server.await };
    tokio::pin!(server);

    let exited_early = tokio::select! {
        result = &mut server => Some(result),
        _ = shutdown.cancelled() => None,
    };

    if exited_early.is_some() {
        error!("web_server_exited_early");
    }
    info!("service_shutting_down");
    shutdown.cancel();

    // Stop the HTTP side and drain the broker at the same time
    let stop_server = async {
        match exited_early {
            Some(result) => result,
            None => match tokio::time::timeout(http_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_ms = http_timeout.as_millis() as u64,
                        "web_server_shutdown_timeout"
                    );
                    Ok(())
                }
            },
        }
    };

    let (result, ()) = tokio::join!(stop_server, dispatcher.shutdown());

    if result.is_ok() {
        info!("web_server_stopped");
    }
    result
}
