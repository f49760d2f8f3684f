//! Web server module for receiving alert webhooks.
//!
//! This module provides a thin, fast web server that:
//! - Receives Grafana alerts and generic messages
//! - Verifies the shared bearer secret
//! - Immediately hands messages to the dispatch broker
//! - Returns 200 OK without waiting on WhatsApp
//!
//! Delivery happens on the broker's background workers.

pub mod auth;
pub mod cors;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::{bearer_token, is_authorized};
pub use handlers::{
    group_alert, health, send_message, user_alert, AppState, CommonLabels, GrafanaAlert,
    SendMessageRequest,
};

/// Largest request body accepted (1 MiB).
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthy", get(health))
        .route("/whatsapp/send/grafana-alert/user/:user_id", post(user_alert))
        .route("/whatsapp/send/grafana-alert/group/:group_id", post(group_alert))
        .route("/whatsapp/send/message", post(send_message))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
