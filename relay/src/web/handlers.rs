//! Webhook endpoint handlers.
//!
//! These handlers are designed to be extremely fast - they only:
//! 1. Verify the bearer token
//! 2. Validate the payload
//! 3. Hand the message to the dispatch broker without waiting
//!
//! Delivery to WhatsApp happens on the broker's workers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::{resolve, Broker, Destination, DestinationKind, OutboundMessage, Rejected};
use crate::web::auth::is_authorized;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub broker: Broker,
}

impl AppState {
    pub fn new(config: Config, broker: Broker) -> Self {
        Self {
            config: Arc::new(config),
            broker,
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        is_authorized(self.config.webhook_secret.as_deref(), headers)
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Grafana Alerts
// =============================================================================

/// Labels shared by every alert in a Grafana notification.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonLabels {
    pub alertname: String,
    pub grafana_folder: String,
    pub phone: String,
    pub ref_id: String,
}

/// Grafana webhook contact point payload.
///
/// Only `message` is used; the rest is accepted so Grafana's full payload
/// decodes without complaint.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrafanaAlert {
    pub receiver: String,
    pub status: String,
    #[serde(rename = "commonLabels")]
    pub common_labels: CommonLabels,
    pub state: String,
    pub title: String,
    pub message: String,
}

/// Grafana alert to a single user, addressed by phone number.
pub async fn user_alert(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    grafana_alert(state, DestinationKind::User, user_id, headers, body)
}

/// Grafana alert to a group, addressed by group id.
pub async fn group_alert(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    grafana_alert(state, DestinationKind::Group, group_id, headers, body)
}

fn grafana_alert(
    state: AppState,
    kind: DestinationKind,
    raw_identifier: String,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.authorized(&headers) {
        warn!(kind = %kind, "alert_unauthorized");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let destination = match resolve(kind, &raw_identifier) {
        Ok(destination) => destination,
        Err(_) => {
            let message = match kind {
                DestinationKind::User => "phone number is required",
                DestinationKind::Group => "group_id is required",
            };
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };

    let alert: GrafanaAlert = match serde_json::from_slice(&body) {
        Ok(alert) => alert,
        Err(e) => {
            warn!(kind = %kind, error = %e, "alert_decode_failed");
            return (StatusCode::BAD_REQUEST, "error decoding alert").into_response();
        }
    };

    if alert.message.is_empty() {
        return (StatusCode::BAD_REQUEST, "message is required").into_response();
    }

    info!(
        kind = %kind,
        destination = %destination,
        status = %alert.status,
        alertname = %alert.common_labels.alertname,
        message_length = alert.message.len(),
        "alert_received"
    );

    enqueue(
        &state.broker,
        OutboundMessage::new(kind, raw_identifier, alert.message),
        &destination,
    )
}

// =============================================================================
// Generic Message
// =============================================================================

/// Free-form message with explicit destination kind.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMessageRequest {
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub body: String,
}

/// Send an arbitrary message to a user or group.
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.authorized(&headers) {
        warn!("message_unauthorized");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let request: SendMessageRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "message_decode_failed");
            return (StatusCode::BAD_REQUEST, "error decoding message").into_response();
        }
    };

    if request.to.is_empty() || request.body.is_empty() {
        return (StatusCode::BAD_REQUEST, "to and body are required").into_response();
    }

    let kind = match request.kind.as_str() {
        "user" => DestinationKind::User,
        "group" => DestinationKind::Group,
        _ => return (StatusCode::BAD_REQUEST, "type must be user or group").into_response(),
    };

    let destination = match resolve(kind, &request.to) {
        Ok(destination) => destination,
        Err(_) => return (StatusCode::BAD_REQUEST, "to and body are required").into_response(),
    };

    info!(
        kind = %kind,
        destination = %destination,
        message_length = request.body.len(),
        "message_received"
    );

    enqueue(
        &state.broker,
        OutboundMessage::new(kind, request.to, request.body),
        &destination,
    )
}

/// Submit to the broker and map the outcome to a response.
fn enqueue(broker: &Broker, message: OutboundMessage, destination: &Destination) -> Response {
    match broker.submit(message) {
        Ok(()) => (
            StatusCode::OK,
            format!("Message sent to {}", destination.identifier()),
        )
            .into_response(),
        Err(rejected @ Rejected::Full(_)) => {
            warn!(destination = %destination, error = %rejected, "dispatch_rejected_full");
            (StatusCode::SERVICE_UNAVAILABLE, "queue full").into_response()
        }
        Err(Rejected::Closed) => {
            warn!(destination = %destination, "dispatch_rejected_closed");
            (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response()
        }
    }
}
