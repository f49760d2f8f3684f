//! HTTP client for the WhatsApp bridge sidecar.
//!
//! The bridge owns the WhatsApp Web connection, device pairing and
//! credential storage. This module talks to its small HTTP API:
//!
//! ```text
//! GET  /status      -> {success, data: {connected, phone_number}}
//! GET  /groups      -> {success, data: [{jid, name}]}
//! POST /send        <- {jid, text}
//! POST /disconnect
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Connector, Session, TransportError};
use crate::dispatch::Destination;

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Number of status checks before giving up on the bridge.
const STATUS_CHECK_RETRIES: u32 = 5;

/// Delay between status checks.
const STATUS_CHECK_DELAY: Duration = Duration::from_secs(2);

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Connection status reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Whether the bridge is connected to WhatsApp.
    pub connected: bool,
    /// The phone number linked, if connected.
    pub phone_number: Option<String>,
}

/// A group the linked account has joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedGroup {
    pub jid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    jid: &'a str,
    text: &'a str,
}

/// Opens sessions against a bridge base URL.
pub struct BridgeConnector {
    client: reqwest::Client,
    base_url: String,
    status_retries: u32,
    status_delay: Duration,
}

impl BridgeConnector {
    /// Create a connector for `base_url` with the given per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            status_retries: STATUS_CHECK_RETRIES,
            status_delay: STATUS_CHECK_DELAY,
        })
    }

    /// Override how often and how long to poll `/status` while connecting.
    pub fn with_status_checks(mut self, retries: u32, delay: Duration) -> Self {
        self.status_retries = retries.max(1);
        self.status_delay = delay;
        self
    }

    async fn status(&self) -> Result<Option<BridgeStatus>, TransportError> {
        let url = format!("{}/status", self.base_url);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: BridgeResponse<BridgeStatus> = resp.json().await?;
        if !body.success {
            debug!(error = ?body.error, "bridge_status_unsuccessful");
            return Ok(None);
        }
        Ok(body.data)
    }

    /// Poll the bridge until it reports a live WhatsApp connection.
    async fn wait_connected(&self) -> Result<BridgeStatus, TransportError> {
        for attempt in 0..self.status_retries {
            match self.status().await {
                Ok(Some(status)) if status.connected => return Ok(status),
                Ok(_) => debug!(attempt, "bridge_not_connected_yet"),
                Err(e) => debug!(attempt, error = %e, "bridge_status_failed"),
            }
            if attempt + 1 < self.status_retries {
                tokio::time::sleep(self.status_delay).await;
            }
        }
        Err(TransportError::NotConnected)
    }

    async fn joined_groups(&self) -> Result<Vec<JoinedGroup>, TransportError> {
        let url = format!("{}/groups", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let body: BridgeResponse<Vec<JoinedGroup>> = resp.json().await?;
        if !body.success {
            return Err(TransportError::Bridge(
                body.error
                    .unwrap_or_else(|| "group listing failed".to_owned()),
            ));
        }
        Ok(body.data.unwrap_or_default())
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self) -> Result<Arc<dyn Session>, TransportError> {
        info!(base_url = %self.base_url, "bridge_connecting");

        let status = self.wait_connected().await?;
        info!(phone_number = ?status.phone_number, "bridge_connected");

        // Group addresses are only discoverable this way, so operators read them from the log
        match self.joined_groups().await {
            Ok(groups) => {
                info!(count = groups.len(), "bridge_joined_groups");
                for group in &groups {
                    info!(name = %group.name, jid = %group.jid, "bridge_joined_group");
                }
            }
            Err(e) => warn!(error = %e, "bridge_groups_fetch_failed"),
        }

        Ok(Arc::new(BridgeSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
        }))
    }
}

/// A live bridge session. `reqwest::Client` is shareable across tasks.
#[derive(Clone)]
pub struct BridgeSession {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl Session for BridgeSession {
    async fn send(&self, destination: &Destination, body: &str) -> Result<(), TransportError> {
        let url = format!("{}/send", self.base_url);
        let jid = destination.jid();
        let resp = self
            .client
            .post(&url)
            .json(&SendRequest { jid: &jid, text: body })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(jid = %jid, "bridge_message_sent");
        Ok(())
    }

    async fn disconnect(&self) {
        let url = format!("{}/disconnect", self.base_url);
        match self.client.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => info!("bridge_disconnected"),
            Ok(resp) => warn!(status = resp.status().as_u16(), "bridge_disconnect_rejected"),
            Err(e) => warn!(error = %e, "bridge_disconnect_failed"),
        }
    }
}
