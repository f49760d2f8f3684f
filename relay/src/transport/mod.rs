//! Chat transport boundary.
//!
//! The dispatch core only needs to open a session, send one text message to
//! one destination, and release the session. Everything else (pairing, the
//! wire protocol, credential storage) lives behind these traits.

pub mod bridge;

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::Destination;

pub use bridge::{BridgeConnector, BridgeSession};

/// Errors from the chat transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP request to the bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge is reachable but not paired or not connected to WhatsApp.
    #[error("not connected to WhatsApp")]
    NotConnected,

    /// The bridge reported a failure in its response envelope.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// The bridge answered with a non-success status.
    #[error("send rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Establishes a session with the chat transport.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Session>, TransportError>;
}

/// A connected transport session.
///
/// Both dispatch workers call `send` concurrently, so implementations must be
/// safe for concurrent use.
#[async_trait]
pub trait Session: Send + Sync {
    /// Send one text message to one destination.
    async fn send(&self, destination: &Destination, body: &str) -> Result<(), TransportError>;

    /// Release the session. Called once, after the workers have stopped.
    async fn disconnect(&self);
}
