//! WhatsApp webhook relay.
//!
//! Receives Grafana alerts (and generic messages) over HTTP and relays them
//! to WhatsApp users and groups through a bridge sidecar.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → Web Server → Broker (user / group queues) → Workers → WhatsApp bridge
//! ```

pub mod config;
pub mod dispatch;
pub mod service;
pub mod transport;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{
    Broker, BrokerState, DestinationKind, DispatchSettings, Dispatcher, OutboundMessage, Rejected,
};
pub use transport::{BridgeConnector, Connector, Session, TransportError};
pub use web::{router, AppState};
