//! Outbound message dispatch.
//!
//! Decouples the HTTP handlers from WhatsApp delivery. Each destination
//! kind has its own bounded queue and a single worker, so a slow or full
//! group queue never holds up user messages.
//!
//! ## Architecture
//!
//! ```text
//! HTTP handler --submit()--> user queue  --> user worker  --+
//!                        \-> group queue --> group worker --+--> Session::send
//! ```
//!
//! Delivery is best effort and at most once: failures after acceptance are
//! logged by the worker and never retried.

pub mod broker;
pub mod lifecycle;
pub mod resolver;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use broker::{Broker, BrokerState, Rejected};
pub use lifecycle::{DispatchSettings, Dispatcher};
pub use resolver::{resolve, ResolveError};
pub use types::{Destination, DestinationKind, OutboundMessage};
pub use worker::WorkerStats;
