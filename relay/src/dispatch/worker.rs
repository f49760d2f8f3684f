//! Per-kind delivery worker.
//!
//! Each worker is the only consumer of its queue, which is what keeps
//! delivery FIFO within a destination kind. Failures are logged and the
//! worker moves on; nothing is retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::resolver::resolve;
use super::types::{DestinationKind, OutboundMessage};
use crate::transport::Session;

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Sent,
    Unresolved,
    SendFailed,
}

/// Counters reported when the worker stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub sent: u64,
    pub unresolved: u64,
    pub send_failed: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Unresolved => self.unresolved += 1,
            Outcome::SendFailed => self.send_failed += 1,
        }
    }
}

/// Drain `queue` until it is closed and empty.
///
/// When `draining` fires the queue is closed to new messages; everything
/// already buffered is still delivered before the worker returns.
pub(crate) async fn run(
    kind: DestinationKind,
    mut queue: mpsc::Receiver<OutboundMessage>,
    session: Arc<dyn Session>,
    draining: CancellationToken,
) -> WorkerStats {
    info!(kind = %kind, "worker_started");

    let mut stats = WorkerStats::default();
    let mut closing = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = draining.cancelled(), if !closing => {
                queue.close();
                closing = true;
                info!(kind = %kind, queued = queue.len(), "worker_draining");
                continue;
            }
            message = queue.recv() => message,
        };

        let Some(message) = next else { break };
        stats.record(deliver(session.as_ref(), message).await);
    }

    info!(
        kind = %kind,
        sent = stats.sent,
        unresolved = stats.unresolved,
        send_failed = stats.send_failed,
        "worker_stopped"
    );

    stats
}

/// Make the single delivery attempt for one message.
pub(crate) async fn deliver(session: &dyn Session, message: OutboundMessage) -> Outcome {
    let kind = message.kind();

    let destination = match resolve(kind, message.raw_identifier()) {
        Ok(destination) => destination,
        Err(e) => {
            warn!(
                kind = %kind,
                raw_identifier = %message.raw_identifier(),
                error = %e,
                "dispatch_resolve_failed"
            );
            return Outcome::Unresolved;
        }
    };

    match session.send(&destination, message.body()).await {
        Ok(()) => {
            info!(
                kind = %kind,
                destination = %destination,
                body_length = message.body().len(),
                "dispatch_sent"
            );
            Outcome::Sent
        }
        Err(e) => {
            error!(
                kind = %kind,
                destination = %destination,
                error = %e,
                "dispatch_send_failed"
            );
            Outcome::SendFailed
        }
    }
}
