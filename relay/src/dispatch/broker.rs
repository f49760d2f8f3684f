//! Submission side of the dispatch broker.
//!
//! The broker owns one bounded queue per destination kind. Producers (HTTP
//! handlers) call [`Broker::submit`], which never waits: a message is either
//! queued immediately or rejected.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{DestinationKind, OutboundMessage};

/// Lifecycle of the broker. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BrokerState {
    /// Accepting submissions, workers running.
    Open = 0,
    /// Refusing submissions, workers finishing queued messages.
    Draining = 1,
    /// Workers stopped and transport released.
    Closed = 2,
}

impl BrokerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BrokerState::Open,
            1 => BrokerState::Draining,
            _ => BrokerState::Closed,
        }
    }
}

/// Why a submission was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("{0} queue is full")]
    Full(DestinationKind),

    #[error("broker is shutting down")]
    Closed,
}

/// Receiving halves handed to the workers.
pub(crate) struct Queues {
    pub user: mpsc::Receiver<OutboundMessage>,
    pub group: mpsc::Receiver<OutboundMessage>,
}

/// Cheaply cloneable handle to the broker.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    user_tx: mpsc::Sender<OutboundMessage>,
    group_tx: mpsc::Sender<OutboundMessage>,
    state: AtomicU8,
    /// Cancelled once on Open -> Draining; workers close their queues on it.
    draining: CancellationToken,
    /// Cancelled once on Draining -> Closed.
    closed: CancellationToken,
}

impl Broker {
    /// Create a broker whose queues each hold `capacity` messages.
    pub(crate) fn new(capacity: usize) -> (Self, Queues) {
        let (user_tx, user) = mpsc::channel(capacity.max(1));
        let (group_tx, group) = mpsc::channel(capacity.max(1));

        let broker = Self {
            inner: Arc::new(BrokerInner {
                user_tx,
                group_tx,
                state: AtomicU8::new(BrokerState::Open as u8),
                draining: CancellationToken::new(),
                closed: CancellationToken::new(),
            }),
        };

        (broker, Queues { user, group })
    }

    /// Hand a message to the broker without waiting.
    ///
    /// On `Ok` the message will get exactly one delivery attempt, unless the
    /// shutdown grace period runs out first.
    pub fn submit(&self, message: OutboundMessage) -> Result<(), Rejected> {
        if self.state() != BrokerState::Open {
            return Err(Rejected::Closed);
        }

        let kind = message.kind();
        match self.sender(kind).try_send(message) {
            Ok(()) => {
                debug!(kind = %kind, "dispatch_accepted");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Rejected::Full(kind)),
            // The worker closed its queue after we read the state
            Err(TrySendError::Closed(_)) => Err(Rejected::Closed),
        }
    }

    pub fn state(&self) -> BrokerState {
        BrokerState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Number of messages waiting in the queue for `kind`.
    pub fn queued(&self, kind: DestinationKind) -> usize {
        let tx = self.sender(kind);
        tx.max_capacity() - tx.capacity()
    }

    /// Wait until the broker reaches `Closed`.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }

    /// Move Open -> Draining. Returns true only for the caller that made the move.
    pub(crate) fn begin_draining(&self) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(
                BrokerState::Open as u8,
                BrokerState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if won {
            self.inner.draining.cancel();
        }
        won
    }

    pub(crate) fn mark_closed(&self) {
        self.inner
            .state
            .store(BrokerState::Closed as u8, Ordering::Release);
        self.inner.closed.cancel();
    }

    pub(crate) fn draining_token(&self) -> CancellationToken {
        self.inner.draining.clone()
    }

    fn sender(&self, kind: DestinationKind) -> &mpsc::Sender<OutboundMessage> {
        match kind {
            DestinationKind::User => &self.inner.user_tx,
            DestinationKind::Group => &self.inner.group_tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_routes_by_kind() {
        let (broker, mut queues) = Broker::new(4);

        broker.submit(OutboundMessage::user("+4912", "a")).unwrap();
        broker.submit(OutboundMessage::group("1203", "b")).unwrap();

        assert_eq!(queues.user.try_recv().unwrap().body(), "a");
        assert_eq!(queues.group.try_recv().unwrap().body(), "b");
        assert!(queues.user.try_recv().is_err());
    }

    #[test]
    fn test_submit_full_queue_rejected() {
        let (broker, mut queues) = Broker::new(2);

        broker.submit(OutboundMessage::user("1", "a")).unwrap();
        broker.submit(OutboundMessage::user("1", "b")).unwrap();
        assert_eq!(
            broker.submit(OutboundMessage::user("1", "c")),
            Err(Rejected::Full(DestinationKind::User))
        );
        assert_eq!(broker.queued(DestinationKind::User), 2);

        // The rejected message was not enqueued
        assert_eq!(queues.user.try_recv().unwrap().body(), "a");
        assert_eq!(queues.user.try_recv().unwrap().body(), "b");
        assert!(queues.user.try_recv().is_err());
    }

    #[test]
    fn test_full_group_queue_does_not_block_users() {
        let (broker, _queues) = Broker::new(1);

        broker.submit(OutboundMessage::group("g", "1")).unwrap();
        assert!(matches!(
            broker.submit(OutboundMessage::group("g", "2")),
            Err(Rejected::Full(DestinationKind::Group))
        ));
        assert!(broker.submit(OutboundMessage::user("1", "3")).is_ok());
    }

    #[test]
    fn test_submit_after_draining_rejected() {
        let (broker, mut queues) = Broker::new(4);
        assert_eq!(broker.state(), BrokerState::Open);

        assert!(broker.begin_draining());
        assert_eq!(broker.state(), BrokerState::Draining);
        assert_eq!(
            broker.submit(OutboundMessage::user("1", "late")),
            Err(Rejected::Closed)
        );
        assert!(queues.user.try_recv().is_err());

        broker.mark_closed();
        assert_eq!(broker.state(), BrokerState::Closed);
        assert_eq!(
            broker.submit(OutboundMessage::group("g", "later")),
            Err(Rejected::Closed)
        );
        assert!(queues.group.try_recv().is_err());
    }

    #[test]
    fn test_begin_draining_once() {
        let (broker, _queues) = Broker::new(1);
        let token = broker.draining_token();

        assert!(!token.is_cancelled());
        assert!(broker.begin_draining());
        assert!(!broker.begin_draining());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_closed_queue_rejects_as_closed() {
        let (broker, mut queues) = Broker::new(4);
        queues.user.close();

        assert_eq!(
            broker.submit(OutboundMessage::user("1", "a")),
            Err(Rejected::Closed)
        );
    }
}
