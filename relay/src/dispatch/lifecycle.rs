//! Startup and shutdown of the dispatch broker.
//!
//! ## Shutdown sequence
//!
//! ```text
//! Open --shutdown()--> Draining --workers drained or grace expired--> Closed
//!        refuse submits            abort leftovers, disconnect transport
//! ```
//!
//! Only the first `shutdown()` call starts the sequence; every call waits for
//! it to reach `Closed`. Worst case is the grace period plus the disconnect
//! timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::broker::{Broker, BrokerState};
use super::types::DestinationKind;
use super::worker::{self, WorkerStats};
use crate::config::{Config, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_MS};
use crate::transport::{Connector, Session, TransportError};

/// Upper bound on releasing the transport after the workers stop.
const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Sizing and timing for the broker.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// Capacity of each work queue.
    pub queue_capacity: usize,
    /// Upper bound on draining at shutdown.
    pub grace_period: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            grace_period: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
        }
    }
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            grace_period: config.shutdown_grace(),
        }
    }
}

/// Owns the transport session and the two workers.
pub struct Dispatcher {
    broker: Broker,
    session: Arc<dyn Session>,
    workers: Mutex<Option<Vec<JoinHandle<WorkerStats>>>>,
    grace_period: Duration,
}

impl Dispatcher {
    /// Connect the transport and start both workers.
    pub async fn start(
        connector: &dyn Connector,
        settings: DispatchSettings,
    ) -> Result<Self, TransportError> {
        let session = connector.connect().await?;
        Ok(Self::with_session(session, settings))
    }

    /// Start both workers on an already connected session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_session(session: Arc<dyn Session>, settings: DispatchSettings) -> Self {
        let (broker, queues) = Broker::new(settings.queue_capacity);

        let workers = vec![
            tokio::spawn(worker::run(
                DestinationKind::User,
                queues.user,
                session.clone(),
                broker.draining_token(),
            )),
            tokio::spawn(worker::run(
                DestinationKind::Group,
                queues.group,
                session.clone(),
                broker.draining_token(),
            )),
        ];

        info!(
            queue_capacity = settings.queue_capacity,
            grace_period_ms = settings.grace_period.as_millis() as u64,
            "dispatcher_started"
        );

        Self {
            broker,
            session,
            workers: Mutex::new(Some(workers)),
            grace_period: settings.grace_period,
        }
    }

    /// Handle for producers.
    pub fn broker(&self) -> Broker {
        self.broker.clone()
    }

    pub fn state(&self) -> BrokerState {
        self.broker.state()
    }

    /// Stop accepting, drain within the grace period, release the transport.
    ///
    /// The sequence runs on its own task, so it completes even if the caller
    /// that started it is dropped.
    pub async fn shutdown(&self) {
        if self.broker.begin_draining() {
            let workers = self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take()
                .unwrap_or_default();

            tokio::spawn(run_shutdown(
                self.broker.clone(),
                self.session.clone(),
                workers,
                self.grace_period,
            ));
        }

        self.broker.closed().await;
    }
}

async fn run_shutdown(
    broker: Broker,
    session: Arc<dyn Session>,
    mut workers: Vec<JoinHandle<WorkerStats>>,
    grace_period: Duration,
) {
    info!(
        user_queued = broker.queued(DestinationKind::User),
        group_queued = broker.queued(DestinationKind::Group),
        "dispatcher_draining"
    );

    let drained = tokio::time::timeout(grace_period, join_all(workers.iter_mut()))
        .await
        .is_ok();

    if drained {
        info!("dispatcher_drained");
    } else {
        // Whatever is still queued or in flight is abandoned here
        warn!(
            grace_period_ms = grace_period.as_millis() as u64,
            user_queued = broker.queued(DestinationKind::User),
            group_queued = broker.queued(DestinationKind::Group),
            "dispatcher_grace_expired"
        );
        for handle in &workers {
            handle.abort();
        }
    }

    if tokio::time::timeout(DISCONNECT_TIMEOUT, session.disconnect())
        .await
        .is_err()
    {
        warn!(
            timeout_ms = DISCONNECT_TIMEOUT.as_millis() as u64,
            "dispatcher_disconnect_timeout"
        );
    }
    broker.mark_closed();

    info!("dispatcher_closed");
}
