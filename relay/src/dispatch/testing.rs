//! In-memory transport session for dispatch tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{Destination, DestinationKind};
use crate::transport::{Session, TransportError};

/// Records every send attempt (including failed ones) in call order.
#[derive(Default)]
pub(crate) struct RecordingSession {
    attempts: Mutex<Vec<(String, String)>>,
    fail_calls: Vec<usize>,
    hang_kind: Option<DestinationKind>,
    hang_disconnect: bool,
    disconnects: AtomicUsize,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the zero-based `call`th send.
    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.fail_calls.push(call);
        self
    }

    /// Never complete sends to destinations of `kind`.
    pub fn hang_on(mut self, kind: DestinationKind) -> Self {
        self.hang_kind = Some(kind);
        self
    }

    /// Never complete `disconnect`. The call is still counted.
    pub fn hang_on_disconnect(mut self) -> Self {
        self.hang_disconnect = true;
        self
    }

    pub fn bodies(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn jids(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(jid, _)| jid.clone())
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` sends were attempted. Panics after 5s.
    pub async fn wait_for_attempts(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.attempts.lock().unwrap().len() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} send attempts"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn send(&self, destination: &Destination, body: &str) -> Result<(), TransportError> {
        let call = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push((destination.jid(), body.to_string()));
            attempts.len() - 1
        };

        if self.hang_kind == Some(destination.kind()) {
            std::future::pending::<()>().await;
        }

        if self.fail_calls.contains(&call) {
            return Err(TransportError::Rejected {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.hang_disconnect {
            std::future::pending::<()>().await;
        }
    }
}
