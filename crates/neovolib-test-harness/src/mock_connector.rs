//! Mock connector handing out pre-built transports.
//!
//! Each `connect()` pops the next scripted outcome: either a
//! [`MockTransport`] prepared by the test, or a refusal. An exhausted
//! script behaves like a display that refuses connections.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use neovolib_core::error::{Error, Result};
use neovolib_core::transport::{Connector, Transport};

use crate::mock_transport::MockTransport;

#[derive(Debug)]
enum Outcome {
    Accept(MockTransport),
    Refuse,
}

/// A scripted [`Connector`].
#[derive(Debug, Default)]
pub struct MockConnector {
    outcomes: Mutex<VecDeque<Outcome>>,
    attempts: Arc<AtomicUsize>,
}

impl MockConnector {
    /// Create a connector with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector whose first `connect()` yields `transport`.
    pub fn with_transport(transport: MockTransport) -> Self {
        let connector = Self::new();
        connector.push_transport(transport);
        connector
    }

    /// Queue a transport for a future `connect()`.
    pub fn push_transport(&self, transport: MockTransport) {
        self.lock().push_back(Outcome::Accept(transport));
    }

    /// Queue a refused connection attempt.
    pub fn push_refusal(&self) {
        self.lock().push_back(Outcome::Refuse);
    }

    /// Shared counter of `connect()` calls, readable after the connector
    /// has been moved into a client.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Outcome>> {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.lock().pop_front() {
            Some(Outcome::Accept(transport)) => Ok(Box::new(transport)),
            Some(Outcome::Refuse) | None => Err(Error::Transport(
                "connection refused: mock display".into(),
            )),
        }
    }

    fn describe(&self) -> String {
        "mock://display".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outcomes_are_consumed_in_order() {
        let connector = MockConnector::new();
        connector.push_refusal();
        connector.push_transport(MockTransport::new());
        let attempts = connector.attempts();

        assert!(matches!(connector.connect().await, Err(Error::Transport(_))));
        let transport = connector.connect().await.unwrap();
        assert!(transport.is_connected());
        assert!(connector.connect().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
