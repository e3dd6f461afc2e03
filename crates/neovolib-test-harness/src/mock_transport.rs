//! Mock transport for deterministic testing of the protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait on top of shared,
//! scriptable state. Once the transport has been moved into a client, the
//! test keeps a cloned [`MockHandle`] to inspect what was written, inject
//! inbound bytes in arbitrary chunks, and simulate the display hanging up.
//!
//! # Example
//!
//! ```
//! use neovolib_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! let handle = mock.handle();
//! // When the client sends the power query, answer with "power on".
//! handle.expect(
//!     &[0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC],
//!     &[0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E],
//! );
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use neovolib_core::error::{Error, Result};
use neovolib_core::transport::Transport;

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Bytes made readable once the matching request is sent. May be empty,
    /// which models a display that ignores the request.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    expectations: VecDeque<Expectation>,
    /// Chunks waiting to be returned by `receive()`, in order.
    inbound: VecDeque<Vec<u8>>,
    /// Every `send()` payload, in order.
    sent_log: Vec<Vec<u8>>,
    /// Cleared by `close()` on the client side.
    connected: bool,
    /// The simulated display has hung up.
    remote_closed: bool,
    /// An I/O failure to report from the next `receive()`.
    remote_fault: Option<(std::io::ErrorKind, String)>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    inbound_ready: Notify,
    sent: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A scripted [`Transport`] for testing without a display.
///
/// Sends are recorded and matched against the next expectation, if any.
/// A mismatch consumes the expectation and fails the send with
/// [`Error::Protocol`]. Sends made after the
/// script is exhausted are recorded and left unanswered.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    expectations: VecDeque::new(),
                    inbound: VecDeque::new(),
                    sent_log: Vec::new(),
                    connected: true,
                    remote_closed: false,
                    remote_fault: None,
                }),
                inbound_ready: Notify::new(),
                sent: Notify::new(),
            }),
        }
    }

    /// Get a handle that stays usable after the transport is moved.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.handle().expect(request, response);
    }

    /// Return a copy of everything sent so far, one entry per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.handle().sent_data()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Add an expected request/response pair.
    ///
    /// When the client sends `request`, `response` becomes readable as a
    /// single chunk.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.shared.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Make `bytes` readable as one chunk, independent of any request.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.shared.lock().inbound.push_back(bytes.to_vec());
        self.shared.inbound_ready.notify_one();
    }

    /// Return a copy of everything sent so far, one entry per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.shared.lock().sent_log.clone()
    }

    /// Number of `send()` calls so far.
    pub fn sent_count(&self) -> usize {
        self.shared.lock().sent_log.len()
    }

    /// Wait until at least `count` sends have been recorded.
    ///
    /// Callers should bound this with `tokio::time::timeout`.
    pub async fn wait_for_sends(&self, count: usize) {
        loop {
            let notified = self.shared.sent.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Number of expectations that have not been consumed yet.
    pub fn remaining_expectations(&self) -> usize {
        self.shared.lock().expectations.len()
    }

    /// Simulate the display closing the connection.
    ///
    /// Inbound chunks already queued are still delivered; afterwards
    /// `receive()` returns [`Error::ConnectionClosed`].
    pub fn close_remote(&self) {
        self.shared.lock().remote_closed = true;
        self.shared.inbound_ready.notify_one();
    }

    /// Simulate a socket error on the display side.
    pub fn fail_remote(&self, kind: std::io::ErrorKind, message: &str) {
        self.shared.lock().remote_fault = Some((kind, message.to_string()));
        self.shared.inbound_ready.notify_one();
    }

    /// Returns `true` while the client has not closed the transport.
    pub fn is_open(&self) -> bool {
        self.shared.lock().connected
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let result = {
            let mut state = self.shared.lock();
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if state.remote_closed {
                return Err(Error::ConnectionClosed);
            }

            state.sent_log.push(data.to_vec());

            match state.expectations.pop_front() {
                Some(expectation) if expectation.request.as_slice() != data => {
                    Err(Error::Protocol(format!(
                        "unexpected send data: expected {:02X?}, got {:02X?}",
                        expectation.request, data
                    )))
                }
                Some(expectation) => {
                    if !expectation.response.is_empty() {
                        state.inbound.push_back(expectation.response);
                    }
                    Ok(())
                }
                None => Ok(()),
            }
        };

        self.shared.sent.notify_waiters();
        self.shared.inbound_ready.notify_one();
        result
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.shared.inbound_ready.notified();
            {
                let mut state = self.shared.lock();
                if !state.connected {
                    return Err(Error::NotConnected);
                }

                if let Some(chunk) = state.inbound.pop_front() {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        state.inbound.push_front(chunk[n..].to_vec());
                    }
                    return Ok(n);
                }

                if let Some((kind, message)) = state.remote_fault.take() {
                    state.remote_closed = true;
                    return Err(Error::Io(std::io::Error::new(kind, message)));
                }

                if state.remote_closed {
                    return Err(Error::ConnectionClosed);
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(Error::Timeout);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        {
            let mut state = self.shared.lock();
            state.connected = false;
            state.inbound.clear();
        }
        self.shared.inbound_ready.notify_one();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }
}
