//! Transport and connector traits for display communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to a display.
//! The production implementation is a TCP socket (`neovolib-transport`);
//! tests use the scripted `MockTransport` from `neovolib-test-harness`.
//!
//! A [`Connector`] opens a fresh transport on demand, which lets a client
//! reconnect after the display drops the link without knowing how the
//! stream is established.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a display.
///
/// Implementations deal with sockets only; framing, checksums, and request
/// matching live in the protocol engine that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the display.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying stream.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the display into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data;
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrives and [`Error::ConnectionClosed`](crate::error::Error::ConnectionClosed)
    /// once the peer has closed the stream.
    ///
    /// Must be cancel-safe: dropping the future before it completes must
    /// not lose bytes.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Factory for transports, invoked on every `connect()`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the display.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// Human-readable description of the endpoint, used in logs.
    fn describe(&self) -> String;
}
