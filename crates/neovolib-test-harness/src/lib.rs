//! neovolib-test-harness: Test utilities and mock transports for neovolib.
//!
//! This crate provides [`MockTransport`] (with its test-side
//! [`MockHandle`]) and [`MockConnector`] for deterministic unit testing of
//! the protocol engine without a display, and [`MockTcpServer`] for
//! end-to-end tests over real TCP sockets.

pub mod mock_connector;
pub mod mock_tcp;
pub mod mock_transport;

pub use mock_connector::MockConnector;
pub use mock_tcp::MockTcpServer;
pub use mock_transport::{MockHandle, MockTransport};
