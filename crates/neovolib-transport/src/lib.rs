//! Transport implementations for neovolib.
//!
//! This crate provides the concrete [`Transport`](neovolib_core::Transport)
//! and [`Connector`](neovolib_core::Connector) used to reach a display over
//! its LAN control port:
//!
//! - [`TcpTransport`]: an established TCP stream to the display
//! - [`TcpConnector`]: opens a new `TcpTransport` on every connect
//!
//! # Example
//!
//! ```no_run
//! use neovolib_transport::TcpTransport;
//! use neovolib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> neovolib_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:5000").await?;
//!
//! // Power-state query for monitor 1
//! transport.send(&[0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC]).await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_millis(500)).await?;
//! # Ok(())
//! # }
//! ```

pub mod tcp;

pub use tcp::{TcpConnector, TcpTransport};
