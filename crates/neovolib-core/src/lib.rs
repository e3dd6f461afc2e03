//! neovolib-core: Core traits, types, and error definitions for neovolib.
//!
//! This crate defines the protocol-agnostic pieces shared by the SICP
//! client, the transports, and applications. Control software depends on
//! these types without pulling in a socket implementation.
//!
//! # Key types
//!
//! - [`Transport`] / [`Connector`] -- byte-level communication channel
//! - [`DisplayEvent`] -- connection, report, and diagnostic notifications
//! - [`Frame`], [`PowerState`], [`Volume`], [`AckStatus`] -- protocol values
//! - [`Reading`] -- polled value that may still be unknown
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use neovolib_core::*`.
pub use error::{Error, Result};
pub use events::DisplayEvent;
pub use transport::{Connector, Transport};
pub use types::*;
