//! AG Neovo SICP protocol backend for neovolib.
//!
//! This crate implements the binary SICP (Serial/IP Control Protocol) used
//! by AG Neovo professional displays over their LAN control port. It
//! provides:
//!
//! - **Frame codec** ([`frame`]) -- encode outbound commands and decode
//!   inbound frames from a byte stream, with checksum validation.
//! - **Command builders** ([`commands`]) -- power, input, volume, device
//!   information and operating-hours commands, plus their reply parsers.
//! - **Input labels** ([`inputs`]) -- table-driven source code naming.
//! - **NeovoClient** ([`client`]) -- connection manager and command API on
//!   top of a single IO task with a retrying, single-flight request queue.
//! - **NeovoBuilder** ([`builder`]) -- fluent builder for `NeovoClient`.
//!
//! # Example
//!
//! ```
//! use neovolib_sicp::commands::{self, parse_power_response};
//! use neovolib_sicp::frame::{decode_frame, DecodeResult};
//! use neovolib_core::PowerState;
//!
//! // Build a power query for monitor 1.
//! let packet = commands::power_get().encode(0x01).unwrap();
//! assert_eq!(packet, vec![0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC]);
//!
//! // Decode the display's answer.
//! let reply = [0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E];
//! if let DecodeResult::Frame(frame, _) = decode_frame(&reply) {
//!     assert_eq!(parse_power_response(frame.payload()).unwrap(), PowerState::On);
//! }
//! ```

pub mod builder;
pub mod client;
pub mod commands;
pub mod frame;
pub mod inputs;
mod io;

pub use builder::NeovoBuilder;
pub use client::{ClientConfig, NeovoClient};
pub use commands::Command;
pub use inputs::InputLabels;
