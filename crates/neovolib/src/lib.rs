//! # neovolib -- LAN Control for AG Neovo Displays
//!
//! `neovolib` is an asynchronous Rust library for controlling AG Neovo
//! professional displays over their SICP LAN control port. It is designed
//! for show control, signage management and room automation where a
//! controller keeps one persistent connection per display.
//!
//! ## Quick Start
//!
//! Add `neovolib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! neovolib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a display and switch it on:
//!
//! ```no_run
//! use neovolib::{NeovoBuilder, PowerState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let display = NeovoBuilder::new()
//!         .host("192.168.1.50")
//!         .monitor_id(1)
//!         .build()?;
//!     display.connect().await?;
//!
//!     display.set_power(PowerState::On).await?;
//!     println!("power: {}", display.get_power().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                   | Purpose                                              |
//! |-------------------------|------------------------------------------------------|
//! | `neovolib-core`         | Transport traits, protocol types, events, errors     |
//! | `neovolib-transport`    | TCP transport and connector                          |
//! | `neovolib-sicp`         | SICP frame codec, command dispatcher, `NeovoClient`  |
//! | `neovolib-test-harness` | Mock transport, mock connector, scripted TCP server  |
//! | **`neovolib`**          | This facade crate -- re-exports plus state polling   |
//!
//! Every command goes through a single IO task that owns the socket. Commands
//! are queued FIFO with exactly one in flight; an unanswered command is
//! retransmitted until its retry budget runs out and then fails with
//! [`Error::Timeout`]. Closing the connection fails everything outstanding
//! with [`Error::ConnectionClosed`].
//!
//! ## Event Subscription
//!
//! The client emits [`DisplayEvent`]s through a broadcast channel:
//! connection transitions, unsolicited reports and per-frame diagnostics.
//!
//! ```no_run
//! use neovolib::{DisplayEvent, NeovoClient};
//! # async fn example(display: &NeovoClient) {
//! let mut events = display.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         DisplayEvent::Report(frame) => println!("report: {:02X?}", frame.data),
//!         DisplayEvent::Disconnected { cause } => {
//!             println!("disconnected: {}", cause.as_deref().unwrap_or("closed"));
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```
//!
//! ## State Polling
//!
//! [`Poller`] keeps a [`DisplayState`] current in the background, the way a
//! control surface shows power, input and volume:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use neovolib::{NeovoBuilder, Poller};
//!
//! # async fn example() -> neovolib::Result<()> {
//! let display = Arc::new(NeovoBuilder::new().host("192.168.1.50").build()?);
//! let poller = Poller::spawn(Arc::clone(&display), Duration::from_secs(5));
//! display.connect().await?;
//!
//! let mut state = poller.subscribe();
//! while state.changed().await.is_ok() {
//!     println!("{:?}", *state.borrow());
//! }
//! # Ok(())
//! # }
//! ```

pub use neovolib_core::*;

pub mod poller;
pub mod state;

pub use poller::{Poller, refresh_state};
pub use state::DisplayState;

pub use neovolib_sicp::builder::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};
pub use neovolib_sicp::{ClientConfig, Command, InputLabels, NeovoBuilder, NeovoClient};

/// SICP protocol internals: frame codec, command builders and parsers.
///
/// Most applications only need [`NeovoClient`]; these modules are for
/// sending commands the typed API does not cover and for building test
/// fixtures.
pub mod sicp {
    pub use neovolib_sicp::{commands, frame, inputs};
}

/// Transport implementations.
pub mod transport {
    pub use neovolib_transport::{TcpConnector, TcpTransport};
}
