//! Asynchronous display event types.
//!
//! Events are emitted by the client through a [`tokio::sync::broadcast`]
//! channel. Connection transitions and unsolicited reports drive
//! application state; the remaining variants are diagnostics for logging
//! consumers and never influence command handling.
//!
//! [`tokio::sync::broadcast`]: https://docs.rs/tokio/latest/tokio/sync/broadcast/index.html

use crate::types::{AckStatus, Frame};

/// An event emitted by a display client.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss diagnostics under heavy traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// The connection to the display was established.
    Connected,

    /// The connection was closed, by either side.
    ///
    /// Emitted exactly once per transition out of the connected state.
    Disconnected {
        /// Description of the error that caused the close, if any.
        cause: Option<String>,
    },

    /// An inbound frame that did not answer the in-flight request.
    ///
    /// Either a state push from the display or a stray/late response.
    Report(Frame),

    /// A request packet was written to the socket.
    Transmit {
        /// Dispatcher-assigned request identity.
        request_id: u64,
        /// Command code of the request.
        command: u8,
        /// 1-based attempt number.
        attempt: u32,
        /// Attempts left after this one.
        attempts_remaining: u32,
        /// The exact bytes written.
        packet: Vec<u8>,
    },

    /// A request timed out and is being sent again.
    Retry {
        /// Dispatcher-assigned request identity.
        request_id: u64,
        /// Command code of the request.
        command: u8,
        /// Attempts left, including the one about to be sent.
        attempts_remaining: u32,
    },

    /// A request exhausted every attempt without a response.
    Timeout {
        /// Dispatcher-assigned request identity.
        request_id: u64,
        /// Command code of the request.
        command: u8,
    },

    /// A chunk of bytes arrived on the socket.
    RawReceived {
        /// The chunk as read.
        bytes: Vec<u8>,
    },

    /// A well-formed frame was decoded from the receive buffer.
    FrameReceived(Frame),

    /// A request completed successfully.
    CommandSucceeded {
        /// Dispatcher-assigned request identity.
        request_id: u64,
        /// Command code of the request.
        command: u8,
        /// Response payload; `None` for a plain acknowledgement.
        response: Option<Vec<u8>>,
    },

    /// A request was rejected by the display.
    CommandFailed {
        /// Dispatcher-assigned request identity.
        request_id: u64,
        /// Command code of the request.
        command: u8,
        /// Status reported by the display.
        status: AckStatus,
    },
}

impl DisplayEvent {
    /// Returns `true` for events that only exist for observability.
    pub fn is_diagnostic(&self) -> bool {
        !matches!(
            self,
            DisplayEvent::Connected | DisplayEvent::Disconnected { .. } | DisplayEvent::Report(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_events_are_not_diagnostic() {
        assert!(!DisplayEvent::Connected.is_diagnostic());
        assert!(!DisplayEvent::Disconnected { cause: None }.is_diagnostic());
        let frame = Frame {
            monitor_id: 1,
            data: vec![0x19, 0x02],
        };
        assert!(!DisplayEvent::Report(frame.clone()).is_diagnostic());
        assert!(DisplayEvent::FrameReceived(frame).is_diagnostic());
        assert!(
            DisplayEvent::Timeout {
                request_id: 1,
                command: 0x19
            }
            .is_diagnostic()
        );
    }
}
