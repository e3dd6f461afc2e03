//! Error types for neovolib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! dispatcher-level failures are all captured here.

use crate::types::AckStatus;

/// The error type for all neovolib operations.
///
/// Variants cover the failure modes of talking to a display over a single
/// shared connection: the link being down, a request running out of
/// attempts, the display refusing a command, and undecodable data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was attempted while no connection is established.
    ///
    /// Reported before any bytes are written.
    #[error("not connected")]
    NotConnected,

    /// Every attempt of a request went unanswered.
    ///
    /// This typically indicates the display is unreachable, the monitor ID
    /// is wrong, or the LAN control port is disabled in the display menu.
    #[error("timeout waiting for response")]
    Timeout,

    /// The display acknowledged the command with a nonzero status byte.
    #[error("command rejected by display: {0}")]
    DeviceRejected(AckStatus),

    /// The connection closed while the request was in flight or queued.
    #[error("connection closed")]
    ConnectionClosed,

    /// An inbound frame failed checksum or frame-type validation.
    ///
    /// Malformed frames are skipped by the receive loop; this variant is
    /// never handed to a command caller because such a frame cannot be
    /// tied to a request.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A transport-level error (socket refused, unreachable host).
    #[error("transport error: {0}")]
    Transport(String),

    /// A response payload that does not match the command's reply layout.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An invalid parameter was passed to a command or builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for device rejections that are expected in normal
    /// operation, such as querying the input of a display in standby.
    pub fn is_benign_rejection(&self) -> bool {
        matches!(self, Error::DeviceRejected(status) if status.is_benign())
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_not_connected() {
        assert_eq!(Error::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_device_rejected() {
        let e = Error::DeviceRejected(AckStatus::Canceled);
        assert_eq!(
            e.to_string(),
            "command rejected by display: Command canceled or NACK"
        );
    }

    #[test]
    fn error_display_device_rejected_unknown_status() {
        let e = Error::DeviceRejected(AckStatus::Unknown(0x7F));
        assert_eq!(e.to_string(), "command rejected by display: Unknown status 0x7f");
    }

    #[test]
    fn error_display_connection_closed() {
        assert_eq!(Error::ConnectionClosed.to_string(), "connection closed");
    }

    #[test]
    fn error_display_malformed_frame() {
        let e = Error::MalformedFrame("checksum mismatch".into());
        assert_eq!(e.to_string(), "malformed frame: checksum mismatch");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("short volume response".into());
        assert_eq!(e.to_string(), "protocol error: short volume response");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn benign_rejections() {
        assert!(Error::DeviceRejected(AckStatus::Canceled).is_benign_rejection());
        assert!(Error::DeviceRejected(AckStatus::ParseError).is_benign_rejection());
        assert!(!Error::DeviceRejected(AckStatus::LimitOverUpper).is_benign_rejection());
        assert!(!Error::Timeout.is_benign_rejection());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
