//! Core types used throughout neovolib.
//!
//! These are the protocol-level and domain-level values shared by the
//! codec, the dispatcher, and applications: decoded frames, power and
//! volume settings, acknowledgement status codes, and connection state.

use std::fmt;
use std::str::FromStr;

/// A decoded inbound frame.
///
/// `data` holds the echoed command code followed by its payload. Framing
/// bytes (marker, length, frame type, checksum) are stripped by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Monitor ID of the display that sent the frame.
    pub monitor_id: u8,
    /// Command code plus payload.
    pub data: Vec<u8>,
}

impl Frame {
    /// The leading data byte (command code, or `0x00` for an acknowledgement).
    pub fn code(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Payload bytes following the command code.
    pub fn payload(&self) -> &[u8] {
        self.data.get(1..).unwrap_or(&[])
    }
}

/// Display power state as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Standby (`0x01`).
    Off,
    /// Powered on (`0x02`).
    On,
}

impl PowerState {
    /// Wire encoding of this state.
    pub fn to_byte(self) -> u8 {
        match self {
            PowerState::Off => 0x01,
            PowerState::On => 0x02,
        }
    }

    /// Decode a wire byte, returning `None` for values the display
    /// should never report.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PowerState::Off),
            0x02 => Some(PowerState::On),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => write!(f, "off"),
            PowerState::On => write!(f, "on"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`PowerState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePowerStateError(String);

impl fmt::Display for ParsePowerStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown power state: {}", self.0)
    }
}

impl std::error::Error for ParsePowerStateError {}

impl FromStr for PowerState {
    type Err = ParsePowerStateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" | "standby" => Ok(PowerState::Off),
            _ => Err(ParsePowerStateError(s.to_string())),
        }
    }
}

/// Highest level accepted for either volume channel.
pub const MAX_VOLUME: u8 = 100;

/// Speaker and line-out volume levels, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Volume {
    /// Internal speaker level.
    pub speaker: u8,
    /// Audio line-out level.
    pub line_out: u8,
}

impl Volume {
    /// Create a volume pair, clamping each level to [`MAX_VOLUME`].
    pub fn new(speaker: u8, line_out: u8) -> Self {
        Volume {
            speaker: speaker.min(MAX_VOLUME),
            line_out: line_out.min(MAX_VOLUME),
        }
    }

    /// Same level on both channels.
    pub fn uniform(level: u8) -> Self {
        Volume::new(level, level)
    }

    /// Replace the speaker level, keeping the line-out level.
    pub fn with_speaker(self, speaker: u8) -> Self {
        Volume::new(speaker, self.line_out)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker {} / line-out {}", self.speaker, self.line_out)
    }
}

/// Status byte carried by a generic acknowledgement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckStatus {
    /// `0x00`: command executed.
    Completed,
    /// `0x01`: value above the accepted range.
    LimitOverUpper,
    /// `0x02`: value below the accepted range.
    LimitOverLower,
    /// `0x03`: command canceled, or not accepted in the current state.
    Canceled,
    /// `0x04`: command not understood, or not available on this model.
    ParseError,
    /// Any other status byte.
    Unknown(u8),
}

impl AckStatus {
    /// Decode a status byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => AckStatus::Completed,
            0x01 => AckStatus::LimitOverUpper,
            0x02 => AckStatus::LimitOverLower,
            0x03 => AckStatus::Canceled,
            0x04 => AckStatus::ParseError,
            other => AckStatus::Unknown(other),
        }
    }

    /// Raw status byte.
    pub fn to_byte(self) -> u8 {
        match self {
            AckStatus::Completed => 0x00,
            AckStatus::LimitOverUpper => 0x01,
            AckStatus::LimitOverLower => 0x02,
            AckStatus::Canceled => 0x03,
            AckStatus::ParseError => 0x04,
            AckStatus::Unknown(other) => other,
        }
    }

    /// Returns `true` if the command succeeded.
    pub fn is_success(self) -> bool {
        self == AckStatus::Completed
    }

    /// Returns `true` for rejections a display routinely sends when a
    /// query does not apply to its current state (e.g. input query while
    /// in standby).
    pub fn is_benign(self) -> bool {
        matches!(self, AckStatus::Canceled | AckStatus::ParseError)
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckStatus::Completed => write!(f, "Completed"),
            AckStatus::LimitOverUpper => write!(f, "Limit over (upper)"),
            AckStatus::LimitOverLower => write!(f, "Limit over (lower)"),
            AckStatus::Canceled => write!(f, "Command canceled or NACK"),
            AckStatus::ParseError => write!(f, "Parse error or NAV"),
            AckStatus::Unknown(byte) => write!(f, "Unknown status 0x{byte:02x}"),
        }
    }
}

/// Selector byte for the platform/version information query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceInfoItem {
    /// Firmware version string (`0x00`).
    FirmwareVersion,
    /// Model number string (`0x01`).
    ModelNumber,
    /// Any other selector supported by a particular model.
    Other(u8),
}

impl DeviceInfoItem {
    /// Selector byte sent as the query parameter.
    pub fn selector(self) -> u8 {
        match self {
            DeviceInfoItem::FirmwareVersion => 0x00,
            DeviceInfoItem::ModelNumber => 0x01,
            DeviceInfoItem::Other(byte) => byte,
        }
    }
}

/// Connection lifecycle state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and none in progress.
    #[default]
    Disconnected,
    /// Waiting for the socket to open.
    Connecting,
    /// Socket open; commands may be sent.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{s}")
    }
}

/// A polled value that may not have been read yet.
///
/// Keeps "never polled" distinct from a legitimately polled zero or empty
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reading<T> {
    /// Not yet read, or invalidated by a disconnect.
    #[default]
    Unknown,
    /// Last value read from the display.
    Known(T),
}

impl<T> Reading<T> {
    /// Returns `true` if a value has been read.
    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known(_))
    }

    /// Borrow the value, if known.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Reading::Known(value) => Some(value),
            Reading::Unknown => None,
        }
    }

    /// Convert into an `Option`.
    pub fn known(self) -> Option<T> {
        match self {
            Reading::Known(value) => Some(value),
            Reading::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Known(v),
            None => Reading::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Known(value) => write!(f, "{value}"),
            Reading::Unknown => write!(f, "unknown"),
        }
    }
}
