//! SICP command builders and response parsers.
//!
//! Builders return a [`Command`]: the command code, its parameter bytes,
//! and the code the display echoes when it answers a query. Set commands
//! have no expected echo and complete on a zero-status acknowledgement.
//!
//! Parsers take the response payload as delivered by the dispatcher (the
//! data field with the echoed command code already stripped) and never
//! perform I/O.

use neovolib_core::{DeviceInfoItem, Error, PowerState, Result, Volume};

use crate::frame::encode_frame;

/// Set power state. Data: one state byte.
pub const CMD_POWER_SET: u8 = 0x18;

/// Read power state.
pub const CMD_POWER_GET: u8 = 0x19;

/// Select input source. Data: source code plus three reserved bytes.
pub const CMD_INPUT_SET: u8 = 0xAC;

/// Read the current input source.
pub const CMD_INPUT_GET: u8 = 0xAD;

/// Set speaker and line-out volume.
pub const CMD_VOLUME_SET: u8 = 0x44;

/// Read speaker and line-out volume.
pub const CMD_VOLUME_GET: u8 = 0x45;

/// Platform and version information. Data: one selector byte.
pub const CMD_DEVICE_INFO: u8 = 0xA1;

/// Miscellaneous information. Data: one sub-code byte.
pub const CMD_MISC_INFO: u8 = 0x0F;

/// Sub-code of [`CMD_MISC_INFO`] for the operating-hours counter.
pub const MISC_OPERATING_HOURS: u8 = 0x02;

/// A command ready to be queued on a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command code.
    pub code: u8,
    /// Parameter bytes following the code.
    pub params: Vec<u8>,
    /// Leading data byte of the reply that answers this command; `None`
    /// for commands answered by an acknowledgement only.
    pub expected_response: Option<u8>,
}

impl Command {
    /// A fire-and-forget command, complete on a zero-status acknowledgement.
    pub fn set(code: u8, params: impl Into<Vec<u8>>) -> Self {
        Command {
            code,
            params: params.into(),
            expected_response: None,
        }
    }

    /// A query answered by a frame echoing `code`.
    pub fn query(code: u8, params: impl Into<Vec<u8>>) -> Self {
        Command {
            code,
            params: params.into(),
            expected_response: Some(code),
        }
    }

    /// Returns `true` if this command waits for a data reply.
    pub fn is_query(&self) -> bool {
        self.expected_response.is_some()
    }

    /// Encode the command for the display at `monitor_id`.
    pub fn encode(&self, monitor_id: u8) -> Result<Vec<u8>> {
        encode_frame(monitor_id, self.code, &self.params)
    }
}

// ---------------------------------------------------------------
// Builders
// ---------------------------------------------------------------

/// Switch the display on or into standby.
pub fn power_set(state: PowerState) -> Command {
    Command::set(CMD_POWER_SET, [state.to_byte()])
}

/// Query the power state.
pub fn power_get() -> Command {
    Command::query(CMD_POWER_GET, Vec::new())
}

/// Select an input source by raw code.
pub fn input_set(source: u8) -> Command {
    Command::set(CMD_INPUT_SET, [source, 0x00, 0x00, 0x00])
}

/// Query the current input source.
pub fn input_get() -> Command {
    Command::query(CMD_INPUT_GET, Vec::new())
}

/// Set speaker and line-out volume. Levels above 100 are clamped.
pub fn volume_set(volume: Volume) -> Command {
    let volume = Volume::new(volume.speaker, volume.line_out);
    Command::set(CMD_VOLUME_SET, [volume.speaker, volume.line_out])
}

/// Query speaker and line-out volume.
pub fn volume_get() -> Command {
    Command::query(CMD_VOLUME_GET, Vec::new())
}

/// Query one of the platform/version strings.
pub fn device_info(item: DeviceInfoItem) -> Command {
    Command::query(CMD_DEVICE_INFO, [item.selector()])
}

/// Query the operating-hours counter.
pub fn operating_hours() -> Command {
    Command::query(CMD_MISC_INFO, [MISC_OPERATING_HOURS])
}

// ---------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------

/// Parse a power state reply.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the payload is empty or the state byte
/// is not a known power state.
pub fn parse_power_response(data: &[u8]) -> Result<PowerState> {
    let byte = *data
        .first()
        .ok_or_else(|| Error::Protocol("empty power state response".into()))?;
    PowerState::from_byte(byte)
        .ok_or_else(|| Error::Protocol(format!("unknown power state byte 0x{byte:02X}")))
}

/// Parse an input source reply into the raw source code.
///
/// Any bytes after the source code are reserved and ignored.
pub fn parse_input_response(data: &[u8]) -> Result<u8> {
    data.first()
        .copied()
        .ok_or_else(|| Error::Protocol("empty input source response".into()))
}

/// Parse a volume reply: speaker level, then line-out level.
pub fn parse_volume_response(data: &[u8]) -> Result<Volume> {
    if data.len() < 2 {
        return Err(Error::Protocol(format!(
            "expected 2 bytes for volume response, got {}",
            data.len()
        )));
    }
    Ok(Volume::new(data[0], data[1]))
}

/// Parse a device information string.
///
/// NUL padding is removed and surrounding whitespace trimmed. Invalid
/// UTF-8 is replaced rather than rejected.
pub fn parse_text_response(data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Err(Error::Protocol("empty device info response".into()));
    }
    let text = String::from_utf8_lossy(data).replace('\0', "");
    Ok(text.trim().to_string())
}

/// Parse an operating-hours reply: `[0x02, hi, lo]`.
pub fn parse_hours_response(data: &[u8]) -> Result<u16> {
    if data.len() < 3 {
        return Err(Error::Protocol(format!(
            "expected 3 bytes for operating hours response, got {}",
            data.len()
        )));
    }
    if data[0] != MISC_OPERATING_HOURS {
        return Err(Error::Protocol(format!(
            "unexpected misc info sub-code 0x{:02X}",
            data[0]
        )));
    }
    Ok(u16::from_be_bytes([data[1], data[2]]))
}
