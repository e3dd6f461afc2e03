//! SICP frame encoder/decoder.
//!
//! Displays speaking SICP (Serial/IP Control Protocol) over LAN exchange
//! small checksummed binary frames. This module handles the pure
//! byte-level encoding of outbound commands and the incremental decoding of
//! inbound frames from a stream buffer.
//!
//! # Frame format
//!
//! ```text
//! outbound: 0xA6 <id> 0x00 0x00 0x00 <len> 0x01 <cmd> [<param>...] <xor>
//! inbound:  0x21 <id> <x>  <x>  <len> 0x01 <cmd> [<param>...] <xor>
//! ```
//!
//! - `id`: monitor ID of the addressed display
//! - `len`: number of bytes following the length field (frame type, command
//!   code, parameters and checksum)
//! - `0x01`: frame type, always 1
//! - `xor`: XOR of every preceding byte
//!
//! Inbound frames carry one byte less of header, so a reply frame is
//! `5 + len` bytes long.

use std::fmt;

use bytes::{BufMut, BytesMut};
use neovolib_core::{Error, Frame, Result};

/// First byte of every frame sent to the display.
pub const OUTBOUND_MARKER: u8 = 0xA6;

/// First byte of every frame sent by the display.
pub const INBOUND_MARKER: u8 = 0x21;

/// Frame type byte. The protocol defines no other value.
pub const FRAME_TYPE: u8 = 0x01;

/// Leading data byte of a generic acknowledgement.
pub const ACK: u8 = 0x00;

/// Largest parameter block accepted by [`encode_frame`].
///
/// Keeps the length byte within range with headroom for the command code,
/// frame type and checksum.
pub const MAX_PARAMS: usize = 250;

/// Largest data field (command code plus parameters) an inbound frame can
/// carry: the length byte also counts the frame type and checksum.
pub const MAX_REPLY_DATA: usize = u8::MAX as usize - 2;

/// Inbound header length up to and including the length byte.
const INBOUND_HEADER: usize = 5;

/// Encode a command into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use neovolib_sicp::frame::encode_frame;
///
/// // Power state query for monitor 1.
/// let bytes = encode_frame(0x01, 0x19, &[]).unwrap();
/// assert_eq!(bytes, vec![0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC]);
/// ```
pub fn encode_frame(monitor_id: u8, command: u8, params: &[u8]) -> Result<Vec<u8>> {
    if params.len() > MAX_PARAMS {
        return Err(Error::InvalidParameter(format!(
            "too many parameters for command 0x{command:02X}: {} (max {MAX_PARAMS})",
            params.len()
        )));
    }

    // frame type + command code + params + checksum
    let len = (params.len() + 3) as u8;
    let mut buf = BytesMut::with_capacity(6 + len as usize);
    buf.put_u8(OUTBOUND_MARKER);
    buf.put_u8(monitor_id);
    buf.put_u8(0x00);
    buf.put_u8(0x00);
    buf.put_u8(0x00);
    buf.put_u8(len);
    buf.put_u8(FRAME_TYPE);
    buf.put_u8(command);
    buf.put_slice(params);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    Ok(buf.to_vec())
}

/// XOR of every byte in `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| acc ^ b)
}

/// Why a complete inbound frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    /// The trailing byte does not match the XOR of the frame.
    Checksum {
        /// XOR of the received header and data.
        expected: u8,
        /// Checksum byte actually received.
        actual: u8,
    },
    /// The frame-type byte is not [`FRAME_TYPE`].
    FrameType(u8),
    /// The length byte is too small to hold a frame type and checksum.
    Length(u8),
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::Checksum { expected, actual } => write!(
                f,
                "checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}"
            ),
            FrameFault::FrameType(byte) => write!(f, "unexpected frame type 0x{byte:02X}"),
            FrameFault::Length(len) => write!(f, "length byte {len} too short"),
        }
    }
}

impl From<FrameFault> for Error {
    fn from(fault: FrameFault) -> Self {
        Error::MalformedFrame(fault.to_string())
    }
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete, valid frame. The `usize` is the number of bytes consumed
    /// from the start of the buffer.
    Frame(Frame, usize),

    /// The buffer does not yet contain a complete frame.
    Incomplete,

    /// A complete frame failed validation. The `usize` is the number of
    /// bytes to discard.
    Malformed(FrameFault, usize),

    /// Bytes before the next inbound marker (or the whole buffer, if there
    /// is none). The `usize` is the number of bytes to discard.
    Garbage(usize),
}

/// Attempt to decode one inbound frame from the start of `buf`.
///
/// Callers drain the consumed span and call again until
/// [`DecodeResult::Incomplete`] is returned; this handles both frames split
/// across reads and several frames arriving in one read.
///
/// # Example
///
/// ```
/// use neovolib_sicp::frame::{decode_frame, DecodeResult};
///
/// // "Power is on" reply from monitor 1.
/// let buf = [0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E];
/// match decode_frame(&buf) {
///     DecodeResult::Frame(frame, consumed) => {
///         assert_eq!(frame.data, vec![0x19, 0x02]);
///         assert_eq!(consumed, 9);
///     }
///     other => panic!("expected a frame, got {other:?}"),
/// }
/// ```
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    let start = match buf.iter().position(|&b| b == INBOUND_MARKER) {
        Some(pos) => pos,
        None if buf.is_empty() => return DecodeResult::Incomplete,
        None => return DecodeResult::Garbage(buf.len()),
    };
    if start > 0 {
        return DecodeResult::Garbage(start);
    }

    if buf.len() < INBOUND_HEADER + 1 {
        return DecodeResult::Incomplete;
    }

    let len = buf[4];
    if len < 2 {
        // Drop the marker only, so a real frame hiding behind it is found.
        return DecodeResult::Malformed(FrameFault::Length(len), 1);
    }

    let total = INBOUND_HEADER + len as usize;
    if buf.len() < total {
        return DecodeResult::Incomplete;
    }

    let expected = checksum(&buf[..total - 1]);
    let actual = buf[total - 1];
    if expected != actual {
        return DecodeResult::Malformed(FrameFault::Checksum { expected, actual }, total);
    }

    if buf[5] != FRAME_TYPE {
        return DecodeResult::Malformed(FrameFault::FrameType(buf[5]), total);
    }

    let frame = Frame {
        monitor_id: buf[1],
        data: buf[INBOUND_HEADER + 1..total - 1].to_vec(),
    };
    DecodeResult::Frame(frame, total)
}

/// Build a complete inbound frame as a display would send it.
///
/// Used by tests and mock servers to produce valid replies. Fails with
/// [`Error::InvalidParameter`] when `data` exceeds [`MAX_REPLY_DATA`].
pub fn encode_reply(monitor_id: u8, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_REPLY_DATA {
        return Err(Error::InvalidParameter(format!(
            "reply data too long: {} bytes (max {MAX_REPLY_DATA})",
            data.len()
        )));
    }

    let mut buf = Vec::with_capacity(INBOUND_HEADER + data.len() + 2);
    buf.extend_from_slice(&[INBOUND_MARKER, monitor_id, 0x00, 0x00]);
    buf.push((data.len() + 2) as u8);
    buf.push(FRAME_TYPE);
    buf.extend_from_slice(data);
    buf.push(checksum(&buf));
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWER_GET: [u8; 9] = [0xA6, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x19, 0xBC];
    const POWER_ON_REPLY: [u8; 9] = [0x21, 0x01, 0x00, 0x00, 0x04, 0x01, 0x19, 0x02, 0x3E];

    /// Decode every frame in `stream`, feeding it in chunks of `chunk` bytes.
    fn decode_stream(stream: &[u8], chunk: usize) -> (Vec<Frame>, usize) {
        let mut buf = Vec::new();
        let mut frames = Vec::new();
        let mut faults = 0;
        for piece in stream.chunks(chunk) {
            buf.extend_from_slice(piece);
            loop {
                match decode_frame(&buf) {
                    DecodeResult::Frame(frame, n) => {
                        frames.push(frame);
                        buf.drain(..n);
                    }
                    DecodeResult::Malformed(_, n) => {
                        faults += 1;
                        buf.drain(..n);
                    }
                    DecodeResult::Garbage(n) => {
                        buf.drain(..n);
                    }
                    DecodeResult::Incomplete => break,
                }
            }
        }
        (frames, faults)
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_power_get() {
        assert_eq!(encode_frame(0x01, 0x19, &[]).unwrap(), POWER_GET);
    }

    #[test]
    fn encode_power_set_on() {
        let bytes = encode_frame(0x01, 0x18, &[0x02]).unwrap();
        assert_eq!(
            bytes,
            vec![0xA6, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x18, 0x02, 0xB8]
        );
    }

    #[test]
    fn encode_length_and_checksum() {
        let bytes = encode_frame(0x07, 0xAC, &[0x0D, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(bytes.len(), 6 + 7);
        assert_eq!(bytes[1], 0x07);
        assert_eq!(bytes[5], 7);
        assert_eq!(*bytes.last().unwrap(), checksum(&bytes[..bytes.len() - 1]));
        assert_eq!(checksum(&bytes), 0);
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode_frame(0x01, 0x44, &[0x20, 0x20]).unwrap();
        let b = encode_frame(0x01, 0x44, &[0x20, 0x20]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn encode_rejects_oversized_params() {
        let params = vec![0u8; MAX_PARAMS + 1];
        assert!(matches!(
            encode_frame(0x01, 0x18, &params),
            Err(Error::InvalidParameter(_))
        ));
        assert!(encode_frame(0x01, 0x18, &params[..MAX_PARAMS]).is_ok());
    }

    #[test]
    fn checksum_is_xor_fold() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xA6, 0x01]), 0xA7);
        assert_eq!(checksum(&POWER_GET[..8]), 0xBC);
    }

    // ---------------------------------------------------------------
    // Decoding
    // ---------------------------------------------------------------

    #[test]
    fn decode_power_on_reply() {
        match decode_frame(&POWER_ON_REPLY) {
            DecodeResult::Frame(frame, consumed) => {
                assert_eq!(frame.monitor_id, 1);
                assert_eq!(frame.data, vec![0x19, 0x02]);
                assert_eq!(consumed, 9);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn decode_ignores_reserved_header_bytes() {
        let mut reply = POWER_ON_REPLY;
        reply[2] = 0x55;
        reply[3] = 0xAA;
        reply[8] = checksum(&reply[..8]);
        assert!(matches!(decode_frame(&reply), DecodeResult::Frame(_, 9)));
    }

    #[test]
    fn encode_reply_round_trip() {
        let data = [0xA1, b'P', b'N', b'-', b'5', b'5', 0x00];
        let bytes = encode_reply(0x03, &data).unwrap();
        match decode_frame(&bytes) {
            DecodeResult::Frame(frame, consumed) => {
                assert_eq!(frame.monitor_id, 3);
                assert_eq!(frame.data, data);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert_eq!(encode_reply(0x01, &[0x19, 0x02]).unwrap(), POWER_ON_REPLY);
    }

    #[test]
    fn every_payload_length_and_monitor_id_survives_decoding() {
        for monitor_id in [0x00, 0x01, 0xFF] {
            for n in 0..=MAX_PARAMS {
                let params: Vec<u8> = (0..n)
                    .map(|i| (i as u8).wrapping_mul(37) ^ monitor_id)
                    .collect();

                let outbound = encode_frame(monitor_id, 0x19, &params).unwrap();
                assert_eq!(
                    outbound.len(),
                    6 + outbound[5] as usize,
                    "len={n} id={monitor_id}"
                );
                assert_eq!(checksum(&outbound), 0);

                let bytes = encode_reply(monitor_id, &params).unwrap();
                match decode_frame(&bytes) {
                    DecodeResult::Frame(frame, consumed) => {
                        assert_eq!(frame.monitor_id, monitor_id);
                        assert_eq!(frame.data, params, "len={n} id={monitor_id}");
                        assert_eq!(consumed, bytes.len());
                    }
                    other => panic!("len={n} id={monitor_id}: expected frame, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let params = vec![0u8; MAX_PARAMS + 1];
        assert!(matches!(
            encode_frame(0x01, 0x19, &params),
            Err(Error::InvalidParameter(_))
        ));

        let longest = vec![0x42; MAX_REPLY_DATA];
        let bytes = encode_reply(0x01, &longest).unwrap();
        assert_eq!(bytes[4], 0xFF);
        assert!(matches!(decode_frame(&bytes), DecodeResult::Frame(_, 260)));

        let too_long = vec![0x42; MAX_REPLY_DATA + 1];
        assert!(matches!(
            encode_reply(0x01, &too_long),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn decode_empty_buffer_is_incomplete() {
        assert_eq!(decode_frame(&[]), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_partial_header_is_incomplete() {
        for n in 1..6 {
            assert_eq!(decode_frame(&POWER_ON_REPLY[..n]), DecodeResult::Incomplete);
        }
    }

    #[test]
    fn decode_partial_body_is_incomplete() {
        for n in 6..POWER_ON_REPLY.len() {
            assert_eq!(decode_frame(&POWER_ON_REPLY[..n]), DecodeResult::Incomplete);
        }
    }

    #[test]
    fn decode_no_marker_discards_everything() {
        assert_eq!(decode_frame(&[0x00, 0xFF, 0x13]), DecodeResult::Garbage(3));
    }

    #[test]
    fn decode_skips_leading_noise() {
        let mut buf = vec![0xFF, 0x00, 0x42];
        buf.extend_from_slice(&POWER_ON_REPLY);
        assert_eq!(decode_frame(&buf), DecodeResult::Garbage(3));
        assert!(matches!(decode_frame(&buf[3..]), DecodeResult::Frame(_, 9)));
    }

    #[test]
    fn decode_rejects_every_single_bit_flip() {
        // Marker and length bytes are excluded: flipping those changes where
        // the frame starts or ends rather than its contents.
        for index in [1usize, 2, 3, 5, 6, 7, 8] {
            for bit in 0..8 {
                let mut corrupted = POWER_ON_REPLY;
                corrupted[index] ^= 1 << bit;
                match decode_frame(&corrupted) {
                    DecodeResult::Malformed(FrameFault::Checksum { .. }, 9) => {}
                    other => panic!("byte {index} bit {bit}: expected checksum fault, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn decode_rejects_wrong_frame_type() {
        let mut reply = POWER_ON_REPLY;
        reply[5] = 0x02;
        reply[8] = checksum(&reply[..8]);
        assert_eq!(
            decode_frame(&reply),
            DecodeResult::Malformed(FrameFault::FrameType(0x02), 9)
        );
    }

    #[test]
    fn decode_rejects_short_length_byte() {
        let buf = [0x21, 0x01, 0x00, 0x00, 0x01, 0x01, 0x21];
        assert_eq!(
            decode_frame(&buf),
            DecodeResult::Malformed(FrameFault::Length(1), 1)
        );
    }

    #[test]
    fn split_at_every_boundary() {
        let mut stream = POWER_ON_REPLY.to_vec();
        stream.extend_from_slice(&encode_reply(0x01, &[0x45, 0x20, 0x30]).unwrap());
        for split in 1..stream.len() {
            let mut buf = Vec::new();
            let mut frames = Vec::new();
            for part in [&stream[..split], &stream[split..]] {
                buf.extend_from_slice(part);
                while let DecodeResult::Frame(frame, n) = decode_frame(&buf) {
                    frames.push(frame);
                    buf.drain(..n);
                }
            }
            assert_eq!(frames.len(), 2, "split at {split}");
            assert_eq!(frames[0].data, vec![0x19, 0x02]);
            assert_eq!(frames[1].data, vec![0x45, 0x20, 0x30]);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let (frames, faults) = decode_stream(&POWER_ON_REPLY, 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(faults, 0);
        assert_eq!(frames[0].data, vec![0x19, 0x02]);
    }

    #[test]
    fn coalesced_frames_in_order() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_reply(0x01, &[0x19, 0x02]).unwrap());
        stream.extend_from_slice(&encode_reply(0x01, &[0x00, 0x00]).unwrap());
        stream.extend_from_slice(&encode_reply(0x01, &[0x0F, 0x02, 0x01, 0x2C]).unwrap());

        let (frames, faults) = decode_stream(&stream, stream.len());
        assert_eq!(faults, 0);
        let data: Vec<_> = frames.iter().map(|f| f.data.clone()).collect();
        assert_eq!(
            data,
            vec![
                vec![0x19, 0x02],
                vec![0x00, 0x00],
                vec![0x0F, 0x02, 0x01, 0x2C],
            ]
        );
    }

    #[test]
    fn corrupt_frame_between_good_ones_is_skipped() {
        let mut bad = encode_reply(0x01, &[0x45, 0x10, 0x10]).unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut stream = vec![0x99, 0x98];
        stream.extend_from_slice(&POWER_ON_REPLY);
        stream.extend_from_slice(&bad);
        stream.extend_from_slice(&POWER_ON_REPLY);

        for chunk in [1, 3, 7, stream.len()] {
            let (frames, faults) = decode_stream(&stream, chunk);
            assert_eq!(frames.len(), 2, "chunk size {chunk}");
            assert_eq!(faults, 1, "chunk size {chunk}");
        }
    }

    #[test]
    fn frame_fault_converts_to_malformed_error() {
        let err: Error = FrameFault::Checksum {
            expected: 0x3E,
            actual: 0x3F,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "malformed frame: checksum mismatch: expected 0x3E, got 0x3F"
        );
    }
}
