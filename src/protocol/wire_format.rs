//! Wire format encoding and decoding.
//!
//! Frame layout:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────┬────────────┐
//! │ Length   │ Id       │ Kind     │ Body         │ 0x00 0x00  │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │ ASCII text   │ NUL + pad  │
//! │ i32 LE   │ i32 LE   │ i32 LE   │              │            │
//! └──────────┴──────────┴──────────┴──────────────┴────────────┘
//! ```
//!
//! All integers are Little Endian regardless of host byte order.
//! `Length` counts everything after itself: `4 + 4 + body + 2`.

use crate::error::{RconError, Result};

use super::packet::{Packet, PacketKind};

/// Bytes of a frame that are not body: id, kind, trailing NUL and pad.
pub const FRAME_OVERHEAD: usize = 10;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Conventional ceiling for an outgoing request frame, prefix included.
pub const MAX_REQUEST_FRAME_SIZE: usize = 4096;

/// Default ceiling for a single incoming frame. Bounds the allocation a
/// corrupt length prefix can trigger; responses larger than one frame
/// arrive split across multiple frames sharing one id.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Encode a packet to its wire representation.
///
/// # Errors
///
/// `Encoding` if the body contains non-ASCII or NUL bytes, or if the
/// encoded frame would exceed [`MAX_REQUEST_FRAME_SIZE`].
pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    let body = packet.body.as_bytes();
    if let Some(b) = body.iter().find(|&&b| b == 0 || b > 0x7f) {
        return Err(RconError::Encoding(format!(
            "body contains invalid byte 0x{b:02x} (ASCII only, no NUL)"
        )));
    }

    let length = FRAME_OVERHEAD + body.len();
    let total = LENGTH_PREFIX_SIZE + length;
    if total > MAX_REQUEST_FRAME_SIZE {
        return Err(RconError::Encoding(format!(
            "frame of {total} bytes exceeds request ceiling {MAX_REQUEST_FRAME_SIZE}"
        )));
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&(length as i32).to_le_bytes());
    buf.extend_from_slice(&packet.id.to_le_bytes());
    buf.extend_from_slice(&packet.kind.wire_value().to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(&[0x00, 0x00]);
    Ok(buf)
}

/// Decode one complete frame, length prefix included.
///
/// # Errors
///
/// `MalformedPacket` if the declared length implies a negative body,
/// fewer bytes are available than declared, the kind value is unknown,
/// or the body is not ASCII.
pub fn decode(buf: &[u8]) -> Result<Packet> {
    if buf.len() < LENGTH_PREFIX_SIZE + FRAME_OVERHEAD {
        return Err(RconError::MalformedPacket(format!(
            "frame of {} bytes is shorter than the {} byte minimum",
            buf.len(),
            LENGTH_PREFIX_SIZE + FRAME_OVERHEAD
        )));
    }

    let length = read_i32(&buf[0..4]);
    let remainder = declared_remainder(length, buf.len() - LENGTH_PREFIX_SIZE)?;

    let id = read_i32(&buf[4..8]);
    let kind_value = read_i32(&buf[8..12]);
    let kind = PacketKind::from_wire(kind_value).ok_or_else(|| {
        RconError::MalformedPacket(format!("unknown packet kind {kind_value}"))
    })?;

    let body_len = remainder - FRAME_OVERHEAD;
    let body_bytes = &buf[12..12 + body_len];
    if body_bytes.iter().any(|&b| b == 0 || b > 0x7f) {
        return Err(RconError::MalformedPacket(
            "body contains non-ASCII or NUL bytes".to_string(),
        ));
    }
    let body = std::str::from_utf8(body_bytes)
        .map_err(|e| RconError::MalformedPacket(format!("body is not valid text: {e}")))?
        .to_string();

    // The final two pad bytes are discarded.
    Ok(Packet { id, kind, body })
}

/// Validate a declared length against the bytes actually available.
///
/// Returns the frame remainder (everything after the length prefix) as
/// a usize the reader can `read_exact`.
pub(crate) fn declared_remainder(length: i32, available: usize) -> Result<usize> {
    if length < FRAME_OVERHEAD as i32 {
        return Err(RconError::MalformedPacket(format!(
            "declared length {length} implies a negative body"
        )));
    }
    let remainder = length as usize;
    if remainder > available {
        return Err(RconError::MalformedPacket(format!(
            "frame truncated: {available} of {remainder} declared bytes available"
        )));
    }
    Ok(remainder)
}

/// Validate a declared length against a frame-size ceiling, before any
/// allocation happens.
pub(crate) fn check_declared_length(length: i32, max_frame_size: usize) -> Result<usize> {
    if length < FRAME_OVERHEAD as i32 {
        return Err(RconError::MalformedPacket(format!(
            "declared length {length} implies a negative body"
        )));
    }
    let total = LENGTH_PREFIX_SIZE + length as usize;
    if total > max_frame_size {
        return Err(RconError::MalformedPacket(format!(
            "declared frame of {total} bytes exceeds ceiling {max_frame_size}"
        )));
    }
    Ok(length as usize)
}

#[inline]
fn read_i32(buf: &[u8]) -> i32 {
    i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
