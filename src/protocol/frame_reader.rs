//! One-frame-at-a-time reader over an async byte stream.
//!
//! Reads exactly the 4-byte length prefix, then exactly the declared
//! remainder. A short read is never surfaced as a frame; the caller
//! suspends until the full frame is available. EOF at any point maps to
//! `ConnectionClosed`.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{RconError, Result};

use super::packet::Packet;
use super::wire_format::{self, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};

/// Extracts length-prefixed frames from a continuous byte stream,
/// independent of their content.
pub struct FrameReader<R> {
    stream: R,
    max_frame_size: usize,
    /// Scratch buffer reused across frames.
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame-size ceiling.
    pub fn new(stream: R) -> Self {
        Self::with_max_frame_size(stream, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reader with a custom frame-size ceiling.
    pub fn with_max_frame_size(stream: R, max_frame_size: usize) -> Self {
        Self {
            stream,
            max_frame_size,
            buf: BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 4096),
        }
    }

    /// Read one complete frame and decode it.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the stream ends before a full frame is
    /// read, `MalformedPacket` if the declared length is invalid or the
    /// frame fails to decode.
    pub async fn read_frame(&mut self) -> Result<Packet> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        self.stream.read_exact(&mut prefix).await.map_err(map_eof)?;

        let length = i32::from_le_bytes(prefix);
        let remainder = wire_format::check_declared_length(length, self.max_frame_size)?;

        let total = LENGTH_PREFIX_SIZE + remainder;
        self.buf.clear();
        self.buf.resize(total, 0);
        self.buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&prefix);
        self.stream
            .read_exact(&mut self.buf[LENGTH_PREFIX_SIZE..])
            .await
            .map_err(map_eof)?;

        wire_format::decode(&self.buf)
    }
}

/// A stream ending mid-frame is a closed connection, not an I/O fault.
fn map_eof(e: std::io::Error) -> RconError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        RconError::ConnectionClosed
    } else {
        RconError::Io(e)
    }
}
