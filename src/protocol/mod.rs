//! Protocol module - packet model, wire format, and frame reading.
//!
//! The frame layout and the shared kind value for command requests and
//! auth responses are documented in [`wire_format`] and [`PacketKind`].

mod frame_reader;
mod packet;
pub mod wire_format;

pub use frame_reader::FrameReader;
pub use packet::{Packet, PacketKind};
pub use wire_format::{
    decode, encode, DEFAULT_MAX_FRAME_SIZE, FRAME_OVERHEAD, LENGTH_PREFIX_SIZE,
    MAX_REQUEST_FRAME_SIZE,
};
