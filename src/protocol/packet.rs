//! Packet struct with kind tags and constructors.
//!
//! # Example
//!
//! ```
//! use rcon_client::protocol::{Packet, PacketKind};
//!
//! let packet = Packet::exec(2, "ListPlayers");
//! assert_eq!(packet.id, 2);
//! assert_eq!(packet.kind, PacketKind::ExecCommand);
//! ```

/// Frame kind tags.
///
/// `ExecCommand` and `AuthResponse` share wire value `2`; which one a
/// received frame means is decided by the request that originated the
/// exchange, never by the wire value itself. The decoder always maps an
/// incoming `2` to `AuthResponse`, since a client only ever *receives*
/// that value in the response direction. The session layer correlates
/// responses purely by id and never branches on a response's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Response fragment, or the empty end-of-response probe.
    ResponseValue,
    /// Command request (outgoing only).
    ExecCommand,
    /// Authentication result (incoming only).
    AuthResponse,
    /// Authentication request carrying the password.
    Auth,
}

impl PacketKind {
    /// The i32 transmitted in the frame's kind field.
    pub fn wire_value(self) -> i32 {
        match self {
            PacketKind::ResponseValue => 0,
            PacketKind::ExecCommand | PacketKind::AuthResponse => 2,
            PacketKind::Auth => 3,
        }
    }

    /// Map a received wire value to a kind tag.
    ///
    /// Returns `None` for values the protocol does not define.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(PacketKind::ResponseValue),
            2 => Some(PacketKind::AuthResponse),
            3 => Some(PacketKind::Auth),
            _ => None,
        }
    }
}

/// A single protocol frame.
///
/// The body is plain ASCII text. The trailing NUL and pad byte are
/// wire-only artifacts and never part of the in-memory body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id. Caller-assigned on requests, echoed by the peer
    /// on every response frame belonging to the exchange.
    pub id: i32,
    /// Kind tag.
    pub kind: PacketKind,
    /// ASCII text payload.
    pub body: String,
}

impl Packet {
    /// Create a packet from parts.
    pub fn new(id: i32, kind: PacketKind, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Authentication request carrying the password as body.
    pub fn auth(id: i32, password: impl Into<String>) -> Self {
        Self::new(id, PacketKind::Auth, password)
    }

    /// Command request.
    pub fn exec(id: i32, command: impl Into<String>) -> Self {
        Self::new(id, PacketKind::ExecCommand, command)
    }

    /// Empty `ResponseValue` probe whose echo marks end-of-response.
    pub fn sentinel(id: i32) -> Self {
        Self::new(id, PacketKind::ResponseValue, "")
    }

    /// Body length in bytes.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
