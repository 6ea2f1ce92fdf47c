//! Error types for the RCON client.

use thiserror::Error;

/// Main error type for all RCON operations.
#[derive(Debug, Error)]
pub enum RconError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream ended or the session was closed while an operation was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Structural violation while decoding a frame. Fatal to the session:
    /// the read loop stops and every pending call fails.
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// Outgoing body rejected before any bytes were sent. The session
    /// remains usable.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A correlation id was registered twice. Indicates an id counter bug;
    /// must not happen under sequential allocation.
    #[error("Duplicate correlation id: {0}")]
    DuplicateId(i32),

    /// The server rejected the password.
    #[error("Authentication failed")]
    AuthFailed,

    /// A per-call deadline elapsed before the response completed.
    #[error("Command timed out")]
    Timeout,
}

/// Result type alias using RconError.
pub type Result<T> = std::result::Result<T, RconError>;
