//! # rcon-client
//!
//! Async client for the RCON remote-administration protocol: connect to
//! a game server over TCP, authenticate once, then execute text
//! commands and receive text responses, with responses that span
//! multiple frames reassembled transparently.
//!
//! ## Architecture
//!
//! - **Packet codec** ([`protocol::wire_format`]): one length-prefixed
//!   binary frame to and from bytes.
//! - **Frame reader** ([`protocol::FrameReader`]): one frame at a time
//!   off the stream, content-agnostic.
//! - **Correlation table**: pending requests keyed by id pair;
//!   fragments accumulate until the sentinel probe's echo arrives.
//! - **Session engine** ([`RconClient`]): background read-dispatch
//!   loop, dedicated writer task, id allocation, auth handshake.
//!
//! ## Example
//!
//! ```ignore
//! use rcon_client::RconClient;
//!
//! #[tokio::main]
//! async fn main() -> rcon_client::Result<()> {
//!     let client = RconClient::connect("127.0.0.1:27015").await?;
//!     client.authenticate("password").await?;
//!     println!("{}", client.exec("ListPlayers").await?);
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;

mod client;
mod correlation;
mod writer;

pub use client::{Config, RconClient, SessionState};
pub use error::{RconError, Result};
