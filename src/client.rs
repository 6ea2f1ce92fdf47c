//! RCON client: connection lifecycle, read-dispatch loop, command execution.
//!
//! [`RconClient`] manages one TCP session:
//! 1. Connect and split the stream
//! 2. Spawn the writer task and the read-dispatch loop
//! 3. Authenticate once
//! 4. Execute commands, each correlated by an id pair
//!
//! Responses longer than one frame arrive as multiple fragments sharing
//! the request's id. After the first fragment the read loop sends an
//! empty probe carrying the pair's second id; because the server
//! answers requests in order, the probe's echo marks end-of-response.
//!
//! # Example
//!
//! ```ignore
//! use rcon_client::RconClient;
//!
//! #[tokio::main]
//! async fn main() -> rcon_client::Result<()> {
//!     let client = RconClient::connect("127.0.0.1:27015").await?;
//!     client.authenticate("password").await?;
//!     let players = client.exec("ListPlayers").await?;
//!     println!("{players}");
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;

use crate::correlation::{CorrelationTable, Dispatch};
use crate::error::{RconError, Result};
use crate::protocol::{wire_format, FrameReader, Packet, PacketKind, DEFAULT_MAX_FRAME_SIZE};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stream being opened.
    Connecting,
    /// Stream open, handshake not yet completed.
    Authenticating,
    /// Handshake completed; commands flow.
    Ready,
    /// Closed explicitly or by stream error. Terminal.
    Closed,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline applied to every `authenticate`/`exec` call. `None`
    /// waits for the server indefinitely; a hung peer then stalls the
    /// caller, so setting a deadline is advisable.
    pub command_timeout: Option<Duration>,
    /// Ceiling for a single incoming frame.
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// State shared between callers and the read loop.
struct Shared {
    table: Mutex<CorrelationTable>,
    state: Mutex<SessionState>,
    /// Monotonically increasing; each request takes two ids. Wraps are
    /// out of scope for a session's lifetime.
    next_id: AtomicI32,
}

impl Shared {
    fn new() -> Self {
        Self {
            table: Mutex::new(CorrelationTable::new()),
            state: Mutex::new(SessionState::Connecting),
            next_id: AtomicI32::new(0),
        }
    }
}

/// One RCON session over TCP.
///
/// All methods take `&self`; `exec` may be called from multiple tasks
/// concurrently, each resolving with exactly the response correlated to
/// its own id pair.
pub struct RconClient {
    shared: Arc<Shared>,
    writer: WriterHandle,
    config: Config,
    read_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl RconClient {
    /// Connect with default configuration.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with(addr, Config::default()).await
    }

    /// Open the stream and start the background read-dispatch loop.
    ///
    /// Returns once the stream is open; authentication is a separate
    /// explicit step.
    pub async fn connect_with(addr: impl ToSocketAddrs, config: Config) -> Result<Self> {
        let shared = Arc::new(Shared::new());

        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let (writer, writer_task) = spawn_writer_task(write_half);
        let reader = FrameReader::with_max_frame_size(read_half, config.max_frame_size);
        let read_task = tokio::spawn(read_loop(reader, shared.clone(), writer.clone()));

        *shared.state.lock() = SessionState::Authenticating;
        Ok(Self {
            shared,
            writer,
            config,
            read_task,
            writer_task,
        })
    }

    /// Authenticate with the server's password.
    ///
    /// Returning `Ok(())` is the readiness notification: the session is
    /// `Ready` and commands may flow. A server that denies the password
    /// echoes id `-1`, surfaced here as [`RconError::AuthFailed`].
    pub async fn authenticate(&self, password: &str) -> Result<()> {
        self.request(
            PacketKind::Auth,
            password,
            true,
            self.config.command_timeout,
        )
        .await?;
        *self.shared.state.lock() = SessionState::Ready;
        tracing::debug!("authenticated, session ready");
        Ok(())
    }

    /// Execute a command and return the full response body.
    ///
    /// Fragmented responses are reassembled in arrival order; the call
    /// suspends until the response is complete, the configured deadline
    /// elapses, or the session closes.
    pub async fn exec(&self, command: &str) -> Result<String> {
        self.exec_inner(command, self.config.command_timeout).await
    }

    /// Execute a command with a per-call deadline overriding the
    /// configured one.
    pub async fn exec_with_timeout(&self, command: &str, deadline: Duration) -> Result<String> {
        self.exec_inner(command, Some(deadline)).await
    }

    async fn exec_inner(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        if !self.is_authenticated() {
            // Permitted; the server rejects commands it does not accept.
            tracing::debug!("exec issued before authentication completed");
        }
        self.request(PacketKind::ExecCommand, command, false, timeout)
            .await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Whether the auth handshake has completed.
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Close the session. Every pending `exec`/`authenticate` caller is
    /// unblocked with `ConnectionClosed`. Idempotent; also runs on drop.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        self.read_task.abort();
        self.writer_task.abort();
        self.shared.table.lock().fail_all();
        tracing::debug!("session closed");
    }

    /// Allocate an id pair, register the entry, send the request, and
    /// await the correlated response.
    async fn request(
        &self,
        kind: PacketKind,
        body: &str,
        is_auth: bool,
        timeout: Option<Duration>,
    ) -> Result<String> {
        if self.state() == SessionState::Closed {
            return Err(RconError::ConnectionClosed);
        }

        let primary_id = self.shared.next_id.fetch_add(2, Ordering::Relaxed);
        let sentinel_id = primary_id + 1;

        // Reject bad bodies before touching the table or the wire.
        let packet = Packet::new(primary_id, kind, body);
        let encoded = wire_format::encode(&packet)?;

        let rx = self
            .shared
            .table
            .lock()
            .register(primary_id, sentinel_id, is_auth)?;

        if let Err(e) = self.writer.send(OutboundFrame::new(encoded)).await {
            self.shared.table.lock().cancel(primary_id);
            return Err(e);
        }

        let completed = match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(done) => done,
                Err(_) => {
                    self.shared.table.lock().cancel(primary_id);
                    return Err(RconError::Timeout);
                }
            },
            None => rx.await,
        };
        // A dropped sender without a value means the table was torn down.
        completed.map_err(|_| RconError::ConnectionClosed)?
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background read-dispatch loop: frame reader -> decode -> correlation
/// table. The only path that mutates entries in response to peer data.
async fn read_loop<R>(mut reader: FrameReader<R>, shared: Arc<Shared>, writer: WriterHandle)
where
    R: AsyncRead + Unpin,
{
    loop {
        let packet = match reader.read_frame().await {
            Ok(packet) => packet,
            Err(RconError::ConnectionClosed) => {
                tracing::debug!("peer closed the stream");
                break;
            }
            Err(e) => {
                tracing::error!("read loop error: {}", e);
                break;
            }
        };

        let id = packet.id;
        let outcome = shared.table.lock().dispatch(packet);
        match outcome {
            Dispatch::Ignored => {
                tracing::debug!(id, "dropping frame with no pending entry");
            }
            Dispatch::Fragment {
                send_sentinel: Some(sentinel_id),
            } => {
                // First fragment for this entry: probe for end-of-response.
                // The probe trails the real request on the wire, so its
                // echo cannot arrive before the remaining fragments.
                let frame = match wire_format::encode(&Packet::sentinel(sentinel_id)) {
                    Ok(encoded) => OutboundFrame::new(encoded),
                    Err(e) => {
                        tracing::error!("sentinel probe encoding failed: {}", e);
                        break;
                    }
                };
                if writer.send(frame).await.is_err() {
                    break;
                }
                tracing::debug!(sentinel_id, "sent end-of-response probe");
            }
            Dispatch::Fragment { send_sentinel: None } | Dispatch::Completed => {}
        }
    }

    // Stream gone: retire the session and unblock every pending caller.
    *shared.state.lock() = SessionState::Closed;
    let mut table = shared.table.lock();
    if !table.is_empty() {
        tracing::debug!(pending = table.len(), "failing pending entries");
    }
    table.fail_all();
}
