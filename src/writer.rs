//! Dedicated writer task for outgoing frames.
//!
//! Every frame leaves through one task fed by an mpsc channel, so
//! concurrent `exec` callers and the read loop's sentinel probes never
//! interleave bytes on the wire. Interleaved writes from two tasks
//! would corrupt framing for every in-flight request.
//!
//! ```text
//! exec caller ──┐
//! auth caller ──┼─► mpsc::Sender<OutboundFrame> ─► writer task ─► TCP
//! read loop   ──┘   (sentinel probes)
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RconError, Result};

/// Channel capacity; request frames are small and infrequent.
const CHANNEL_CAPACITY: usize = 64;

/// A fully encoded frame queued for the wire.
#[derive(Debug)]
pub(crate) struct OutboundFrame(pub Bytes);

impl OutboundFrame {
    pub fn new(encoded: Vec<u8>) -> Self {
        Self(Bytes::from(encoded))
    }
}

/// Handle for queueing frames onto the writer task.
///
/// Cheaply cloneable; held by the client and by the read loop.
#[derive(Clone)]
pub(crate) struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue one frame. Fails with `ConnectionClosed` once the writer
    /// task has exited.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| RconError::ConnectionClosed)
    }
}

/// Spawn the writer task owning the stream's write half.
pub(crate) fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Receives frames and writes each one whole, in queue order.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        writer.write_all(&frame.0).await?;
        // Coalesce the flush when more frames are already queued.
        while let Ok(next) = rx.try_recv() {
            writer.write_all(&next.0).await?;
        }
        writer.flush().await?;
    }
    // Channel closed: all handles dropped, clean shutdown.
    Ok(())
}
