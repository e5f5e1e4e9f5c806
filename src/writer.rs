//! Dedicated writer task for outbound frames.
//!
//! Every open transport owns one writer task that receives encoded frames via
//! an mpsc channel and writes them one at a time, so two sends can never
//! interleave on the wire.
//!
//! # Architecture
//!
//! ```text
//! set_presence ─┐
//! pong echo    ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Pipe
//! subscribe    ─┘                                      │
//!        ◄──────────── oneshot (flushed / io error) ◄──┘
//! ```
//!
//! [`WriterHandle::send`] resolves only after the frame has been written and
//! flushed.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{IpcError, Result};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// A frame ready to be written to the pipe.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Complete frame (header + payload).
    pub bytes: Bytes,
    /// Completion signal, fired after flush.
    done: oneshot::Sender<std::io::Result<()>>,
}

/// Handle for sending frames to the writer task.
///
/// This is cheaply cloneable.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame and wait until it has been flushed.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the writer task is gone, `Io` if the write
    /// itself failed.
    pub async fn send(&self, bytes: Bytes) -> Result<()> {
        let (done, flushed) = oneshot::channel();

        self.tx
            .send(OutboundFrame { bytes, done })
            .await
            .map_err(|_| IpcError::ConnectionClosed)?;

        flushed.await.map_err(|_| IpcError::ConnectionClosed)??;
        Ok(())
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task exits when every handle is dropped (shutting the write half down)
/// or after the first failed write.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let result = write_frame(&mut writer, &frame.bytes).await;
        let failed = result.is_err();

        // Caller may have given up waiting; the frame is on the wire either way.
        let _ = frame.done.send(result);

        if failed {
            tracing::warn!("Write failed, stopping writer task");
            return Err(IpcError::ConnectionClosed);
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
