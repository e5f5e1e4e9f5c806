//! Platform-specific pipe/socket implementation.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! Both families share [`IpcTransport`]; only the [`Connector`] differs.
//! Inbound bytes are pushed by a dedicated reader task into an mpsc channel,
//! outbound frames go through the writer task in [`crate::writer`].
//!
//! # Example
//!
//! ```ignore
//! use rich_presence_ipc::transport::{IpcTransport, Transport, UnixConnector};
//!
//! let transport = IpcTransport::new(UnixConnector::from_env());
//! let mut inbound = transport.open().await?;
//! transport.send(frame_bytes).await?;
//! while let Some(chunk) = inbound.recv().await { /* ... */ }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Inbound, Transport};
use crate::error::{IpcError, Result};
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default size of a single read from the pipe.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Inbound chunks buffered between the reader task and the consumer.
const INBOUND_CAPACITY: usize = 64;

/// Knows the candidate addresses of one platform family and how to dial them.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connected byte stream.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Addresses to probe, in order.
    fn candidates(&self) -> Vec<PathBuf>;

    /// Dial one address.
    async fn connect(&self, address: &Path) -> io::Result<Self::Stream>;
}

/// A live connection: writer handle plus the two background tasks.
struct Link {
    address: PathBuf,
    writer: WriterHandle,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

/// Stream transport over whichever [`Connector`] the platform provides.
pub struct IpcTransport<C: Connector> {
    connector: C,
    read_buffer_size: usize,
    link: Mutex<Option<Link>>,
}

impl<C: Connector> IpcTransport<C> {
    /// Create a transport with default read size.
    pub fn new(connector: C) -> Self {
        Self::with_read_buffer_size(connector, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Create a transport reading at most `read_buffer_size` bytes per chunk.
    pub fn with_read_buffer_size(connector: C, read_buffer_size: usize) -> Self {
        Self {
            connector,
            read_buffer_size: read_buffer_size.max(1),
            link: Mutex::new(None),
        }
    }

    /// Address of the current connection, if open.
    pub fn address(&self) -> Option<PathBuf> {
        self.link.lock().as_ref().map(|l| l.address.clone())
    }

    /// Try each candidate in order; first success wins.
    async fn probe(&self) -> Result<(C::Stream, PathBuf)> {
        for address in self.connector.candidates() {
            match self.connector.connect(&address).await {
                Ok(stream) => return Ok((stream, address)),
                Err(e) => {
                    tracing::debug!(address = %address.display(), error = %e, "IPC address unavailable");
                }
            }
        }
        Err(IpcError::NotRunning)
    }
}

#[async_trait]
impl<C: Connector> Transport for IpcTransport<C> {
    async fn open(&self) -> Result<Inbound> {
        if self.link.lock().is_some() {
            return Err(IpcError::State("transport already open".to_string()));
        }

        let (stream, address) = self.probe().await?;
        let (read_half, write_half) = tokio::io::split(stream);

        let (writer, writer_task) = spawn_writer_task(write_half, DEFAULT_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let reader_task = tokio::spawn(read_loop(read_half, tx, self.read_buffer_size));

        tracing::info!(address = %address.display(), "Connected to IPC host");

        let previous = self.link.lock().replace(Link {
            address,
            writer,
            reader_task,
            writer_task,
        });
        if let Some(stale) = previous {
            stale.shutdown();
        }

        Ok(rx)
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        let writer = self
            .link
            .lock()
            .as_ref()
            .map(|l| l.writer.clone())
            .ok_or(IpcError::ConnectionClosed)?;
        writer.send(frame).await
    }

    async fn close(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            tracing::debug!(address = %link.address.display(), "Closing IPC transport");
            link.shutdown();
        }
    }

    fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }
}

impl Link {
    fn shutdown(self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl<C: Connector> Drop for IpcTransport<C> {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.shutdown();
        }
    }
}

/// Relay raw chunks until EOF, a read error, or the consumer goes away.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("IPC host closed the stream");
                break;
            }
            Ok(n) => {
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use tokio::net::UnixStream;

    use crate::transport::address::socket_candidates_from_env;

    /// Dials `{runtime dir}/discord-ipc-N`.
    #[derive(Debug, Clone)]
    pub struct UnixConnector {
        candidates: Vec<PathBuf>,
    }

    impl UnixConnector {
        /// Resolve candidates from the process environment.
        pub fn from_env() -> Self {
            Self {
                candidates: socket_candidates_from_env(),
            }
        }

        /// Probe an explicit list of socket paths.
        pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
            Self { candidates }
        }
    }

    impl Default for UnixConnector {
        fn default() -> Self {
            Self::from_env()
        }
    }

    #[async_trait]
    impl Connector for UnixConnector {
        type Stream = UnixStream;

        fn candidates(&self) -> Vec<PathBuf> {
            self.candidates.clone()
        }

        async fn connect(&self, address: &Path) -> io::Result<UnixStream> {
            UnixStream::connect(address).await
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient};

    use crate::transport::address::pipe_candidates;

    /// Dials `\\.\pipe\discord-ipc-N`.
    #[derive(Debug, Clone, Default)]
    pub struct NamedPipeConnector;

    #[async_trait]
    impl Connector for NamedPipeConnector {
        type Stream = NamedPipeClient;

        fn candidates(&self) -> Vec<PathBuf> {
            pipe_candidates()
        }

        async fn connect(&self, address: &Path) -> io::Result<NamedPipeClient> {
            ClientOptions::new().open(address)
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::UnixConnector;

#[cfg(windows)]
pub use windows_impl::NamedPipeConnector;
