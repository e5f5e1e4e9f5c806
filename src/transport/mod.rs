//! Transport module - platform-specific pipe/socket handling.
//!
//! Provides abstraction over:
//! - Unix Domain Sockets (Linux/macOS)
//! - Named Pipes (Windows)
//!
//! The connection state machine only sees the [`Transport`] trait; which
//! family backs it is decided once, by [`default_transport`].

mod address;
mod pipe;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

pub use address::{
    pipe_candidates, socket_candidates, socket_candidates_from_env, socket_dir, CANDIDATE_COUNT,
    FALLBACK_SOCKET_DIR, IPC_PREFIX, SOCKET_DIR_VARS,
};
pub use pipe::{Connector, IpcTransport, DEFAULT_READ_BUFFER_SIZE};

#[cfg(unix)]
pub use pipe::UnixConnector;

#[cfg(windows)]
pub use pipe::NamedPipeConnector;

/// Stream of raw inbound chunks; ends when the transport closes.
pub type Inbound = mpsc::Receiver<std::io::Result<Bytes>>;

/// Byte channel to the host process.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the first reachable candidate address.
    ///
    /// Fails with [`IpcError::NotRunning`](crate::IpcError::NotRunning) when
    /// nothing accepts.
    async fn open(&self) -> Result<Inbound>;

    /// Write one encoded frame; resolves after it is flushed.
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Release the connection. Safe to call repeatedly.
    async fn close(&self);

    /// Whether a connection is currently held.
    fn is_open(&self) -> bool;
}

/// Transport for the platform this binary was built for.
pub fn default_transport(read_buffer_size: usize) -> Box<dyn Transport> {
    #[cfg(unix)]
    {
        Box::new(IpcTransport::with_read_buffer_size(
            UnixConnector::from_env(),
            read_buffer_size,
        ))
    }

    #[cfg(windows)]
    {
        Box::new(IpcTransport::with_read_buffer_size(
            NamedPipeConnector,
            read_buffer_size,
        ))
    }
}
