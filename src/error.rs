//! Error types for rich-presence-ipc.

use std::time::Duration;

use thiserror::Error;

use crate::presence::ValidationError;

/// Coarse classification of an [`IpcError`].
///
/// A failed `connect` always reports one of `NotRunning`, `Connection`,
/// `Protocol` or `State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No candidate address accepted a connection.
    NotRunning,
    /// Transport failure, or loss of an established channel.
    Connection,
    /// Malformed frame, oversized payload or undecodable JSON.
    Protocol,
    /// The call is illegal in the current lifecycle phase.
    State,
    /// A presence value failed validation before it was sent.
    InvalidInput,
}

/// Main error type for all IPC operations.
#[derive(Debug, Error)]
pub enum IpcError {
    /// None of the well-known addresses accepted a connection.
    #[error("no rich presence host is running")]
    NotRunning,

    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport went away.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The host sent a close frame.
    #[error("Connection closed by host ({code}): {message}")]
    Closed { code: i32, message: String },

    /// The host answered the handshake with an error.
    #[error("Handshake rejected ({code}): {message}")]
    Rejected { code: i32, message: String },

    /// No readiness notification arrived within the configured limit.
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Protocol error (invalid frame, unknown opcode, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame payload larger than the protocol allows.
    #[error("Payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Operation not allowed in the current state.
    #[error("Invalid state: {0}")]
    State(String),

    /// Presence rejected by validation.
    #[error("Invalid presence: {0}")]
    InvalidPresence(#[from] ValidationError),
}

impl IpcError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IpcError::NotRunning => ErrorKind::NotRunning,
            IpcError::Io(_)
            | IpcError::ConnectionClosed
            | IpcError::Closed { .. }
            | IpcError::Rejected { .. }
            | IpcError::HandshakeTimeout(_) => ErrorKind::Connection,
            IpcError::Protocol(_) | IpcError::Json(_) | IpcError::PayloadTooLarge { .. } => {
                ErrorKind::Protocol
            }
            IpcError::State(_) => ErrorKind::State,
            IpcError::InvalidPresence(_) => ErrorKind::InvalidInput,
        }
    }

    /// True when the host process could not be reached at all.
    pub fn is_not_running(&self) -> bool {
        matches!(self, IpcError::NotRunning)
    }
}

/// Result type alias using IpcError.
pub type Result<T> = std::result::Result<T, IpcError>;
