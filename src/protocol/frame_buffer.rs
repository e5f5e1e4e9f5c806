//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 8 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//! - `Failed`: A protocol violation was seen; no further bytes are accepted
//!
//! # Example
//!
//! ```ignore
//! use rich_presence_ipc::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from socket
//! let frames = buffer.push(&chunk)?;
//!
//! for frame in frames {
//!     println!("Got {:?} frame", frame.opcode);
//! }
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, Opcode, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use super::Frame;
use crate::error::{IpcError, Result};

/// Initial buffer capacity; one read's worth of data.
const INITIAL_CAPACITY: usize = 4 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 8 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { opcode: Opcode, remaining: u32 },
    /// Stream is unusable after a protocol violation.
    Failed(String),
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Output is identical regardless of how the byte stream is chunked.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the protocol's 64 KiB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns a vector of complete frames. If data is fragmented,
    /// partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a header declares an oversized payload or an unknown
    /// opcode. After the first error every later call fails without touching
    /// `data`; the caller is expected to close the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        if let State::Failed(reason) = &self.state {
            return Err(IpcError::Protocol(format!(
                "frame stream already failed: {}",
                reason
            )));
        }

        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();

        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => {
                    self.buffer = BytesMut::new();
                    self.state = State::Failed(e.to_string());
                    return Err(e);
                }
            }
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if protocol violation (e.g., payload too large)
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };

                let opcode = header.validate(self.max_payload_size)?;

                let _ = self.buffer.split_to(HEADER_SIZE);

                if header.payload_length == 0 {
                    return Ok(Some(Frame::new(opcode, Bytes::new())));
                }

                self.state = State::WaitingForPayload {
                    opcode,
                    remaining: header.payload_length,
                };

                self.try_extract_one()
            }

            State::WaitingForPayload { opcode, remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let opcode = *opcode;

                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(opcode, payload)))
            }

            State::Failed(reason) => Err(IpcError::Protocol(reason.clone())),
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// True once a protocol violation has been seen.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed(_))
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
            State::Failed(_) => "Failed",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
