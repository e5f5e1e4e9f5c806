//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with opcode and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use rich_presence_ipc::protocol::{encode_frame, FrameBuffer, Opcode};
//! use serde_json::json;
//!
//! let bytes = encode_frame(Opcode::Message, &json!({"a": 1})).unwrap();
//! let frames = FrameBuffer::new().push(&bytes).unwrap();
//!
//! assert_eq!(frames[0].opcode, Opcode::Message);
//! assert_eq!(frames[0].payload(), br#"{"a":1}"#);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::wire_format::{Header, Opcode, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::codec::JsonCodec;
use crate::error::{IpcError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame purpose.
    pub opcode: Opcode,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from opcode and payload.
    pub fn new(opcode: Opcode, payload: Bytes) -> Self {
        Self { opcode, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::decode(&self.payload)
    }

    /// Encode this frame back to wire bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        build_frame(self.opcode, &self.payload)
    }
}

/// Build a complete frame from an opcode and raw payload bytes.
///
/// # Errors
///
/// Returns `PayloadTooLarge` if the payload exceeds [`MAX_PAYLOAD_SIZE`].
pub fn build_frame(opcode: Opcode, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(IpcError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE as usize,
        });
    }
    let header = Header::new(opcode, payload.len() as u32);
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_slice(&header.encode());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Serialize `value` to JSON and wrap it in a single frame.
///
/// The JSON payload is never split across frames.
pub fn encode_frame<T: Serialize + ?Sized>(opcode: Opcode, value: &T) -> Result<Bytes> {
    let payload = JsonCodec::encode(value)?;
    build_frame(opcode, &payload)
}
