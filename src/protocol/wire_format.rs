//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌──────────┬──────────┐
//! │ Opcode   │ Length   │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32 LE│ uint32 LE│
//! └──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. The header is immediately
//! followed by `length` bytes of UTF-8 JSON.

use crate::error::{IpcError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Maximum payload size accepted or produced (64 KiB).
pub const MAX_PAYLOAD_SIZE: u32 = 65_536;

/// Frame purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    /// First frame on a new connection.
    Handshake = 0,
    /// JSON command or event.
    Message = 1,
    /// Channel shutdown, payload carries `{code, message}`.
    Close = 2,
    /// Keepalive request; must be echoed as `Pong`.
    Ping = 3,
    /// Keepalive reply.
    Pong = 4,
}

impl Opcode {
    /// Raw wire value.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Opcode {
    type Error = IpcError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Message),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(IpcError::Protocol(format!("Unknown opcode {}", other))),
        }
    }
}

/// Decoded header from wire format.
///
/// The opcode is kept raw so that a header can be inspected before it is
/// validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw opcode value.
    pub opcode: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(opcode: Opcode, payload_length: u32) -> Self {
        Self {
            opcode: opcode.as_u32(),
            payload_length,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use rich_presence_ipc::protocol::{Header, Opcode};
    ///
    /// let bytes = Header::new(Opcode::Message, 15).encode();
    /// assert_eq!(bytes, [1, 0, 0, 0, 15, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.opcode.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            opcode: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_length: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Validate the header and return its typed opcode.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Opcode is one of the five known values
    pub fn validate(&self, max_payload_size: u32) -> Result<Opcode> {
        if self.payload_length > max_payload_size {
            return Err(IpcError::PayloadTooLarge {
                size: self.payload_length as usize,
                max: max_payload_size as usize,
            });
        }
        Opcode::try_from(self.opcode)
    }
}

/// Try to read a header from the front of `buf`.
#[inline]
pub fn try_parse_header(buf: &[u8]) -> Option<Header> {
    Header::decode(buf)
}
