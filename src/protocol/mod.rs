//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary framing of the IPC channel:
//! - 8-byte little-endian header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, encode_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{try_parse_header, Header, Opcode, HEADER_SIZE, MAX_PAYLOAD_SIZE};
