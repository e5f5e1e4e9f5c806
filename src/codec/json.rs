//! JSON codec using `serde_json`.
//!
//! Output is compact (no whitespace) so payload sizes stay predictable
//! against the 64 KiB frame limit.

use crate::error::{IpcError, Result};
use crate::protocol::MAX_PAYLOAD_SIZE;

/// JSON codec for frame payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized or the result does
    /// not fit in a single frame.
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(value)?;
        if bytes.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(IpcError::PayloadTooLarge {
                size: bytes.len(),
                max: MAX_PAYLOAD_SIZE as usize,
            });
        }
        Ok(bytes)
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid JSON for type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
