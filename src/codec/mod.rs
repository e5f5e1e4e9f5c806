//! Codec module - serialization/deserialization for frame payloads.
//!
//! Every payload on this protocol is UTF-8 JSON, so there is a single
//! [`JsonCodec`].
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use rich_presence_ipc::codec::JsonCodec;
//! use serde_json::json;
//!
//! let encoded = JsonCodec::encode(&json!({"v": 1})).unwrap();
//! assert_eq!(encoded, br#"{"v":1}"#);
//! let decoded: serde_json::Value = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["v"], 1);
//! ```

mod json;

pub use json::JsonCodec;
