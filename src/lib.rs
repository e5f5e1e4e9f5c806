//! # rich-presence-ipc
//!
//! Async client for the local Rich Presence IPC protocol.
//!
//! A desktop chat host listens on a named pipe (Windows) or Unix socket
//! (Linux/macOS). This crate finds it, performs the handshake, publishes
//! the application's activity and relays join/spectate notifications back.
//!
//! ## Architecture
//!
//! - **Transport**: probes `discord-ipc-0` through `discord-ipc-9` and moves raw bytes
//! - **Protocol**: 8-byte little-endian header (opcode, length) + JSON payload
//! - **Connection**: handshake, ping/pong, frame dispatch, lifecycle
//! - **Client**: per-kind event channels and the caller-facing operations
//!
//! ## Example
//!
//! ```ignore
//! use rich_presence_ipc::{ActivityType, Presence, PresenceClient, Timestamps};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rich_presence_ipc::IpcError> {
//!     let client = PresenceClient::new();
//!     client.connect("123456789012345678").await?;
//!
//!     let presence = Presence::new()
//!         .with_kind(ActivityType::Playing)
//!         .with_details("Ranked")
//!         .with_timestamps(Timestamps::starting_now());
//!     client.set_presence(&presence).await?;
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod event;
pub mod presence;
pub mod protocol;
pub mod rpc;
pub mod transport;

mod client;
mod writer;

pub use client::{ClientBuilder, PresenceClient, DEFAULT_EVENT_CAPACITY};
pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use error::{ErrorKind, IpcError, Result};
pub use event::{Event, Reason, User};
pub use presence::{
    ActivityType, Asset, Party, PartyPrivacy, Presence, Secrets, StatusDisplay, Timestamps,
    ValidationError,
};
pub use rpc::JoinReply;
