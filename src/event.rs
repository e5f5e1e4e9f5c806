//! Events delivered by the host, and the user value they carry.

use serde::{Deserialize, Deserializer};

/// Disconnect code used when the transport vanished without a close frame.
pub const TRANSPORT_LOST_CODE: i32 = 0;

/// Error code reported for protocol violations detected locally.
pub const PROTOCOL_ERROR_CODE: i32 = -1;

/// Disconnect code used when the client itself closed the channel.
pub const CLOSED_BY_CLIENT_CODE: i32 = 1000;

/// Everything the host can tell us.
///
/// The set is closed: consumers match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Handshake accepted; the logged-in user.
    Ready { user: User },
    /// Channel closed.
    Disconnected { code: i32, message: String },
    /// The host reported an error.
    Error { code: i32, message: String },
    /// The user accepted an invite; join using `secret`.
    JoinGame { secret: String },
    /// The user wants to spectate; connect using `secret`.
    SpectateGame { secret: String },
    /// Someone asked to join the user's party.
    JoinRequest { user: User },
}

impl Event {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "READY",
            Event::Disconnected { .. } => "DISCONNECTED",
            Event::Error { .. } => "ERROR",
            Event::JoinGame { .. } => "ACTIVITY_JOIN",
            Event::SpectateGame { .. } => "ACTIVITY_SPECTATE",
            Event::JoinRequest { .. } => "ACTIVITY_JOIN_REQUEST",
        }
    }
}

/// Code and message pair carried by disconnect and error events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub code: i32,
    pub message: String,
}

/// A user account as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default = "default_discriminator", deserialize_with = "discriminator_or_default")]
    pub discriminator: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default, rename = "avatar")]
    pub avatar_hash: Option<String>,
    #[serde(default, rename = "bot", deserialize_with = "null_as_default")]
    pub is_bot: bool,
    #[serde(default, rename = "premium_type", deserialize_with = "null_as_default")]
    pub premium_tier: u8,
}

fn default_discriminator() -> String {
    "0".to_string()
}

/// Hosts send `null` for unset fields; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn discriminator_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_discriminator))
}

impl User {
    /// Name to show in UI: the global name when set, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}
