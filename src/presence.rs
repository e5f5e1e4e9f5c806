//! Presence value types.
//!
//! A [`Presence`] is the status shown by the host on behalf of the connected
//! application. These are plain values; turning one into a wire command is
//! done by [`CommandBuilder::set_activity`](crate::rpc::CommandBuilder::set_activity).
//!
//! # Example
//!
//! ```
//! use rich_presence_ipc::{ActivityType, Presence};
//!
//! let presence = Presence::new()
//!     .with_kind(ActivityType::Competing)
//!     .with_details("Ranked match")
//!     .with_state("In queue")
//!     .with_party("party-1", 1, 4);
//!
//! assert!(presence.validate().is_ok());
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Longest text the host accepts for any free-text field.
pub const MAX_TEXT_LEN: usize = 128;

/// What the user is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityType {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    /// Wire value 5; 4 is reserved by the host.
    Competing,
}

impl ActivityType {
    /// Integer sent as `activity.type`.
    pub fn wire_value(self) -> u8 {
        match self {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Competing => 5,
        }
    }
}

/// Whether a party can be joined without an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartyPrivacy {
    #[default]
    Private,
    Public,
}

impl PartyPrivacy {
    /// Integer sent as `activity.party.privacy`.
    pub fn wire_value(self) -> u8 {
        match self {
            PartyPrivacy::Private => 0,
            PartyPrivacy::Public => 1,
        }
    }
}

/// Which field the host shows in compact status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDisplay {
    Name,
    State,
    Details,
}

impl StatusDisplay {
    /// Integer sent as `activity.status_display_type`.
    pub fn wire_value(self) -> u8 {
        match self {
            StatusDisplay::Name => 0,
            StatusDisplay::State => 1,
            StatusDisplay::Details => 2,
        }
    }
}

/// Elapsed/remaining time range, in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl Timestamps {
    /// A range that starts at the current wall-clock time.
    pub fn starting_now() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            start: Some(now),
            end: None,
        }
    }
}

/// An image key registered with the host, plus its hover tooltip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: String,
    pub text: Option<String>,
}

/// Multiplayer grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub id: String,
    pub current: u32,
    pub max: u32,
    pub privacy: Option<PartyPrivacy>,
}

/// Opaque strings the host hands back on join/spectate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Secrets {
    pub match_secret: Option<String>,
    pub join: Option<String>,
    pub spectate: Option<String>,
}

/// Rich presence status.
///
/// Every field except `kind` is optional; absent fields are left out of the
/// wire command entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presence {
    pub kind: ActivityType,
    pub state: Option<String>,
    pub details: Option<String>,
    pub timestamps: Option<Timestamps>,
    pub large_image: Option<Asset>,
    pub small_image: Option<Asset>,
    pub party: Option<Party>,
    pub secrets: Option<Secrets>,
    pub instance: Option<bool>,
    pub status_display: Option<StatusDisplay>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ActivityType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    pub fn with_large_image(mut self, key: impl Into<String>, text: Option<String>) -> Self {
        self.large_image = Some(Asset {
            key: key.into(),
            text,
        });
        self
    }

    pub fn with_small_image(mut self, key: impl Into<String>, text: Option<String>) -> Self {
        self.small_image = Some(Asset {
            key: key.into(),
            text,
        });
        self
    }

    pub fn with_party(mut self, id: impl Into<String>, current: u32, max: u32) -> Self {
        self.party = Some(Party {
            id: id.into(),
            current,
            max,
            privacy: None,
        });
        self
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = Some(secrets);
        self
    }

    pub fn with_instance(mut self, instance: bool) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_status_display(mut self, display: StatusDisplay) -> Self {
        self.status_display = Some(display);
        self
    }

    /// Check field limits the host enforces.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("state", self.state.as_deref())?;
        check_len("details", self.details.as_deref())?;

        if let Some(Timestamps {
            start: Some(start),
            end: Some(end),
        }) = self.timestamps
        {
            if end < start {
                return Err(ValidationError::InvertedTimestamps { start, end });
            }
        }

        for (name, asset) in [
            ("large_image", &self.large_image),
            ("small_image", &self.small_image),
        ] {
            if let Some(asset) = asset {
                check_len(name, Some(&asset.key))?;
                check_len(name, asset.text.as_deref())?;
            }
        }

        if let Some(party) = &self.party {
            if party.id.is_empty() {
                return Err(ValidationError::EmptyPartyId);
            }
            check_len("party.id", Some(&party.id))?;
            if party.max == 0 || party.current > party.max {
                return Err(ValidationError::PartySize {
                    current: party.current,
                    max: party.max,
                });
            }
        }

        if let Some(secrets) = &self.secrets {
            check_len("secrets.match", secrets.match_secret.as_deref())?;
            check_len("secrets.join", secrets.join.as_deref())?;
            check_len("secrets.spectate", secrets.spectate.as_deref())?;
        }

        Ok(())
    }
}

fn check_len(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        }),
        _ => Ok(()),
    }
}

/// Why a presence was rejected before sending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("party id must not be empty")]
    EmptyPartyId,

    #[error("party size {current}/{max} is invalid")]
    PartySize { current: u32, max: u32 },

    #[error("end timestamp {end} is before start {start}")]
    InvertedTimestamps { start: i64, end: i64 },
}
