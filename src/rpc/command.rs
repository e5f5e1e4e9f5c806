//! Outbound command builder.
//!
//! Turns typed requests into the JSON objects sent inside `Message` frames
//! (or the `Handshake` frame). Every command carries a `nonce` that is
//! unique for the lifetime of the process.
//!
//! # Example
//!
//! ```
//! use rich_presence_ipc::rpc::CommandBuilder;
//! use rich_presence_ipc::Presence;
//!
//! let commands = CommandBuilder::new(4242);
//! let cmd = commands.set_activity(Some(&Presence::new().with_state("x")));
//!
//! assert_eq!(cmd["cmd"], "SET_ACTIVITY");
//! assert_eq!(cmd["args"]["activity"], serde_json::json!({"type": 0, "state": "x"}));
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde_json::{json, Map, Value};

use crate::presence::{Asset, Presence};

/// Protocol version declared in the handshake.
pub const RPC_VERSION: u32 = 1;

/// Tags each builder so nonces from two builders never collide.
static NEXT_BUILDER_ID: AtomicU32 = AtomicU32::new(1);

/// Command names understood by the host.
pub mod commands {
    pub const DISPATCH: &str = "DISPATCH";
    pub const SET_ACTIVITY: &str = "SET_ACTIVITY";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const SEND_ACTIVITY_JOIN_INVITE: &str = "SEND_ACTIVITY_JOIN_INVITE";
    pub const CLOSE_ACTIVITY_REQUEST: &str = "CLOSE_ACTIVITY_REQUEST";
}

/// Event names a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    ActivityJoin,
    ActivitySpectate,
    ActivityJoinRequest,
}

impl Subscription {
    /// Subscriptions sent after every successful handshake, in order.
    pub const AFTER_READY: [Subscription; 3] = [
        Subscription::ActivityJoin,
        Subscription::ActivitySpectate,
        Subscription::ActivityJoinRequest,
    ];

    pub fn event_name(self) -> &'static str {
        match self {
            Subscription::ActivityJoin => "ACTIVITY_JOIN",
            Subscription::ActivitySpectate => "ACTIVITY_SPECTATE",
            Subscription::ActivityJoinRequest => "ACTIVITY_JOIN_REQUEST",
        }
    }
}

/// Answer to a join request.
///
/// `Deny` and `Ignore` produce the same wire command; the distinction only
/// exists for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Accept,
    Deny,
    Ignore,
}

/// Builds wire commands with a monotonically increasing nonce.
#[derive(Debug)]
pub struct CommandBuilder {
    builder_id: u32,
    next_nonce: AtomicU64,
    pid: u32,
}

impl CommandBuilder {
    /// Create a builder that reports `pid` in `SET_ACTIVITY`.
    pub fn new(pid: u32) -> Self {
        Self {
            builder_id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            next_nonce: AtomicU64::new(1),
            pid,
        }
    }

    /// Next correlation id.
    pub fn nonce(&self) -> String {
        let seq = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.builder_id, seq)
    }

    /// Handshake payload: `{v, client_id}`.
    pub fn handshake(&self, application_id: &str) -> Value {
        json!({
            "v": RPC_VERSION,
            "client_id": application_id,
        })
    }

    /// `SET_ACTIVITY`; `None` clears the presence.
    pub fn set_activity(&self, presence: Option<&Presence>) -> Value {
        let mut args = Map::new();
        args.insert("pid".into(), json!(self.pid));
        if let Some(presence) = presence {
            args.insert("activity".into(), Value::Object(activity_json(presence)));
        }

        json!({
            "nonce": self.nonce(),
            "cmd": commands::SET_ACTIVITY,
            "args": args,
        })
    }

    /// Reply to an `ACTIVITY_JOIN_REQUEST` from `user_id`.
    pub fn join_reply(&self, user_id: &str, reply: JoinReply) -> Value {
        let cmd = match reply {
            JoinReply::Accept => commands::SEND_ACTIVITY_JOIN_INVITE,
            JoinReply::Deny | JoinReply::Ignore => commands::CLOSE_ACTIVITY_REQUEST,
        };

        json!({
            "nonce": self.nonce(),
            "cmd": cmd,
            "args": { "user_id": user_id },
        })
    }

    /// `SUBSCRIBE` to one event type.
    pub fn subscribe(&self, subscription: Subscription) -> Value {
        json!({
            "nonce": self.nonce(),
            "cmd": commands::SUBSCRIBE,
            "evt": subscription.event_name(),
        })
    }
}

/// Copy the present fields of `presence` into an `activity` object.
fn activity_json(presence: &Presence) -> Map<String, Value> {
    let mut activity = Map::new();
    activity.insert("type".into(), json!(presence.kind.wire_value()));

    if let Some(state) = &presence.state {
        activity.insert("state".into(), json!(state));
    }
    if let Some(details) = &presence.details {
        activity.insert("details".into(), json!(details));
    }

    if let Some(ts) = &presence.timestamps {
        let mut timestamps = Map::new();
        if let Some(start) = ts.start {
            timestamps.insert("start".into(), json!(start));
        }
        if let Some(end) = ts.end {
            timestamps.insert("end".into(), json!(end));
        }
        if !timestamps.is_empty() {
            activity.insert("timestamps".into(), Value::Object(timestamps));
        }
    }

    let mut assets = Map::new();
    insert_asset(&mut assets, "large", presence.large_image.as_ref());
    insert_asset(&mut assets, "small", presence.small_image.as_ref());
    if !assets.is_empty() {
        activity.insert("assets".into(), Value::Object(assets));
    }

    if let Some(party) = &presence.party {
        let mut obj = Map::new();
        obj.insert("id".into(), json!(party.id));
        obj.insert("size".into(), json!([party.current, party.max]));
        if let Some(privacy) = party.privacy {
            obj.insert("privacy".into(), json!(privacy.wire_value()));
        }
        activity.insert("party".into(), Value::Object(obj));
    }

    if let Some(secrets) = &presence.secrets {
        let mut obj = Map::new();
        for (key, value) in [
            ("match", &secrets.match_secret),
            ("join", &secrets.join),
            ("spectate", &secrets.spectate),
        ] {
            if let Some(value) = value {
                obj.insert(key.into(), json!(value));
            }
        }
        if !obj.is_empty() {
            activity.insert("secrets".into(), Value::Object(obj));
        }
    }

    if presence.instance == Some(true) {
        activity.insert("instance".into(), json!(true));
    }

    if let Some(display) = presence.status_display {
        activity.insert("status_display_type".into(), json!(display.wire_value()));
    }

    activity
}

fn insert_asset(assets: &mut Map<String, Value>, prefix: &str, asset: Option<&Asset>) {
    if let Some(asset) = asset {
        assets.insert(format!("{}_image", prefix), json!(asset.key));
        if let Some(text) = &asset.text {
            assets.insert(format!("{}_text", prefix), json!(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::presence::{ActivityType, Party, PartyPrivacy, Secrets, StatusDisplay, Timestamps};

    #[test]
    fn test_handshake_payload() {
        let commands = CommandBuilder::new(1);
        assert_eq!(
            commands.handshake("383226320970055681"),
            json!({"v": 1, "client_id": "383226320970055681"})
        );
    }

    #[test]
    fn test_clear_has_no_activity_key() {
        let commands = CommandBuilder::new(77);
        let cmd = commands.set_activity(None);

        assert_eq!(cmd["cmd"], "SET_ACTIVITY");
        assert_eq!(cmd["args"], json!({"pid": 77}));
        assert!(cmd["args"].get("activity").is_none());
    }

    #[test]
    fn test_only_state_copies_only_state() {
        let commands = CommandBuilder::new(1);
        let cmd = commands.set_activity(Some(&Presence::new().with_state("x")));

        assert_eq!(cmd["args"]["activity"], json!({"type": 0, "state": "x"}));
    }

    #[test]
    fn test_full_presence_mapping() {
        let presence = Presence {
            kind: ActivityType::Competing,
            state: Some("In a group".into()),
            details: Some("Competitive".into()),
            timestamps: Some(Timestamps {
                start: Some(1_507_665_886),
                end: Some(1_507_666_000),
            }),
            large_image: Some(Asset {
                key: "map".into(),
                text: Some("Summoner's Rift".into()),
            }),
            small_image: Some(Asset {
                key: "rank".into(),
                text: None,
            }),
            party: Some(Party {
                id: "ae488379".into(),
                current: 1,
                max: 5,
                privacy: Some(PartyPrivacy::Public),
            }),
            secrets: Some(Secrets {
                match_secret: Some("m".into()),
                join: Some("j".into()),
                spectate: None,
            }),
            instance: Some(true),
            status_display: Some(StatusDisplay::Details),
        };

        let cmd = CommandBuilder::new(9).set_activity(Some(&presence));

        assert_eq!(
            cmd["args"]["activity"],
            json!({
                "type": 5,
                "state": "In a group",
                "details": "Competitive",
                "timestamps": {"start": 1_507_665_886, "end": 1_507_666_000},
                "assets": {
                    "large_image": "map",
                    "large_text": "Summoner's Rift",
                    "small_image": "rank"
                },
                "party": {"id": "ae488379", "size": [1, 5], "privacy": 1},
                "secrets": {"match": "m", "join": "j"},
                "instance": true,
                "status_display_type": 2
            })
        );
    }

    #[test]
    fn test_instance_false_is_omitted() {
        let cmd = CommandBuilder::new(1).set_activity(Some(&Presence::new().with_instance(false)));
        assert_eq!(cmd["args"]["activity"], json!({"type": 0}));
    }

    #[test]
    fn test_join_reply_commands() {
        let commands = CommandBuilder::new(1);

        let accept = commands.join_reply("123", JoinReply::Accept);
        let deny = commands.join_reply("123", JoinReply::Deny);
        let ignore = commands.join_reply("123", JoinReply::Ignore);

        assert_eq!(accept["cmd"], "SEND_ACTIVITY_JOIN_INVITE");
        assert_eq!(accept["args"], json!({"user_id": "123"}));
        assert_eq!(deny["cmd"], "CLOSE_ACTIVITY_REQUEST");
        assert_eq!(deny["cmd"], ignore["cmd"]);
        assert_eq!(deny["args"], ignore["args"]);
    }

    #[test]
    fn test_subscribe_command() {
        let cmd = CommandBuilder::new(1).subscribe(Subscription::ActivityJoinRequest);
        assert_eq!(cmd["cmd"], "SUBSCRIBE");
        assert_eq!(cmd["evt"], "ACTIVITY_JOIN_REQUEST");
        assert!(cmd["nonce"].is_string());
    }

    #[test]
    fn test_nonces_are_unique() {
        let commands = CommandBuilder::new(1);
        let nonces: HashSet<String> = (0..1000).map(|_| commands.nonce()).collect();
        assert_eq!(nonces.len(), 1000);
    }

    #[test]
    fn test_nonces_unique_across_builders() {
        let a = CommandBuilder::new(1);
        let b = CommandBuilder::new(1);
        assert_ne!(a.nonce(), b.nonce());
    }
}
