//! Inbound message classification.
//!
//! [`parse_response`] maps one decoded `Message` payload to at most one
//! [`Event`]. Command acknowledgements (e.g. the reply to `SET_ACTIVITY`)
//! and anything malformed map to `None`.

use serde_json::{Map, Value};

use super::command::commands;
use crate::event::{Event, User};

/// Classify a decoded message.
///
/// Order:
/// 1. explicit `ERROR` event or an embedded error `code` → `Error`
/// 2. top-level `evt` → looked up by name
/// 3. `DISPATCH` wrapper with nested `evt`/`data` → looked up by name
/// 4. otherwise nothing
pub fn parse_response(message: &Value) -> Option<Event> {
    let obj = message.as_object()?;
    let evt = obj.get("evt").and_then(Value::as_str);

    if evt == Some("ERROR") || error_code(obj).is_some() {
        return Some(error_event(obj));
    }

    if let Some(evt) = evt {
        return classify(evt, obj.get("data"));
    }

    if obj.get("cmd").and_then(Value::as_str) == Some(commands::DISPATCH) {
        let nested = obj.get("data")?.as_object()?;
        let evt = nested.get("evt")?.as_str()?;
        return classify(evt, nested.get("data"));
    }

    None
}

fn classify(evt: &str, data: Option<&Value>) -> Option<Event> {
    match evt {
        "READY" => Some(Event::Ready {
            user: user_field(data)?,
        }),
        "ERROR" => {
            let empty = Map::new();
            let data = data.and_then(Value::as_object).unwrap_or(&empty);
            Some(Event::Error {
                code: int_field(data, "code").unwrap_or(0),
                message: str_field(data, "message").unwrap_or_default(),
            })
        }
        "ACTIVITY_JOIN" => Some(Event::JoinGame {
            secret: secret_field(data)?,
        }),
        "ACTIVITY_SPECTATE" => Some(Event::SpectateGame {
            secret: secret_field(data)?,
        }),
        "ACTIVITY_JOIN_REQUEST" => Some(Event::JoinRequest {
            user: user_field(data)?,
        }),
        other => {
            tracing::trace!(evt = other, "Ignoring unhandled event");
            None
        }
    }
}

/// Error code carried either in `data.code` or at the top level.
fn error_code(obj: &Map<String, Value>) -> Option<i32> {
    obj.get("data")
        .and_then(Value::as_object)
        .and_then(|data| int_field(data, "code"))
        .or_else(|| int_field(obj, "code"))
}

fn error_event(obj: &Map<String, Value>) -> Event {
    let data = obj.get("data").and_then(Value::as_object);
    let message = data
        .and_then(|d| str_field(d, "message"))
        .or_else(|| str_field(obj, "message"))
        .unwrap_or_default();

    Event::Error {
        code: error_code(obj).unwrap_or(0),
        message,
    }
}

fn user_field(data: Option<&Value>) -> Option<User> {
    let user = data?.get("user")?;
    match serde_json::from_value(user.clone()) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping event with unusable user");
            None
        }
    }
}

fn secret_field(data: Option<&Value>) -> Option<String> {
    data?.get("secret")?.as_str().map(str::to_owned)
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i32> {
    obj.get(key)?.as_i64().and_then(|v| i32::try_from(v).ok())
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_json() -> Value {
        json!({
            "id": "53908232506183680",
            "username": "Mason",
            "discriminator": "1337",
            "avatar": null,
            "bot": false
        })
    }

    #[test]
    fn test_ready_dispatch() {
        let msg = json!({
            "cmd": "DISPATCH",
            "evt": "READY",
            "data": {"v": 1, "config": {}, "user": user_json()},
            "nonce": null
        });

        match parse_response(&msg) {
            Some(Event::Ready { user }) => {
                assert_eq!(user.username, "Mason");
                assert_eq!(user.discriminator, "1337");
            }
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_ready_without_user_is_ignored() {
        let msg = json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}});
        assert_eq!(parse_response(&msg), None);
    }

    #[test]
    fn test_explicit_error_event() {
        let msg = json!({
            "cmd": "SET_ACTIVITY",
            "evt": "ERROR",
            "data": {"code": 4000, "message": "child \"activity\" fails"},
            "nonce": "1-3"
        });
        assert_eq!(
            parse_response(&msg),
            Some(Event::Error {
                code: 4000,
                message: "child \"activity\" fails".into()
            })
        );
    }

    #[test]
    fn test_embedded_error_code_without_evt() {
        let msg = json!({"cmd": "SUBSCRIBE", "data": {"code": 4006, "message": "Not authenticated"}});
        assert_eq!(
            parse_response(&msg),
            Some(Event::Error {
                code: 4006,
                message: "Not authenticated".into()
            })
        );

        let top_level = json!({"code": 4000, "message": "Invalid Client ID"});
        assert!(matches!(
            parse_response(&top_level),
            Some(Event::Error { code: 4000, .. })
        ));
    }

    #[test]
    fn test_join_and_spectate_require_secret() {
        let join = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": {"secret": "025ed05c"}});
        assert_eq!(
            parse_response(&join),
            Some(Event::JoinGame {
                secret: "025ed05c".into()
            })
        );

        let spectate = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_SPECTATE", "data": {"secret": "e7eb30d2"}});
        assert_eq!(
            parse_response(&spectate),
            Some(Event::SpectateGame {
                secret: "e7eb30d2".into()
            })
        );

        let missing = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": {}});
        assert_eq!(parse_response(&missing), None);

        let wrong_type = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_SPECTATE", "data": {"secret": 5}});
        assert_eq!(parse_response(&wrong_type), None);
    }

    #[test]
    fn test_join_request_requires_user() {
        let msg = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_JOIN_REQUEST", "data": {"user": user_json()}});
        assert!(matches!(
            parse_response(&msg),
            Some(Event::JoinRequest { user }) if user.id == "53908232506183680"
        ));

        let bad_user = json!({"evt": "ACTIVITY_JOIN_REQUEST", "data": {"user": {"id": 1}}});
        assert_eq!(parse_response(&bad_user), None);
    }

    #[test]
    fn test_ready_with_null_user_fields() {
        let msg = json!({
            "cmd": "DISPATCH",
            "evt": "READY",
            "data": {"v": 1, "user": {
                "id": "7",
                "username": "nully",
                "discriminator": null,
                "global_name": null,
                "avatar": null,
                "bot": null,
                "premium_type": null
            }}
        });

        match parse_response(&msg) {
            Some(Event::Ready { user }) => {
                assert_eq!(user.username, "nully");
                assert_eq!(user.discriminator, "0");
                assert_eq!(user.premium_tier, 0);
            }
            other => panic!("expected READY, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_dispatch_wrapper() {
        let msg = json!({
            "cmd": "DISPATCH",
            "data": {"evt": "ACTIVITY_JOIN", "data": {"secret": "nested"}}
        });
        assert_eq!(
            parse_response(&msg),
            Some(Event::JoinGame {
                secret: "nested".into()
            })
        );
    }

    #[test]
    fn test_command_acks_produce_nothing() {
        let set_activity = json!({
            "cmd": "SET_ACTIVITY",
            "data": {"state": "x", "type": 0},
            "evt": null,
            "nonce": "1-2"
        });
        assert_eq!(parse_response(&set_activity), None);

        let subscribe = json!({"cmd": "SUBSCRIBE", "data": {"evt": "ACTIVITY_JOIN"}, "evt": null});
        assert_eq!(parse_response(&subscribe), None);
    }

    #[test]
    fn test_malformed_input_never_panics() {
        for msg in [
            json!(null),
            json!(42),
            json!("READY"),
            json!([]),
            json!({}),
            json!({"evt": 7}),
            json!({"evt": "UNKNOWN_EVENT", "data": {}}),
            json!({"cmd": "DISPATCH", "data": "oops"}),
            json!({"cmd": "DISPATCH", "data": {"evt": null}}),
            json!({"evt": "READY", "data": null}),
        ] {
            assert_eq!(parse_response(&msg), None, "input: {}", msg);
        }
    }
}
