//! Inbound event reports → [`BotEvent`].
//!
//! Only poke notices and chat messages are of interest; heartbeats, other
//! notices and requests parse to `None`.

use pokebot_core::cq;
use pokebot_core::types::{BotEvent, Conversation, EventContext};
use serde_json::Value;

/// Number or string id field as a string.
fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn timestamp_ms(event: &Value) -> i64 {
    event["time"].as_i64().map(|t| t * 1000).unwrap_or_else(now_ms)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Message content in CQ-code text form. Array messages are converted.
pub fn message_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Array(segments) => segments.iter().map(segment_text).collect(),
        _ => String::new(),
    }
}

fn segment_text(segment: &Value) -> String {
    let kind = segment["type"].as_str().unwrap_or_default();
    let data = &segment["data"];
    if kind == "text" {
        return cq::escape_text(data["text"].as_str().unwrap_or_default());
    }
    let mut out = format!("[CQ:{kind}");
    if let Some(params) = data.as_object() {
        for (key, value) in params {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            out.push_str(&format!(",{key}={}", cq::escape_param(&value)));
        }
    }
    out.push(']');
    out
}

/// Parse one event report. `fallback_self_id` is used when the report has no `self_id`.
pub fn parse_event(event: &Value, fallback_self_id: &str) -> Option<BotEvent> {
    let self_id = id_field(&event["self_id"]).unwrap_or_else(|| fallback_self_id.to_string());
    let user_id = id_field(&event["user_id"])?;
    let conversation = match id_field(&event["group_id"]) {
        Some(group_id) => Conversation::Group { group_id },
        None => Conversation::Private {
            user_id: user_id.clone(),
        },
    };

    match event["post_type"].as_str()? {
        "notice" => {
            let is_poke = event["notice_type"] == "notify" && event["sub_type"] == "poke";
            if !is_poke {
                return None;
            }
            let target_id = id_field(&event["target_id"])?;
            Some(BotEvent::Poke {
                ctx: EventContext {
                    self_id,
                    user_id,
                    display_name: None,
                    conversation,
                    message_id: None,
                    timestamp_ms: timestamp_ms(event),
                },
                target_id,
            })
        }
        "message" | "message_sent" => {
            let sender = &event["sender"];
            let display_name = [&sender["card"], &sender["nickname"]]
                .into_iter()
                .filter_map(|v| v.as_str())
                .find(|s| !s.is_empty())
                .map(String::from);
            let content = match &event["raw_message"] {
                Value::String(raw) if !raw.is_empty() => raw.clone(),
                _ => message_text(&event["message"]),
            };
            Some(BotEvent::Message {
                ctx: EventContext {
                    self_id,
                    user_id,
                    display_name,
                    conversation,
                    message_id: id_field(&event["message_id"]),
                    timestamp_ms: timestamp_ms(event),
                },
                content,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_poke() {
        let event = json!({
            "post_type": "notice", "notice_type": "notify", "sub_type": "poke",
            "self_id": 10000, "user_id": 42, "target_id": 10000, "group_id": 555,
            "time": 1_700_000_000
        });
        let Some(BotEvent::Poke { ctx, target_id }) = parse_event(&event, "") else {
            panic!("expected poke");
        };
        assert_eq!(target_id, "10000");
        assert_eq!(ctx.user_id, "42");
        assert_eq!(ctx.self_id, "10000");
        assert_eq!(ctx.conversation.group_id(), Some("555"));
        assert_eq!(ctx.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_private_poke_uses_fallback_self_id() {
        let event = json!({
            "post_type": "notice", "notice_type": "notify", "sub_type": "poke",
            "user_id": 42, "target_id": 777
        });
        let Some(BotEvent::Poke { ctx, .. }) = parse_event(&event, "777") else {
            panic!("expected poke");
        };
        assert_eq!(ctx.self_id, "777");
        assert!(ctx.conversation.is_direct());
    }

    #[test]
    fn test_group_message_with_card() {
        let event = json!({
            "post_type": "message", "message_type": "group", "self_id": 10000,
            "user_id": 42, "group_id": 555, "message_id": -12345,
            "raw_message": "hi [CQ:face,id=14]",
            "sender": { "nickname": "bob", "card": "Bob" },
            "time": 1
        });
        let Some(BotEvent::Message { ctx, content }) = parse_event(&event, "") else {
            panic!("expected message");
        };
        assert_eq!(content, "hi [CQ:face,id=14]");
        assert_eq!(ctx.display_name(), "Bob");
        assert_eq!(ctx.message_id.as_deref(), Some("-12345"));
    }

    #[test]
    fn test_array_message_converted() {
        let message = json!([
            { "type": "text", "data": { "text": "a[b]" } },
            { "type": "face", "data": { "id": "14" } },
            { "type": "at", "data": { "qq": 42, "name": null } }
        ]);
        assert_eq!(message_text(&message), "a&#91;b&#93;[CQ:face,id=14][CQ:at,qq=42]");
    }

    #[test]
    fn test_other_events_ignored() {
        let heartbeat = json!({ "post_type": "meta_event", "meta_event_type": "heartbeat" });
        assert!(parse_event(&heartbeat, "1").is_none());
        let recall = json!({ "post_type": "notice", "notice_type": "group_recall", "user_id": 1 });
        assert!(parse_event(&recall, "1").is_none());
    }
}
