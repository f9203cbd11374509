//! Event and response types shared across crates.

use serde::{Deserialize, Serialize};

/// Where a message was received and where replies go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conversation {
    Private { user_id: String },
    Group { group_id: String },
}

impl Conversation {
    pub fn is_direct(&self) -> bool {
        matches!(self, Conversation::Private { .. })
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Conversation::Group { group_id } => Some(group_id),
            Conversation::Private { .. } => None,
        }
    }
}

/// Everything a handler knows about the actor behind an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Account the bot is logged in as.
    pub self_id: String,
    /// The actor that caused the event.
    pub user_id: String,
    /// Nickname or group card, if the platform sent one.
    pub display_name: Option<String>,
    pub conversation: Conversation,
    /// Message the event refers to (message events only).
    pub message_id: Option<String>,
    /// Event time in milliseconds since the epoch.
    pub timestamp_ms: i64,
}

impl EventContext {
    /// Display name, falling back to the raw user id.
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.user_id)
    }

    /// Whether the actor is the bot itself.
    pub fn is_self(&self) -> bool {
        self.user_id == self.self_id
    }
}

/// An inbound platform event the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// Someone poked `target_id`.
    Poke { ctx: EventContext, target_id: String },
    /// A chat message, content in CQ-code text form.
    Message { ctx: EventContext, content: String },
}

impl BotEvent {
    pub fn context(&self) -> &EventContext {
        match self {
            BotEvent::Poke { ctx, .. } | BotEvent::Message { ctx, .. } => ctx,
        }
    }
}

/// What a response does when selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Run a command through the command router.
    Command,
    /// Send an expanded message template.
    Message,
}

/// One configured response with its relative selection weight (0..=100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCandidate {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub content: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    50.0
}

impl ResponseCandidate {
    pub fn message(content: &str, weight: f64) -> Self {
        Self {
            kind: ResponseKind::Message,
            content: content.to_string(),
            weight,
        }
    }

    pub fn command(content: &str, weight: f64) -> Self {
        Self {
            kind: ResponseKind::Command,
            content: content.to_string(),
            weight,
        }
    }
}

/// JSON value for an id parameter: a number when it fits, the raw string otherwise.
pub fn id_param(id: &str) -> serde_json::Value {
    id.parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user: &str, name: Option<&str>) -> EventContext {
        EventContext {
            self_id: "10000".into(),
            user_id: user.into(),
            display_name: name.map(String::from),
            conversation: Conversation::Group {
                group_id: "555".into(),
            },
            message_id: None,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(ctx("42", Some("Bob")).display_name(), "Bob");
        assert_eq!(ctx("42", None).display_name(), "42");
        assert_eq!(ctx("42", Some("")).display_name(), "42");
    }

    #[test]
    fn test_id_param() {
        assert_eq!(id_param("123"), serde_json::json!(123));
        assert_eq!(id_param("abc"), serde_json::json!("abc"));
    }

    #[test]
    fn test_candidate_from_toml_shape() {
        let c: ResponseCandidate =
            serde_json::from_str(r#"{"type":"command","content":"zanwo","weight":30}"#).unwrap();
        assert_eq!(c.kind, ResponseKind::Command);
        assert_eq!(c.weight, 30.0);
    }
}
