//! AI voice messages (`aisay`).
//!
//! `aisay` speaks in the group, `aisay.text` replies with the generated audio,
//! `aisay.list` names the voices and `aisay.view` plays a voice's preview.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pokebot_core::cq;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::BotApi;
use pokebot_core::types::{EventContext, id_param};
use serde_json::Value;

use crate::router::{Command, Invocation};

pub const CHARACTER_PREFIX: &str = "lucy-voice-";

/// Chat types `get_ai_characters` is queried with.
const CHAT_TYPES: [u8; 2] = [1, 2];

/// Character id with the voice prefix added when missing.
pub fn character_id(input: &str) -> String {
    if input.starts_with(CHARACTER_PREFIX) {
        input.to_string()
    } else {
        format!("{CHARACTER_PREFIX}{input}")
    }
}

/// One AI voice as listed by `get_ai_characters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub preview_url: Option<String>,
}

impl Character {
    fn matches(&self, key: &str) -> bool {
        self.id == key || self.id.trim_start_matches(CHARACTER_PREFIX) == key || self.name == key
    }
}

const USAGE_SAY: &str = "usage: aisay <character> <text>";
const USAGE_TEXT: &str = "usage: aisay.text <character> <text>";

/// Split `rest` into a character and non-empty text.
fn character_and_text<'a>(invocation: &'a Invocation, usage: &str) -> Result<(&'a str, &'a str)> {
    invocation
        .rest
        .split_once(char::is_whitespace)
        .map(|(character, text)| (character, text.trim()))
        .filter(|(_, text)| !text.is_empty())
        .ok_or_else(|| PokebotError::Validation(usage.into()))
}

pub struct VoiceCommand {
    api: Arc<dyn BotApi>,
}

impl VoiceCommand {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self { api }
    }

    pub async fn say(&self, group_id: &str, character: &str, text: &str) -> Result<()> {
        self.api
            .call(
                "send_group_ai_record",
                serde_json::json!({
                    "group_id": id_param(group_id),
                    "character": character_id(character),
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    /// Generated audio for `text` without sending it; returns the audio location.
    pub async fn record(&self, group_id: &str, character: &str, text: &str) -> Result<String> {
        let data = self
            .api
            .call(
                "get_ai_record",
                serde_json::json!({
                    "group_id": id_param(group_id),
                    "character": character_id(character),
                    "text": text,
                }),
            )
            .await?;
        match data.as_str() {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(PokebotError::Api("get_ai_record returned no audio".into())),
        }
    }

    /// Available characters keyed by id, merged over both chat types.
    pub async fn characters(&self, group_id: &str) -> Result<BTreeMap<String, Character>> {
        let mut merged = BTreeMap::new();
        let mut last_error = None;
        for chat_type in CHAT_TYPES {
            let params = serde_json::json!({ "group_id": id_param(group_id), "chat_type": chat_type });
            match self.api.call("get_ai_characters", params).await {
                Ok(data) => collect_characters(&data, &mut merged),
                Err(e) => {
                    tracing::warn!("get_ai_characters (chat_type {chat_type}) failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if merged.is_empty() => Err(e),
            _ => Ok(merged),
        }
    }
}

/// `data` is `[{"type": ..., "characters": [{"character_id", "character_name", "preview_url"}]}]`.
fn collect_characters(data: &Value, into: &mut BTreeMap<String, Character>) {
    let Some(groups) = data.as_array() else {
        return;
    };
    for character in groups
        .iter()
        .filter_map(|g| g["characters"].as_array())
        .flatten()
    {
        let Some(id) = character["character_id"].as_str() else {
            continue;
        };
        into.entry(id.to_string()).or_insert_with(|| Character {
            id: id.to_string(),
            name: character["character_name"].as_str().unwrap_or(id).to_string(),
            preview_url: character["preview_url"]
                .as_str()
                .filter(|u| !u.is_empty())
                .map(String::from),
        });
    }
}

#[async_trait]
impl Command for VoiceCommand {
    fn name(&self) -> &str {
        "aisay"
    }

    fn usage(&self) -> &str {
        "aisay <character> <text> | aisay.text <character> <text> | aisay.list | aisay.view <character>"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        let group_id = ctx
            .conversation
            .group_id()
            .ok_or_else(|| PokebotError::Validation("AI voice only works in groups".into()))?;

        match invocation.sub() {
            None => {
                let (character, text) = character_and_text(invocation, USAGE_SAY)?;
                self.say(group_id, character, text).await?;
                Ok(String::new())
            }
            Some("text") => {
                let (character, text) = character_and_text(invocation, USAGE_TEXT)?;
                let audio = self.record(group_id, character, text).await?;
                Ok(cq::record(&audio))
            }
            Some("list") => {
                let characters = self.characters(group_id).await?;
                if characters.is_empty() {
                    return Ok("No AI voices available.".into());
                }
                let lines: Vec<String> = characters
                    .values()
                    .map(|c| format!("{}: {}", c.name, c.id.trim_start_matches(CHARACTER_PREFIX)))
                    .collect();
                Ok(format!("AI voices ({}):\n{}", lines.len(), lines.join("\n")))
            }
            Some("view") => {
                let key = invocation
                    .arg(0)
                    .ok_or_else(|| PokebotError::Validation("usage: aisay.view <character>".into()))?;
                let characters = self.characters(group_id).await?;
                let character = characters
                    .values()
                    .find(|c| c.matches(key))
                    .ok_or_else(|| PokebotError::Validation(format!("no AI voice '{key}'")))?;
                let preview = character.preview_url.as_deref().ok_or_else(|| {
                    PokebotError::Api(format!("AI voice '{}' has no preview", character.name))
                })?;
                Ok(cq::record(preview))
            }
            Some(sub) => Err(PokebotError::Command(format!("unknown subcommand 'aisay.{sub}'"))),
        }
    }
}
