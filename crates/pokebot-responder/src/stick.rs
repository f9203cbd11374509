//! Emoji reactions ("stick") on incoming messages.
//!
//! A message that carries face segments, or text matching a configured
//! keyword, gets emoji reactions attached via `set_msg_emoji_like`. Reactions
//! are sent one after another with a pause in between; one failed reaction
//! does not stop the rest.

use std::sync::Arc;
use std::time::Duration;

use pokebot_core::config::StickConfig;
use pokebot_core::cq;
use pokebot_core::error::Result;
use pokebot_core::traits::BotApi;
use pokebot_core::types::{BotEvent, id_param};
use rand::seq::SliceRandom;

use crate::debounce::DebounceGuard;

/// Reaction used when nothing else resolves.
pub const DEFAULT_EMOJI: &str = "76";

/// Most reactions a single random-reaction request may add.
pub const MAX_RANDOM_REACTIONS: usize = 20;

/// Named QQ faces usable as reaction ids (a common subset).
pub const EMOJI_NAMES: &[(&str, &str)] = &[
    ("赞", "76"),
    ("微笑", "14"),
    ("呲牙", "13"),
    ("得意", "4"),
    ("流泪", "5"),
    ("可爱", "21"),
    ("疑问", "32"),
    ("拥抱", "49"),
    ("玫瑰", "63"),
    ("爱心", "66"),
    ("鼓掌", "99"),
    ("OK", "124"),
    ("喝彩", "144"),
    ("斜眼笑", "178"),
    ("doge", "179"),
    ("汪汪", "277"),
    ("喵喵", "307"),
    ("崇拜", "318"),
    ("庆祝", "320"),
];

/// Resolve an emoji name or numeric id to a reaction id.
pub fn resolve_emoji_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some((_, id)) = EMOJI_NAMES.iter().find(|(name, _)| *name == input) {
        return Some((*id).to_string());
    }
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }
    None
}

/// Named emojis whose name contains `keyword` (all of them for `None`), sorted by name.
pub fn search_emojis(keyword: Option<&str>) -> Vec<(&'static str, &'static str)> {
    let mut found: Vec<_> = EMOJI_NAMES
        .iter()
        .filter(|(name, _)| keyword.is_none_or(|k| name.contains(k)))
        .copied()
        .collect();
    found.sort_by(|a, b| a.0.cmp(b.0));
    found
}

pub struct StickResponder {
    config: StickConfig,
    guard: DebounceGuard,
    api: Arc<dyn BotApi>,
}

impl StickResponder {
    pub fn new(config: &StickConfig, api: Arc<dyn BotApi>) -> Self {
        Self {
            config: config.clone(),
            guard: DebounceGuard::new("message-emoji"),
            api,
        }
    }

    /// Reaction ids a message should receive, in order, without duplicates.
    pub fn emojis_for(&self, content: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let segments = cq::parse(content);

        if self.config.react_to_faces {
            for seg in &segments {
                if let Some(id) = seg.param("face", "id")
                    && !ids.iter().any(|x| x == id)
                {
                    ids.push(id.to_string());
                }
            }
        }

        let text: String = segments
            .iter()
            .filter_map(|s| match s {
                cq::Segment::Text(t) => Some(t.as_str()),
                cq::Segment::Code { .. } => None,
            })
            .collect();
        for (keyword, emoji) in &self.config.keywords {
            if keyword.is_empty() || !text.contains(keyword.as_str()) {
                continue;
            }
            match resolve_emoji_id(emoji) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => tracing::warn!("Keyword '{keyword}' maps to unknown emoji '{emoji}'"),
            }
        }
        ids
    }

    /// React to a message event. Returns how many reactions were added.
    pub async fn handle(&self, event: &BotEvent) -> usize {
        let BotEvent::Message { ctx, content } = event else {
            return 0;
        };
        if !self.config.enabled || ctx.is_self() {
            return 0;
        }
        let Some(message_id) = ctx.message_id.as_deref() else {
            return 0;
        };

        let emojis = self.emojis_for(content);
        if emojis.is_empty() {
            return 0;
        }
        if !self
            .guard
            .allow(&ctx.user_id, ctx.timestamp_ms, self.config.interval_ms)
        {
            return 0;
        }

        self.react_all(message_id, &emojis).await
    }

    /// Add every reaction in `emoji_ids` to `message_id`, pacing between them.
    pub async fn react_all(&self, message_id: &str, emoji_ids: &[String]) -> usize {
        let mut added = 0;
        for (i, emoji_id) in emoji_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.item_delay_ms)).await;
            }
            match self.react(message_id, emoji_id).await {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!("Reaction {emoji_id} on message {message_id} failed: {e}"),
            }
        }
        added
    }

    pub async fn react(&self, message_id: &str, emoji_id: &str) -> Result<()> {
        self.api
            .call(
                "set_msg_emoji_like",
                serde_json::json!({
                    "message_id": id_param(message_id),
                    "emoji_id": emoji_id,
                }),
            )
            .await?;
        Ok(())
    }

    /// Up to `count` distinct random reaction ids (capped at [`MAX_RANDOM_REACTIONS`]).
    pub fn random_emojis(count: usize) -> Vec<String> {
        let mut ids: Vec<&str> = EMOJI_NAMES.iter().map(|(_, id)| *id).collect();
        ids.shuffle(&mut rand::thread_rng());
        ids.into_iter()
            .take(count.min(MAX_RANDOM_REACTIONS))
            .map(String::from)
            .collect()
    }
}
