//! `stick [emoji...]` and `stick.random [n]` react to the command message.
//! `stick.list [keyword]` shows the named emojis; `stick.dice [n]` and
//! `stick.rps [hand]` reply with a dice or rock-paper-scissors segment.

use std::sync::Arc;

use async_trait::async_trait;
use pokebot_core::cq;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::types::EventContext;
use pokebot_responder::StickResponder;
use pokebot_responder::stick::{
    DEFAULT_EMOJI, MAX_RANDOM_REACTIONS, resolve_emoji_id, search_emojis,
};

use crate::router::{Command, Invocation};

const DEFAULT_RANDOM_COUNT: usize = 5;

/// Emojis per line in `stick.list`.
const LIST_ROW: usize = 5;

/// Named emojis, five per line.
fn emoji_list(keyword: Option<&str>) -> String {
    let found = search_emojis(keyword);
    if found.is_empty() {
        return match keyword {
            Some(k) => format!("No emoji matching \"{k}\"."),
            None => "No named emojis.".to_string(),
        };
    }
    let rows: Vec<String> = found
        .chunks(LIST_ROW)
        .map(|row| {
            row.iter()
                .map(|(name, id)| format!("{name}({id})"))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect();
    let header = match keyword {
        Some(k) => format!("Emojis matching \"{k}\" ({}):", found.len()),
        None => format!("Emojis ({}):", found.len()),
    };
    format!("{header}\n{}", rows.join("\n"))
}

/// Dice face to show, clamped to 1..=6.
fn dice_value(arg: Option<&str>) -> Result<Option<u8>> {
    let Some(raw) = arg else {
        return Ok(None);
    };
    let n: i64 = raw
        .parse()
        .map_err(|_| PokebotError::Validation(format!("'{raw}' is not a number")))?;
    Ok(Some(n.clamp(1, 6) as u8))
}

/// Hand to show: 1 paper, 2 scissors, 3 rock.
fn rps_value(arg: Option<&str>) -> Result<Option<u8>> {
    let Some(raw) = arg else {
        return Ok(None);
    };
    let value = match raw.to_lowercase().as_str() {
        "1" | "布" | "paper" => 1,
        "2" | "剪刀" | "scissors" => 2,
        "3" | "石头" | "拳头" | "rock" => 3,
        _ => {
            return Err(PokebotError::Validation(format!(
                "unsupported hand '{raw}', use 1-3 or paper/scissors/rock"
            )));
        }
    };
    Ok(Some(value))
}

pub struct StickCommand {
    responder: Arc<StickResponder>,
}

impl StickCommand {
    pub fn new(responder: Arc<StickResponder>) -> Self {
        Self { responder }
    }

    fn emojis(invocation: &Invocation) -> Result<Vec<String>> {
        match invocation.sub() {
            None if invocation.args.is_empty() => Ok(vec![DEFAULT_EMOJI.to_string()]),
            None => invocation
                .args
                .iter()
                .map(|a| {
                    resolve_emoji_id(a)
                        .ok_or_else(|| PokebotError::Validation(format!("unknown emoji '{a}'")))
                })
                .collect(),
            Some("random") => {
                let count = match invocation.arg(0) {
                    Some(n) => n.parse::<usize>().map_err(|_| {
                        PokebotError::Validation(format!("'{n}' is not a number"))
                    })?,
                    None => DEFAULT_RANDOM_COUNT,
                };
                Ok(StickResponder::random_emojis(count.clamp(1, MAX_RANDOM_REACTIONS)))
            }
            Some(sub) => Err(PokebotError::Command(format!("unknown subcommand 'stick.{sub}'"))),
        }
    }
}

#[async_trait]
impl Command for StickCommand {
    fn name(&self) -> &str {
        "stick"
    }

    fn usage(&self) -> &str {
        "stick [emoji...] | stick.random [n] | stick.list [keyword] | stick.dice [n] | stick.rps [hand]"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        match invocation.sub() {
            Some("list") => return Ok(emoji_list(invocation.arg(0))),
            Some("dice") => return Ok(cq::dice(dice_value(invocation.arg(0))?)),
            Some("rps") => return Ok(cq::rps(rps_value(invocation.arg(0))?)),
            _ => {}
        }
        let message_id = ctx
            .message_id
            .as_deref()
            .ok_or_else(|| PokebotError::Validation("no message to react to".into()))?;
        let emojis = Self::emojis(invocation)?;
        let added = self.responder.react_all(message_id, &emojis).await;
        if added == 0 {
            return Err(PokebotError::Api("no reaction could be added".into()));
        }
        Ok(String::new())
    }
}
