//! Profile likes (`zanwo`).
//!
//! One "like" of a user is up to `max_repeat` `send_like` calls, stopping at
//! the first failure (usually the daily limit). It counts as a success when
//! at least one call went through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::config::LikesConfig;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::BotApi;
use pokebot_core::types::{EventContext, id_param};
use pokebot_scheduler::{BatchAction, BatchRunner, TargetStore};

use crate::router::{Command, Invocation};
use crate::targets;

pub const NAMESPACE: &str = "likes";

pub struct LikeAction {
    api: Arc<dyn BotApi>,
    times_per_call: u32,
    max_calls: u32,
}

impl LikeAction {
    pub fn new(api: Arc<dyn BotApi>, times_per_call: u32, max_calls: u32) -> Self {
        Self {
            api,
            times_per_call,
            max_calls: max_calls.max(1),
        }
    }

    /// Like `user_id`; returns how many `send_like` calls succeeded.
    pub async fn like(&self, user_id: &str) -> Result<u32> {
        let mut sent = 0;
        let mut last_error = None;
        for _ in 0..self.max_calls {
            let params = serde_json::json!({
                "user_id": id_param(user_id),
                "times": self.times_per_call,
            });
            match self.api.call("send_like", params).await {
                Ok(_) => sent += 1,
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }
        match last_error {
            Some(e) if sent == 0 => Err(e),
            _ => Ok(sent),
        }
    }
}

#[async_trait]
impl BatchAction for LikeAction {
    async fn run_one(&self, id: &str) -> Result<()> {
        self.like(id).await.map(|_| ())
    }

    async fn discover(&self) -> Result<Vec<String>> {
        self.api.friend_list().await
    }
}

/// The `zanwo` command and its daily batch.
pub struct Likes {
    action: Arc<LikeAction>,
    runner: Arc<BatchRunner>,
}

impl Likes {
    pub fn new(
        config: &LikesConfig,
        max_repeat: u32,
        api: Arc<dyn BotApi>,
        store: Arc<TargetStore>,
    ) -> Self {
        let action = Arc::new(LikeAction::new(api, config.times_per_call, max_repeat));
        let runner = Arc::new(BatchRunner::new(
            NAMESPACE,
            config.mode,
            store,
            action.clone(),
            Duration::from_millis(config.item_delay_ms),
        ));
        Self { action, runner }
    }

    pub fn runner(&self) -> &Arc<BatchRunner> {
        &self.runner
    }

    async fn like_reply(&self, user_id: &str) -> Result<String> {
        let calls = self.action.like(user_id).await?;
        Ok(format!(
            "Sent {} likes to {user_id}.",
            calls * self.action.times_per_call
        ))
    }
}

#[async_trait]
impl Command for Likes {
    fn name(&self) -> &str {
        "zanwo"
    }

    fn usage(&self) -> &str {
        "zanwo | zanwo.user <target> | zanwo.list | zanwo.add <target> | zanwo.remove <target> | zanwo.all | zanwo.clear"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        match invocation.sub() {
            None => self.like_reply(&ctx.user_id).await,
            Some("user") => {
                let target = targets::target_arg(invocation)?;
                if target == ctx.user_id {
                    return Err(PokebotError::Validation(
                        "that is your own id; use zanwo to like yourself".into(),
                    ));
                }
                self.like_reply(&target).await
            }
            Some(sub) => match targets::manage(&self.runner, "like", invocation).await {
                Some(reply) => reply,
                None => Err(PokebotError::Command(format!("unknown subcommand 'zanwo.{sub}'"))),
            },
        }
    }
}
