//! `poke [target]`: poke someone back.

use std::sync::Arc;

use async_trait::async_trait;
use pokebot_core::error::Result;
use pokebot_core::traits::BotApi;
use pokebot_core::types::{Conversation, EventContext, id_param};

use crate::router::{Command, Invocation};
use crate::targets;

pub struct PokeCommand {
    api: Arc<dyn BotApi>,
}

impl PokeCommand {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self { api }
    }

    pub async fn poke(&self, conversation: &Conversation, user_id: &str) -> Result<()> {
        let (action, params) = match conversation {
            Conversation::Group { group_id } => (
                "group_poke",
                serde_json::json!({ "group_id": id_param(group_id), "user_id": id_param(user_id) }),
            ),
            Conversation::Private { .. } => (
                "friend_poke",
                serde_json::json!({ "user_id": id_param(user_id) }),
            ),
        };
        self.api.call(action, params).await?;
        Ok(())
    }
}

#[async_trait]
impl Command for PokeCommand {
    fn name(&self) -> &str {
        "poke"
    }

    fn usage(&self) -> &str {
        "poke [target]"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        let target = match invocation.arg(0) {
            Some(_) => targets::target_arg(invocation)?,
            None => ctx.user_id.clone(),
        };
        self.poke(&ctx.conversation, &target).await?;
        Ok(String::new())
    }
}
