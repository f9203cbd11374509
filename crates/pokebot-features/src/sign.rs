//! Group check-in (`gsign`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::config::SignConfig;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::BotApi;
use pokebot_core::types::{EventContext, id_param};
use pokebot_scheduler::{BatchAction, BatchRunner, TargetStore, is_valid_id};

use crate::router::{Command, Invocation};
use crate::targets;

pub const NAMESPACE: &str = "sign";

pub struct SignAction {
    api: Arc<dyn BotApi>,
}

impl SignAction {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self { api }
    }

    pub async fn sign(&self, group_id: &str) -> Result<()> {
        self.api
            .call(
                "send_group_sign",
                serde_json::json!({ "group_id": id_param(group_id) }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BatchAction for SignAction {
    async fn run_one(&self, id: &str) -> Result<()> {
        self.sign(id).await
    }

    async fn discover(&self) -> Result<Vec<String>> {
        self.api.group_list().await
    }
}

/// The `gsign` command and its daily batch.
pub struct Sign {
    action: Arc<SignAction>,
    runner: Arc<BatchRunner>,
}

impl Sign {
    pub fn new(config: &SignConfig, api: Arc<dyn BotApi>, store: Arc<TargetStore>) -> Self {
        let action = Arc::new(SignAction::new(api));
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

    async fn sign_reply(&self, group_id: &str) -> Result<String> {
        self.action.sign(group_id).await?;
        Ok(format!("Checked in to group {group_id}."))
    }
}

#[async_trait]
impl Command for Sign {
    fn name(&self) -> &str {
        "gsign"
    }

    fn usage(&self) -> &str {
        "gsign | gsign.group <group> | gsign.list | gsign.add <group> | gsign.remove <group> | gsign.all | gsign.clear"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        match invocation.sub() {
            None => match ctx.conversation.group_id() {
                Some(group_id) => self.sign_reply(group_id).await,
                None => Err(PokebotError::Validation(
                    "not in a group; use gsign.group <group>".into(),
                )),
            },
            Some("group") => match invocation.arg(0) {
                Some(group_id) if is_valid_id(group_id) => self.sign_reply(group_id).await,
                _ => Err(PokebotError::Validation("usage: gsign.group <group id>".into())),
            },
            Some(sub) => match targets::manage(&self.runner, "check-in", invocation).await {
                Some(reply) => reply,
                None => Err(PokebotError::Command(format!("unknown subcommand 'gsign.{sub}'"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::tests::ctx_at;
    use crate::testing::{FakeApi, temp_store};
    use pokebot_core::config::BatchMode;
    use pokebot_core::types::Conversation;

    fn config(mode: BatchMode) -> SignConfig {
        SignConfig {
            mode,
            item_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_sign_current_group() {
        let (store, dir) = temp_store("sign-current").await;
        let api = Arc::new(FakeApi::default());
        let sign = Sign::new(&config(BatchMode::Off), api.clone(), store);

        let reply = sign
            .run(&Invocation::parse("gsign").unwrap(), &ctx_at("42", 0))
            .await
            .unwrap();
        assert_eq!(reply, "Checked in to group 555.");
        assert_eq!(
            api.calls_to("send_group_sign"),
            vec![serde_json::json!({"group_id": 555})]
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_sign_in_private_needs_group() {
        let (store, dir) = temp_store("sign-private").await;
        let sign = Sign::new(&config(BatchMode::Off), Arc::new(FakeApi::default()), store);
        let ctx = EventContext {
            conversation: Conversation::Private {
                user_id: "42".into(),
            },
            ..ctx_at("42", 0)
        };

        assert!(sign.run(&Invocation::parse("gsign").unwrap(), &ctx).await.is_err());
        let reply = sign
            .run(&Invocation::parse("gsign.group 777").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(reply, "Checked in to group 777.");
        assert!(
            sign.run(&Invocation::parse("gsign.group abc").unwrap(), &ctx)
                .await
                .is_err()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_auto_mode_discovers_groups_and_tolerates_failures() {
        let (store, dir) = temp_store("sign-auto").await;
        store.add(NAMESPACE, "999").await;
        let api = Arc::new(
            FakeApi::failing(|action, p| action == "send_group_sign" && p["group_id"] == 2)
                .with_data(
                    "get_group_list",
                    serde_json::json!([{"group_id": 1}, {"group_id": 2}, {"group_id": 3}]),
                ),
        );
        let sign = Sign::new(&config(BatchMode::Auto), api.clone(), store);

        let report = sign.runner().run_batch().await;
        assert_eq!(report.to_string(), "2/3");
        let signed: Vec<_> = api
            .calls_to("send_group_sign")
            .iter()
            .map(|p| p["group_id"].clone())
            .collect();
        assert_eq!(signed, vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
