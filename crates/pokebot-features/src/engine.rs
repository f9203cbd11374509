//! The assembled bot: responders, commands and batch schedules.

use std::sync::Arc;
use std::time::Duration;

use pokebot_core::PokebotConfig;
use pokebot_core::config::ScheduleConfig;
use pokebot_core::traits::{BotApi, MessageSink};
use pokebot_core::types::BotEvent;
use pokebot_responder::hitokoto::HitokotoClient;
use pokebot_responder::pixiv::PixivImages;
use pokebot_responder::{ActionDispatcher, PokeResponder, StickResponder, TemplateExpander};
use pokebot_scheduler::{TargetStore, schedule};

use crate::assets::PixivCommand;
use crate::likes::Likes;
use crate::poke::PokeCommand;
use crate::router::CommandRouter;
use crate::query::QueryCommand;
use crate::sign::Sign;
use crate::stick::StickCommand;
use crate::voice::VoiceCommand;

pub const TARGETS_FILE: &str = "targets.json";
pub const PIXIV_CACHE_FILE: &str = "pixiv.json";

pub struct BotEngine {
    poke: PokeResponder,
    stick: Arc<StickResponder>,
    router: Arc<CommandRouter>,
    sink: Arc<dyn MessageSink>,
    likes: Arc<Likes>,
    sign: Arc<Sign>,
    schedule_config: ScheduleConfig,
}

impl BotEngine {
    pub fn new(
        config: &PokebotConfig,
        api: Arc<dyn BotApi>,
        sink: Arc<dyn MessageSink>,
        store: Arc<TargetStore>,
    ) -> Self {
        let fetch_timeout = Duration::from_secs(config.template.fetch_timeout_secs);
        let mut expander = TemplateExpander::new().with_quotes(Arc::new(HitokotoClient::new(
            &config.template.hitokoto_url,
            fetch_timeout,
        )));
        let pixiv = config.template.pixiv_url.as_deref().map(|url| {
            Arc::new(PixivImages::new(
                url,
                config.data_path().join(PIXIV_CACHE_FILE),
                fetch_timeout,
            ))
        });
        if let Some(images) = &pixiv {
            expander = expander.with_images(images.clone());
        }

        let likes = Arc::new(Likes::new(
            &config.likes,
            config.command.max_repeat,
            api.clone(),
            store.clone(),
        ));
        let sign = Arc::new(Sign::new(&config.sign, api.clone(), store));
        let stick = Arc::new(StickResponder::new(&config.stick, api.clone()));

        let mut router = CommandRouter::new(Duration::from_secs(config.command.cooldown_secs));
        router.register(likes.clone());
        router.register(sign.clone());
        router.register(Arc::new(PokeCommand::new(api.clone())));
        router.register(Arc::new(StickCommand::new(stick.clone())));
        router.register(Arc::new(QueryCommand::new(api.clone())));
        router.register(Arc::new(VoiceCommand::new(api)));
        if let Some(images) = pixiv {
            router.register(Arc::new(PixivCommand::new(images)));
        }
        let router = Arc::new(router);

        let dispatcher = ActionDispatcher::new(router.clone(), sink.clone(), expander);
        let poke = PokeResponder::new(&config.poke, dispatcher);
        if poke.responses().is_empty() {
            tracing::info!("No poke responses configured");
        }

        Self {
            poke,
            stick,
            router,
            sink,
            likes,
            sign,
            schedule_config: config.schedule.clone(),
        }
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    pub fn likes(&self) -> &Arc<Likes> {
        &self.likes
    }

    pub fn sign(&self) -> &Arc<Sign> {
        &self.sign
    }

    /// Handle one inbound event. Never fails; problems are logged.
    pub async fn handle(&self, event: &BotEvent) {
        match event {
            BotEvent::Poke { .. } => {
                self.poke.handle(event).await;
            }
            BotEvent::Message { ctx, content } => {
                if ctx.is_self() {
                    return;
                }
                if let Some(reply) = self.router.handle_message(content, ctx).await {
                    if let Err(e) = self.sink.send(&ctx.conversation, &reply).await {
                        tracing::warn!("Failed to send command reply to {}: {e}", ctx.user_id);
                    }
                    return;
                }
                self.stick.handle(event).await;
            }
        }
    }

    /// Install the daily batch schedules for features whose mode asks for one.
    pub fn start_schedules(&self) {
        for runner in [self.likes.runner(), self.sign.runner()] {
            let strategy = schedule::from_config(&self.schedule_config);
            if !runner.start(strategy.as_ref()) {
                tracing::info!("[{}] Batch mode off, no schedule", runner.namespace());
            }
        }
    }

    pub fn dispose(&self) {
        self.likes.runner().dispose();
        self.sign.runner().dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::tests::ctx_at;
    use crate::testing::{FakeApi, temp_store};
    use async_trait::async_trait;
    use pokebot_core::config::BatchMode;
    use pokebot_core::error::Result;
    use pokebot_core::types::{Conversation, EventContext, ResponseCandidate};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Sink {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSink for Sink {
        async fn send(&self, _conversation: &Conversation, content: &str) -> Result<Vec<String>> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(vec!["1".into()])
        }
    }

    fn poke(ctx: EventContext) -> BotEvent {
        BotEvent::Poke {
            target_id: ctx.self_id.clone(),
            ctx,
        }
    }

    struct Harness {
        engine: BotEngine,
        api: Arc<FakeApi>,
        sink: Arc<Sink>,
        dir: PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    async fn engine(name: &str, config: PokebotConfig) -> Harness {
        let (store, dir) = temp_store(name).await;
        let api = Arc::new(FakeApi::default());
        let sink = Arc::new(Sink::default());
        let engine = BotEngine::new(&config, api.clone(), sink.clone(), store);
        Harness { engine, api, sink, dir }
    }

    #[tokio::test]
    async fn test_poke_runs_command_response_past_cooldown() {
        let mut config = PokebotConfig::default();
        config.command.cooldown_secs = 60;
        config.command.max_repeat = 1;
        config.poke.interval_ms = 0;
        config.poke.responses = vec![ResponseCandidate::command("zanwo", 100.0)];
        let Harness { engine, api, sink, .. } = &engine("engine-poke", config).await;

        engine.handle(&poke(ctx_at("42", 0))).await;
        engine.handle(&poke(ctx_at("42", 1))).await;
        assert_eq!(api.calls_to("send_like").len(), 2);
        assert_eq!(sink.sent.lock().unwrap().len(), 2);

        // The user's own command is still gated by cooldown afterwards.
        let typed = |ts| BotEvent::Message {
            ctx: ctx_at("42", ts),
            content: "zanwo".into(),
        };
        engine.handle(&typed(2)).await;
        engine.handle(&typed(3)).await;
        assert_eq!(api.calls_to("send_like").len(), 3);
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.last().map(String::as_str), Some("Slow down, try again in 60s."));
    }

    #[tokio::test]
    async fn test_message_keywords_get_reactions() {
        let mut config = PokebotConfig::default();
        config.stick.item_delay_ms = 0;
        config
            .stick
            .keywords
            .insert("nice".into(), "赞".into());
        let Harness { engine, api, sink, .. } = &engine("engine-stick", config).await;

        let msg = BotEvent::Message {
            ctx: ctx_at("42", 0),
            content: "nice one".into(),
        };
        engine.handle(&msg).await;
        assert_eq!(api.calls_to("set_msg_emoji_like").len(), 1);
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedules_follow_modes() {
        let mut config = PokebotConfig::default();
        config.likes.mode = BatchMode::Manual;
        config.sign.mode = BatchMode::Off;
        let Harness { engine, .. } = &engine("engine-schedules", config).await;

        engine.start_schedules();
        assert!(engine.likes().runner().is_scheduled());
        assert!(!engine.sign().runner().is_scheduled());
        engine.dispose();
        engine.dispose();
        assert!(!engine.likes().runner().is_scheduled());
    }
}
