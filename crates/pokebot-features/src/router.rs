//! Built-in command router.
//!
//! Commands are `name[.sub] [args...]`, e.g. `zanwo.add [CQ:at,qq=123]`.
//! Human-issued commands pass the per-actor cooldown; commands re-entered
//! from an automatic response (`triggered_by_system`) skip it and leave no
//! trace in it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::CommandExecutor;
use pokebot_core::types::EventContext;
use pokebot_responder::CooldownGuard;
use pokebot_responder::debounce::CooldownDecision;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub root: String,
    pub sub: Option<String>,
    pub args: Vec<String>,
    /// Everything after the command word, whitespace preserved.
    pub rest: String,
}

impl Invocation {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let input = input.strip_prefix('/').unwrap_or(input);
        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };
        if word.is_empty() {
            return None;
        }
        let (root, sub) = match word.split_once('.') {
            Some((root, sub)) => (root, Some(sub.to_string())),
            None => (word, None),
        };
        Some(Self {
            root: root.to_string(),
            sub,
            args: rest.split_whitespace().map(String::from).collect(),
            rest: rest.to_string(),
        })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn sub(&self) -> Option<&str> {
        self.sub.as_deref()
    }
}

/// One named command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Command word, without subcommand.
    fn name(&self) -> &str;

    fn usage(&self) -> &str;

    /// Run the command; the returned text (possibly empty) is the reply.
    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String>;
}

pub struct CommandRouter {
    commands: Vec<Arc<dyn Command>>,
    cooldown: CooldownGuard,
}

impl CommandRouter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            commands: Vec::new(),
            cooldown: CooldownGuard::new(cooldown),
        }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        tracing::debug!("Command registered: {}", command.name());
        self.commands.push(command);
    }

    pub fn find(&self, name: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    pub fn usages(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.usage()).collect()
    }

    /// Whether `content` starts with a registered command word.
    pub fn is_command(&self, content: &str) -> bool {
        Invocation::parse(content).is_some_and(|inv| self.find(&inv.root).is_some())
    }

    pub fn cooldown(&self) -> &CooldownGuard {
        &self.cooldown
    }

    /// Run a command typed by a user. Failures become reply text.
    pub async fn handle_message(&self, content: &str, ctx: &EventContext) -> Option<String> {
        if !self.is_command(content) {
            return None;
        }
        match self.execute(content, ctx, false).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Command '{content}' from {} failed: {e}", ctx.user_id);
                Some(format!("Failed: {}", user_message(&e)))
            }
        }
    }
}

/// Error text without the variant prefix.
fn user_message(e: &PokebotError) -> String {
    match e {
        PokebotError::Validation(m) | PokebotError::Command(m) | PokebotError::Api(m) => m.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CommandExecutor for CommandRouter {
    async fn execute(
        &self,
        command: &str,
        ctx: &EventContext,
        triggered_by_system: bool,
    ) -> Result<Option<String>> {
        let invocation = Invocation::parse(command)
            .ok_or_else(|| PokebotError::Command("empty command".into()))?;
        let handler = self
            .find(&invocation.root)
            .ok_or_else(|| PokebotError::Command(format!("unknown command '{}'", invocation.root)))?;

        match self
            .cooldown
            .check(&ctx.user_id, ctx.timestamp_ms, triggered_by_system)
        {
            CooldownDecision::Cooling { remaining_ms } => {
                tracing::debug!("Command '{command}' from {} cooling down", ctx.user_id);
                let secs = (remaining_ms + 999) / 1000;
                return Ok(Some(format!("Slow down, try again in {secs}s.")));
            }
            CooldownDecision::Bypassed => {
                tracing::debug!("Command '{command}' issued by an automatic response")
            }
            CooldownDecision::Allowed => {}
        }

        let reply = handler.run(&invocation, ctx).await?;
        Ok((!reply.trim().is_empty()).then_some(reply))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pokebot_core::types::Conversation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn ctx_at(user: &str, ts: i64) -> EventContext {
        EventContext {
            self_id: "10000".into(),
            user_id: user.into(),
            display_name: None,
            conversation: Conversation::Group {
                group_id: "555".into(),
            },
            message_id: Some("321".into()),
            timestamp_ms: ts,
        }
    }

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Command for Counter {
        fn name(&self) -> &str {
            "count"
        }

        fn usage(&self) -> &str {
            "count"
        }

        async fn run(&self, invocation: &Invocation, _ctx: &EventContext) -> Result<String> {
            if invocation.sub() == Some("fail") {
                return Err(PokebotError::Validation("nope".into()));
            }
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("run {n}"))
        }
    }

    fn router(cooldown_secs: u64) -> (CommandRouter, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        let mut router = CommandRouter::new(Duration::from_secs(cooldown_secs));
        router.register(counter.clone());
        (router, counter)
    }

    #[test]
    fn test_parse_invocation() {
        let inv = Invocation::parse("  /zanwo.add  [CQ:at,qq=1]  x ").unwrap();
        assert_eq!(inv.root, "zanwo");
        assert_eq!(inv.sub(), Some("add"));
        assert_eq!(inv.args, vec!["[CQ:at,qq=1]", "x"]);
        assert_eq!(inv.rest, "[CQ:at,qq=1]  x");

        let inv = Invocation::parse("aisay voice hello  world").unwrap();
        assert_eq!(inv.sub(), None);
        assert_eq!(inv.rest, "voice hello  world");
        assert!(Invocation::parse("   ").is_none());
    }

    #[tokio::test]
    async fn test_system_trigger_bypasses_cooldown_without_recording() {
        let (router, counter) = router(60);

        assert!(router.execute("count", &ctx_at("42", 0), true).await.is_ok());
        assert!(router.execute("count", &ctx_at("42", 10), true).await.is_ok());
        assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
        assert_eq!(router.cooldown().last_used("42"), None);

        // A human command right afterwards is still subject to cooldown.
        let reply = router.execute("count", &ctx_at("42", 20), false).await.unwrap();
        assert_eq!(reply.as_deref(), Some("run 3"));
        let reply = router.execute("count", &ctx_at("42", 30), false).await.unwrap();
        assert_eq!(reply.as_deref(), Some("Slow down, try again in 60s."));
        assert_eq!(counter.runs.load(Ordering::SeqCst), 3);

        // Automatic responses are never blocked by it either.
        assert!(router.execute("count", &ctx_at("42", 40), true).await.is_ok());
        assert_eq!(counter.runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cooldown_is_per_actor() {
        let (router, counter) = router(60);
        router.execute("count", &ctx_at("1", 0), false).await.unwrap();
        router.execute("count", &ctx_at("2", 0), false).await.unwrap();
        assert_eq!(counter.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_command_is_an_error() {
        let (router, _) = router(0);
        assert!(router.execute("nothing", &ctx_at("1", 0), false).await.is_err());
        assert!(!router.is_command("hello there"));
        assert!(router.handle_message("hello there", &ctx_at("1", 0)).await.is_none());
    }

    #[tokio::test]
    async fn test_handle_message_turns_errors_into_text() {
        let (router, _) = router(0);
        let reply = router.handle_message("count.fail", &ctx_at("1", 0)).await;
        assert_eq!(reply.as_deref(), Some("Failed: nope"));
        let reply = router.handle_message("count", &ctx_at("1", 0)).await;
        assert_eq!(reply.as_deref(), Some("run 1"));
    }
}
