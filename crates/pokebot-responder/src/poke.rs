//! Poke notice responder.
//!
//! When someone pokes the bot, pick one configured response by weight and run
//! it. Repeated pokes from the same actor inside `interval_ms` are ignored
//! before anything is selected.

use std::sync::Mutex;

use pokebot_core::config::PokeConfig;
use pokebot_core::types::BotEvent;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::debounce::DebounceGuard;
use crate::dispatch::{ActionDispatcher, DispatchOutcome};
use crate::selector::ResponseSet;

pub struct PokeResponder {
    responses: ResponseSet,
    interval_ms: i64,
    guard: DebounceGuard,
    dispatcher: ActionDispatcher,
    rng: Mutex<StdRng>,
}

impl PokeResponder {
    pub fn new(config: &PokeConfig, dispatcher: ActionDispatcher) -> Self {
        Self {
            responses: ResponseSet::new(config.responses.clone()),
            interval_ms: config.interval_ms,
            guard: DebounceGuard::new("poke"),
            dispatcher,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source (seeded runs in tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    /// Handle one event. `None` when the event is not a poke at the bot, is
    /// debounced, or there is nothing configured to respond with.
    pub async fn handle(&self, event: &BotEvent) -> Option<DispatchOutcome> {
        let BotEvent::Poke { ctx, target_id } = event else {
            return None;
        };
        if *target_id != ctx.self_id || self.responses.is_empty() {
            return None;
        }
        if !self.guard.allow(&ctx.user_id, ctx.timestamp_ms, self.interval_ms) {
            return None;
        }

        let candidate = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            self.responses.pick(&mut *rng).cloned()
        }?;

        let outcome = self.dispatcher.dispatch(&candidate, ctx).await;
        match &outcome {
            DispatchOutcome::Failed { reason } => {
                tracing::warn!("Poke response for {} failed: {reason}", ctx.user_id)
            }
            ok => tracing::debug!("Poke response for {}: {ok:?}", ctx.user_id),
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::{RecordingExecutor, RecordingSink, ctx};
    use crate::template::TemplateExpander;
    use pokebot_core::types::{EventContext, ResponseCandidate};
    use std::sync::Arc;

    fn poke_at(target: &str, ts: i64) -> BotEvent {
        BotEvent::Poke {
            ctx: EventContext {
                timestamp_ms: ts,
                ..ctx()
            },
            target_id: target.into(),
        }
    }

    fn responder(
        responses: Vec<ResponseCandidate>,
        interval_ms: i64,
    ) -> (PokeResponder, Arc<RecordingSink>, Arc<RecordingExecutor>) {
        let sink = Arc::new(RecordingSink::default());
        let exec = Arc::new(RecordingExecutor::default());
        let dispatcher = ActionDispatcher::new(exec.clone(), sink.clone(), TemplateExpander::new());
        let config = PokeConfig {
            interval_ms,
            responses,
        };
        let responder = PokeResponder::new(&config, dispatcher).with_rng(StdRng::seed_from_u64(11));
        (responder, sink, exec)
    }

    #[tokio::test]
    async fn test_poke_at_bot_sends_message() {
        let (r, sink, _) = responder(vec![ResponseCandidate::message("{at} stop it", 100.0)], 1000);
        let outcome = r.handle(&poke_at("10000", 0)).await;
        assert_eq!(outcome, Some(DispatchOutcome::Message { segments: 1 }));
        assert_eq!(*sink.sent.lock().unwrap(), vec!["[CQ:at,qq=42] stop it".to_string()]);
    }

    #[tokio::test]
    async fn test_poke_at_someone_else_ignored() {
        let (r, sink, _) = responder(vec![ResponseCandidate::message("hi", 100.0)], 1000);
        assert!(r.handle(&poke_at("20000", 0)).await.is_none());
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_debounced_poke_has_no_side_effects() {
        let (r, sink, _) = responder(vec![ResponseCandidate::message("hi", 100.0)], 1000);
        assert!(r.handle(&poke_at("10000", 0)).await.is_some());
        assert!(r.handle(&poke_at("10000", 999)).await.is_none());
        assert!(r.handle(&poke_at("10000", 1000)).await.is_some());
        assert_eq!(sink.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_command_response_is_system_triggered() {
        let (r, _, exec) = responder(vec![ResponseCandidate::command("zanwo", 100.0)], 0);
        r.handle(&poke_at("10000", 0)).await;
        r.handle(&poke_at("10000", 0)).await;
        assert_eq!(
            *exec.calls.lock().unwrap(),
            vec![("zanwo".to_string(), true), ("zanwo".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_no_responses_is_noop() {
        let (r, sink, exec) = responder(vec![], 1000);
        assert!(r.handle(&poke_at("10000", 0)).await.is_none());
        assert!(sink.sent.lock().unwrap().is_empty());
        assert!(exec.calls.lock().unwrap().is_empty());
    }
}
