//! Action dispatch: executes a selected response.
//!
//! ```text
//! Idle → Selecting → Command → Done | Failed
//!                  → Message → Done | Failed
//! ```
//! Commands are re-entered through the router with `triggered_by_system`
//! set, so the router's cooldown neither blocks nor records them. Messages
//! are expanded and sent segment by segment, each send awaited before the
//! next. Errors never escape: they come back as [`DispatchOutcome::Failed`].

use std::sync::Arc;

use pokebot_core::error::Result;
use pokebot_core::traits::{CommandExecutor, MessageSink};
use pokebot_core::types::{EventContext, ResponseCandidate, ResponseKind};

use crate::template::{TemplateContext, TemplateExpander};

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Command ran; `replied` when it produced text that was sent back.
    Command { command: String, replied: bool },
    /// Message sent as `segments` separate messages.
    Message { segments: usize },
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DispatchOutcome::Failed { .. })
    }
}

/// Runs responses against the command router and the message sink.
#[derive(Clone)]
pub struct ActionDispatcher {
    executor: Arc<dyn CommandExecutor>,
    sink: Arc<dyn MessageSink>,
    expander: TemplateExpander,
}

impl ActionDispatcher {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        sink: Arc<dyn MessageSink>,
        expander: TemplateExpander,
    ) -> Self {
        Self {
            executor,
            sink,
            expander,
        }
    }

    pub fn expander(&self) -> &TemplateExpander {
        &self.expander
    }

    /// Execute `candidate` for the actor in `ctx`.
    pub async fn dispatch(&self, candidate: &ResponseCandidate, ctx: &EventContext) -> DispatchOutcome {
        let result = match candidate.kind {
            ResponseKind::Command => self
                .run_command(&candidate.content, ctx)
                .await
                .map(|replied| DispatchOutcome::Command {
                    command: candidate.content.clone(),
                    replied,
                }),
            ResponseKind::Message => self
                .send_message(&candidate.content, ctx)
                .await
                .map(|segments| DispatchOutcome::Message { segments }),
        };

        result.unwrap_or_else(|e| DispatchOutcome::Failed {
            reason: e.to_string(),
        })
    }

    async fn run_command(&self, command: &str, ctx: &EventContext) -> Result<bool> {
        let reply = self.executor.execute(command, ctx, true).await?;
        match reply {
            Some(text) if !text.trim().is_empty() => {
                self.sink.send(&ctx.conversation, &text).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn send_message(&self, template: &str, ctx: &EventContext) -> Result<usize> {
        let segments = self
            .expander
            .expand_segments(template, &TemplateContext::from(ctx))
            .await;
        for segment in &segments {
            self.sink.send(&ctx.conversation, segment).await?;
        }
        Ok(segments.len())
    }
}
