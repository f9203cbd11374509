//! Response template expansion.
//!
//! Placeholders:
//! - `{at}`: mention of the actor
//! - `{username}`: display name, or the actor id
//! - `{image:<url>}`: inline image
//! - `{hitokoto}` / `{hitokoto:<query>}`: fetched quotation
//! - `{pixiv}`: random image from the cached asset list, embedded as base64
//! - `{~}`: segment separator; each segment is sent as its own message
//!
//! Network placeholders are resolved concurrently and substituted by position.
//! A failed placeholder becomes an empty string; the rest still expands.
//! Unrecognized `{...}` text is left untouched.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::future::join_all;
use pokebot_core::cq;
use pokebot_core::error::Result;
use pokebot_core::types::EventContext;
use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(at|username|~|pixiv|image:([^{}]+)|hitokoto(?::([^{}]*))?)\}")
        .expect("placeholder regex")
});

/// Source of short quotations for `{hitokoto}`.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch one quotation; `query` is the raw text after `hitokoto:`.
    async fn fetch_quote(&self, query: &str) -> Result<String>;
}

/// Source of random images for `{pixiv}`.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// A ready-to-send image segment.
    async fn random_image(&self) -> Result<String>;
}

/// The actor a template is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    pub actor_id: String,
    pub display_name: Option<String>,
}

impl TemplateContext {
    pub fn new(actor_id: &str, display_name: Option<&str>) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            display_name: display_name.map(String::from),
        }
    }

    fn username(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.actor_id)
    }
}

impl From<&EventContext> for TemplateContext {
    fn from(ctx: &EventContext) -> Self {
        Self {
            actor_id: ctx.user_id.clone(),
            display_name: ctx.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    At,
    Username,
    Image(String),
    Hitokoto(String),
    Pixiv,
    Separator,
}

fn tokenize(template: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            pieces.push(Piece::Text(template[last..whole.start()].to_string()));
        }
        last = whole.end();

        let name = caps.get(1).map_or("", |m| m.as_str());
        let piece = if let Some(url) = caps.get(2) {
            Piece::Image(url.as_str().trim().to_string())
        } else if name.starts_with("hitokoto") {
            Piece::Hitokoto(caps.get(3).map_or("", |m| m.as_str()).to_string())
        } else {
            match name {
                "at" => Piece::At,
                "username" => Piece::Username,
                "pixiv" => Piece::Pixiv,
                _ => Piece::Separator,
            }
        };
        pieces.push(piece);
    }
    if last < template.len() {
        pieces.push(Piece::Text(template[last..].to_string()));
    }
    pieces
}

/// Expands response templates against an actor context.
#[derive(Clone, Default)]
pub struct TemplateExpander {
    quotes: Option<Arc<dyn QuoteSource>>,
    images: Option<Arc<dyn ImageSource>>,
}

impl TemplateExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(mut self, quotes: Arc<dyn QuoteSource>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSource>) -> Self {
        self.images = Some(images);
        self
    }

    /// Expand into ordered message segments, split on `{~}`.
    ///
    /// Segments that expand to nothing but whitespace are dropped.
    pub async fn expand_segments(&self, template: &str, ctx: &TemplateContext) -> Vec<String> {
        let pieces = tokenize(template);

        let fetches = pieces.iter().map(|piece| async move {
            match piece {
                Piece::Hitokoto(query) => self.quote(query).await,
                Piece::Pixiv => self.image().await,
                _ => String::new(),
            }
        });
        let fetched = join_all(fetches).await;

        let mut segments = vec![String::new()];
        for (piece, fetched) in pieces.into_iter().zip(fetched) {
            let Some(current) = segments.last_mut() else { break };
            match piece {
                Piece::Text(text) => current.push_str(&text),
                Piece::At => current.push_str(&cq::at(&ctx.actor_id)),
                Piece::Username => current.push_str(&cq::escape_text(ctx.username())),
                Piece::Image(url) => current.push_str(&cq::image(&url)),
                Piece::Hitokoto(_) | Piece::Pixiv => current.push_str(&fetched),
                Piece::Separator => segments.push(String::new()),
            }
        }

        segments.retain(|s| !s.trim().is_empty());
        segments
    }

    /// Expand into a single message; segment separators are dropped.
    pub async fn expand(&self, template: &str, ctx: &TemplateContext) -> String {
        self.expand_segments(template, ctx).await.concat()
    }

    async fn quote(&self, query: &str) -> String {
        let Some(quotes) = &self.quotes else {
            return String::new();
        };
        match quotes.fetch_quote(query).await {
            Ok(text) => cq::escape_text(&text),
            Err(e) => {
                tracing::warn!("hitokoto fetch failed: {e}");
                String::new()
            }
        }
    }

    async fn image(&self) -> String {
        let Some(images) = &self.images else {
            return String::new();
        };
        match images.random_image().await {
            Ok(segment) => segment,
            Err(e) => {
                tracing::warn!("pixiv image fetch failed: {e}");
                String::new()
            }
        }
    }
}
