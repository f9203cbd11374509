//! `pixiv.clear`: drop the cached image list so the next `{pixiv}` downloads it again.

use std::sync::Arc;

use async_trait::async_trait;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::types::EventContext;
use pokebot_responder::pixiv::PixivImages;

use crate::router::{Command, Invocation};

pub struct PixivCommand {
    images: Arc<PixivImages>,
}

impl PixivCommand {
    pub fn new(images: Arc<PixivImages>) -> Self {
        Self { images }
    }
}

#[async_trait]
impl Command for PixivCommand {
    fn name(&self) -> &str {
        "pixiv"
    }

    fn usage(&self) -> &str {
        "pixiv.clear"
    }

    async fn run(&self, invocation: &Invocation, _ctx: &EventContext) -> Result<String> {
        match invocation.sub() {
            Some("clear") => {
                self.images.clear_cache().await?;
                tracing::info!("Pixiv image list cache cleared");
                Ok("Image list cache cleared.".into())
            }
            _ => Err(PokebotError::Command(format!("usage: {}", self.usage()))),
        }
    }
}
