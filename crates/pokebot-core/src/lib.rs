//! # Pokebot Core
//!
//! Shared building blocks for every Pokebot crate:
//! - `config`: the TOML configuration document with per-feature sections
//! - `cq`: CQ-code building and parsing for OneBot string messages
//! - `error`: the crate-wide error type
//! - `types`: inbound events and the context a response is rendered against
//! - `traits`: the narrow collaborator interfaces (bot API, message sink,
//!   command executor) the engine is driven through

pub mod config;
pub mod cq;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PokebotConfig;
pub use error::{PokebotError, Result};
pub use traits::{BotApi, CommandExecutor, MessageSink};
pub use types::{BotEvent, Conversation, EventContext};
