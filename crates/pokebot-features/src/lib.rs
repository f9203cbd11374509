//! # Pokebot Features
//!
//! Feature modules assembled from the responder and scheduler pieces.
//!
//! ```text
//! BotEngine
//!   ├── poke notice   → PokeResponder → ActionDispatcher → CommandRouter | MessageSink
//!   ├── message       → CommandRouter (cooldown) | StickResponder (reactions)
//!   │                   commands: likes sign poke stick aisay get pixiv
//!   └── daily batches → Likes ("likes" targets, send_like)
//!                       Sign  ("sign" targets, send_group_sign)
//! ```

pub mod assets;
pub mod engine;
pub mod likes;
pub mod poke;
pub mod query;
pub mod router;
pub mod sign;
pub mod stick;
mod targets;
pub mod voice;

#[cfg(test)]
mod testing;

pub use engine::BotEngine;
pub use likes::Likes;
pub use router::{Command, CommandRouter, Invocation};
pub use sign::Sign;
