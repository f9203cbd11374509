//! # Pokebot OneBot
//!
//! OneBot v11 over HTTP.
//!
//! ```text
//! OneBot implementation ──POST /──▶ receiver (axum, token + signature) ──mpsc──▶ event loop
//! event loop ──BotApi::call / MessageSink::send──▶ OneBotClient ──POST /{action}──▶ OneBot implementation
//! ```

pub mod client;
pub mod event;
pub mod receiver;
pub mod signature;

pub use client::OneBotClient;
pub use event::parse_event;
pub use receiver::{build_router, serve};
