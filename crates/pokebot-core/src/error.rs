//! Pokebot error type.

use thiserror::Error;

/// Errors produced by Pokebot components.
#[derive(Debug, Error)]
pub enum PokebotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bot API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PokebotError>;
