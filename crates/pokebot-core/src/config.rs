//! Pokebot configuration system.
//!
//! One TOML document, one section per feature. Every field has a default so
//! an empty file (or no file at all) yields a working, mostly-disabled bot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PokebotError, Result};
use crate::types::ResponseCandidate;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PokebotConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub poke: PokeConfig,
    #[serde(default)]
    pub stick: StickConfig,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub likes: LikesConfig,
    #[serde(default)]
    pub sign: SignConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub template: TemplateConfig,
}

fn default_data_dir() -> String { "~/.pokebot/data".into() }

impl Default for PokebotConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            onebot: OneBotConfig::default(),
            poke: PokeConfig::default(),
            stick: StickConfig::default(),
            command: CommandConfig::default(),
            likes: LikesConfig::default(),
            sign: SignConfig::default(),
            schedule: ScheduleConfig::default(),
            template: TemplateConfig::default(),
        }
    }
}

impl PokebotConfig {
    /// Load config from the default path (~/.pokebot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PokebotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PokebotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PokebotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Pokebot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pokebot")
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }
}

/// OneBot v11 connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    /// HTTP API base URL of the OneBot implementation.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token sent with API calls and expected on event reports.
    #[serde(default)]
    pub access_token: Option<String>,
    /// HMAC key for the `X-Signature` header on event reports.
    #[serde(default)]
    pub secret: Option<String>,
    /// Address the event-report receiver listens on.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Bot account id; taken from event reports when empty.
    #[serde(default)]
    pub self_id: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String { "http://127.0.0.1:5700".into() }
fn default_listen() -> String { "127.0.0.1:5701".into() }
fn default_api_timeout() -> u64 { 30 }

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            access_token: None,
            secret: None,
            listen: default_listen(),
            self_id: String::new(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Poke ("pat") notice responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PokeConfig {
    /// Minimum interval between responses to the same actor. `<= 0` disables the guard.
    #[serde(default = "default_poke_interval")]
    pub interval_ms: i64,
    #[serde(default)]
    pub responses: Vec<ResponseCandidate>,
}

fn default_poke_interval() -> i64 { 1000 }

impl Default for PokeConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poke_interval(),
            responses: Vec::new(),
        }
    }
}

/// Emoji reactions on incoming messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StickConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Minimum interval between reactions for the same actor. `<= 0` disables the guard.
    #[serde(default)]
    pub interval_ms: i64,
    /// Mirror face segments found in the message.
    #[serde(default = "bool_true")]
    pub react_to_faces: bool,
    #[serde(default = "default_stick_delay")]
    pub item_delay_ms: u64,
    /// Keyword → emoji id (or emoji name) mapping.
    #[serde(default)]
    pub keywords: BTreeMap<String, String>,
}

fn bool_true() -> bool { true }
fn default_stick_delay() -> u64 { 500 }

impl Default for StickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 0,
            react_to_faces: true,
            item_delay_ms: default_stick_delay(),
            keywords: BTreeMap::new(),
        }
    }
}

/// Command router behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Per-actor cooldown for human-issued commands. 0 disables it.
    #[serde(default)]
    pub cooldown_secs: u64,
    /// How many times a repeatable command action (like sending) is issued per call.
    #[serde(default = "default_max_repeat")]
    pub max_repeat: u32,
}

fn default_max_repeat() -> u32 { 5 }

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 0,
            max_repeat: default_max_repeat(),
        }
    }
}

/// How a batch feature resolves its id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// No recurring runs.
    #[default]
    Off,
    /// Run over the persisted target set.
    Manual,
    /// Discover ids from the backend at run time.
    Auto,
}

impl BatchMode {
    /// Whether a daily schedule should be installed.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, BatchMode::Off)
    }
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::Off => write!(f, "off"),
            BatchMode::Manual => write!(f, "manual"),
            BatchMode::Auto => write!(f, "auto"),
        }
    }
}

/// Daily likes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikesConfig {
    #[serde(default)]
    pub mode: BatchMode,
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,
    /// `times` argument of a single like call.
    #[serde(default = "default_like_times")]
    pub times_per_call: u32,
}

fn default_item_delay() -> u64 { 1000 }
fn default_like_times() -> u32 { 10 }

impl Default for LikesConfig {
    fn default() -> Self {
        Self {
            mode: BatchMode::Off,
            item_delay_ms: default_item_delay(),
            times_per_call: default_like_times(),
        }
    }
}

/// Daily group check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignConfig {
    #[serde(default)]
    pub mode: BatchMode,
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            mode: BatchMode::Off,
            item_delay_ms: default_item_delay(),
        }
    }
}

/// Recurring schedule for batch features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Use the cron scheduler; falls back to the interval timer when off or invalid.
    #[serde(default = "bool_true")]
    pub native_cron: bool,
    #[serde(default = "default_cron")]
    pub cron: String,
    #[serde(default = "default_fallback_interval")]
    pub fallback_interval_secs: u64,
}

fn default_cron() -> String { "0 0 * * *".into() }
fn default_fallback_interval() -> u64 { 86_400 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            native_cron: true,
            cron: default_cron(),
            fallback_interval_secs: default_fallback_interval(),
        }
    }
}

/// Template placeholder sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_hitokoto_url")]
    pub hitokoto_url: String,
    /// URL of a JSON array of image URLs used by `{pixiv}`.
    #[serde(default)]
    pub pixiv_url: Option<String>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_hitokoto_url() -> String { "https://v1.hitokoto.cn/".into() }
fn default_fetch_timeout() -> u64 { 10 }

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            hitokoto_url: default_hitokoto_url(),
            pixiv_url: None,
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseKind;

    #[test]
    fn test_default_config() {
        let config = PokebotConfig::default();
        assert_eq!(config.poke.interval_ms, 1000);
        assert_eq!(config.command.max_repeat, 5);
        assert_eq!(config.likes.mode, BatchMode::Off);
        assert_eq!(config.schedule.cron, "0 0 * * *");
        assert_eq!(config.schedule.fallback_interval_secs, 86_400);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            data_dir = "/tmp/pokebot"

            [poke]
            interval_ms = 3000
            responses = [
                { type = "message", content = "{at} ouch", weight = 60 },
                { type = "command", content = "zanwo", weight = 40 },
            ]

            [stick.keywords]
            "good" = "76"

            [likes]
            mode = "manual"

            [sign]
            mode = "auto"
            item_delay_ms = 200
        "#;

        let config: PokebotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_path(), PathBuf::from("/tmp/pokebot"));
        assert_eq!(config.poke.interval_ms, 3000);
        assert_eq!(config.poke.responses.len(), 2);
        assert_eq!(config.poke.responses[1].kind, ResponseKind::Command);
        assert_eq!(config.stick.keywords.get("good").map(String::as_str), Some("76"));
        assert_eq!(config.likes.mode, BatchMode::Manual);
        assert_eq!(config.sign.mode, BatchMode::Auto);
        assert_eq!(config.sign.item_delay_ms, 200);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: PokebotConfig = toml::from_str("").unwrap();
        assert_eq!(config.onebot.api_url, "http://127.0.0.1:5700");
        assert!(config.stick.enabled);
        assert!(config.schedule.native_cron);
    }

    #[test]
    fn test_batch_mode_recurring() {
        assert!(!BatchMode::Off.is_recurring());
        assert!(BatchMode::Manual.is_recurring());
        assert!(BatchMode::Auto.is_recurring());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join("pokebot-test-config");
        let path = dir.join("config.toml");
        let mut config = PokebotConfig::default();
        config.poke.interval_ms = 42;
        config.save_to(&path).unwrap();
        let loaded = PokebotConfig::load_from(&path).unwrap();
        assert_eq!(loaded.poke.interval_ms, 42);
        std::fs::remove_dir_all(&dir).ok();
    }
}
