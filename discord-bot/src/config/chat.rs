//! Conversation behaviour: mode, activation keywords, debounce, limits, prompts, emojis.

use crate::core::ChatMode;
use crate::segment::MESSAGE_MAX_LENGTH;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// CHAT_MODE: default mode for channels without an override
    pub default_mode: ChatMode,
    /// THINKING_MESSAGE; `{@}` becomes the author mention
    pub thinking_message: String,
    /// WAKE_KEYWORDS, comma-separated
    pub wake_keywords: Vec<String>,
    /// DEBOUNCE_MS
    pub debounce_ms: u64,
    /// MESSAGE_MAX_LENGTH
    pub message_max_length: usize,
    /// HISTORY_RETENTION_HOURS
    pub history_retention_hours: i64,
    /// MAX_TOOL_PASSES
    pub max_tool_passes: usize,
    /// SYSTEM_PROMPT; `None` uses the built-in template
    pub system_prompt: Option<String>,
    /// BOT_NICKNAME used in prompts when a guild has none stored
    pub bot_nickname: String,
    /// CUSTOM_EMOJIS as `name:id[:a],...`
    pub custom_emojis: String,
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        _ => Ok(default),
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self> {
        let wake_keywords = env::var("WAKE_KEYWORDS")
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            default_mode: parsed("CHAT_MODE", ChatMode::Chat)?,
            thinking_message: env::var("THINKING_MESSAGE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "{@} is thinking...".to_string()),
            wake_keywords,
            debounce_ms: parsed("DEBOUNCE_MS", 1000)?,
            message_max_length: parsed("MESSAGE_MAX_LENGTH", MESSAGE_MAX_LENGTH)?,
            history_retention_hours: parsed("HISTORY_RETENTION_HOURS", 24)?,
            max_tool_passes: parsed("MAX_TOOL_PASSES", 3)?,
            system_prompt: env::var("SYSTEM_PROMPT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            bot_nickname: env::var("BOT_NICKNAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "ChatGPT".to_string()),
            custom_emojis: env::var("CUSTOM_EMOJIS").unwrap_or_default(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=2000).contains(&self.message_max_length) {
            anyhow::bail!(
                "MESSAGE_MAX_LENGTH must be between 2 and 2000, got {}",
                self.message_max_length
            );
        }
        if self.history_retention_hours <= 0 {
            anyhow::bail!("HISTORY_RETENTION_HOURS must be positive");
        }
        if self.max_tool_passes == 0 {
            anyhow::bail!("MAX_TOOL_PASSES must be at least 1");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn history_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.history_retention_hours)
    }
}
