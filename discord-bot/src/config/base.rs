//! Base config: Discord connection, logging, database. Loaded from env.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// DISCORD_TOKEN
    pub discord_token: String,
    /// LOG_FILE
    pub log_file: String,
    /// DATABASE_URL; SQLite path for overrides, nicknames and memories
    pub database_url: String,
}

impl BaseConfig {
    /// Load from environment variables. `token` overrides DISCORD_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let discord_token = match token {
            Some(t) => t,
            None => env::var("DISCORD_TOKEN").context("DISCORD_TOKEN not set")?,
        };
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "./data/bot.db".to_string());
        let log_file =
            env::var("LOG_FILE").unwrap_or_else(|_| "logs/discord-bot.log".to_string());

        Ok(Self {
            discord_token,
            log_file,
            database_url,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }
        Ok(())
    }
}
