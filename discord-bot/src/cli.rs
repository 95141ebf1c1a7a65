//! CLI parser and config loading.

use crate::config::BotConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "discord-bot")]
#[command(about = "Discord LLM chat bot", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Discord bot (config from env; token can override DISCORD_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
}

/// Load BotConfig from environment. If `token` is provided it overrides DISCORD_TOKEN.
pub fn load_config(token: Option<String>) -> Result<BotConfig> {
    BotConfig::load(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_token() {
        let cli = Cli::try_parse_from(["discord-bot", "run", "--token", "abc"]).unwrap();
        let Commands::Run { token } = cli.command;
        assert_eq!(token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_run_without_token() {
        let cli = Cli::try_parse_from(["discord-bot", "run"]).unwrap();
        let Commands::Run { token } = cli.command;
        assert!(token.is_none());
    }
}
