//! Text commands (`*clear`, `*model`, `*mode`, `*nick`) and their effects.
//!
//! Commands that change how a session is built persist the change and drop the
//! channel's session; the next message recreates it from the stored overrides.

use crate::core::{Channel, ChatMode, HandlerError, Result};
use crate::registry::SessionRegistry;
use storage::SettingsRepository;
use tracing::info;

pub const COMMAND_PREFIX: char = '*';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    Model(String),
    Mode(ChatMode),
    Nick(String),
}

/// Parses a command message. `None` when the text is not a known command; an error
/// when it is one but the argument is missing or invalid.
pub fn parse_command(text: &str) -> Option<std::result::Result<Command, HandlerError>> {
    let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
    let (name, arg) = match body.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (body, ""),
    };
    let parsed = match name.to_ascii_lowercase().as_str() {
        "clear" => Ok(Command::Clear),
        "model" if arg.is_empty() => Err(HandlerError::InvalidCommand("usage: *model <id>".into())),
        "model" => Ok(Command::Model(arg.to_string())),
        "mode" => arg
            .parse::<ChatMode>()
            .map(Command::Mode)
            .map_err(|_| HandlerError::InvalidCommand("usage: *mode <chat|assistant>".into())),
        "nick" if arg.is_empty() => Err(HandlerError::InvalidCommand("usage: *nick <name>".into())),
        "nick" => Ok(Command::Nick(arg.to_string())),
        _ => return None,
    };
    Some(parsed)
}

/// Applies `command` to `channel` and returns the confirmation text.
pub async fn execute(
    command: &Command,
    channel: &Channel,
    registry: &SessionRegistry,
    settings: Option<&SettingsRepository>,
) -> Result<String> {
    let needs_store = !matches!(command, Command::Clear);
    let repo = match settings {
        Some(repo) => Some(repo),
        None if needs_store => {
            return Err(HandlerError::State("settings storage is not available".into()).into())
        }
        None => None,
    };

    let reply = match command {
        Command::Clear => {
            let count = registry.clear(channel.id).await;
            format!("ℹ️ {} chat contexts in this channel have been cleared!", count)
        }
        Command::Model(model) => {
            if let Some(repo) = repo {
                repo.set_model(channel.id, model).await?;
            }
            registry.clear(channel.id).await;
            format!("ℹ️ This channel now uses `{}`.", model)
        }
        Command::Mode(mode) => {
            if let Some(repo) = repo {
                repo.set_mode(channel.id, mode.as_str()).await?;
            }
            registry.clear(channel.id).await;
            format!("ℹ️ This channel is now in `{}` mode.", mode)
        }
        Command::Nick(nick) => {
            let Some(guild_id) = channel.guild_id else {
                return Err(HandlerError::InvalidCommand("nicknames can only be set in a server".into()).into());
            };
            if let Some(repo) = repo {
                repo.set_nickname(guild_id, nick).await?;
            }
            registry.clear(channel.id).await;
            format!("ℹ️ I will go by **{}** in this server.", nick)
        }
    };
    info!(channel_id = channel.id, command = ?command, "Command executed");
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command("*clear").unwrap().unwrap(), Command::Clear);
        assert_eq!(
            parse_command("  *model gpt-4.1-mini ").unwrap().unwrap(),
            Command::Model("gpt-4.1-mini".into())
        );
        assert_eq!(
            parse_command("*mode Assistant").unwrap().unwrap(),
            Command::Mode(ChatMode::Assistant)
        );
        assert_eq!(
            parse_command("*nick Robo Buddy").unwrap().unwrap(),
            Command::Nick("Robo Buddy".into())
        );
    }

    /// **Test: Plain text and unknown starred words are not commands.**
    #[test]
    fn test_non_commands() {
        assert!(parse_command("hello").is_none());
        assert!(parse_command("*bold text*").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            parse_command("*model"),
            Some(Err(HandlerError::InvalidCommand(_)))
        ));
        assert!(matches!(
            parse_command("*mode loud"),
            Some(Err(HandlerError::InvalidCommand(_)))
        ));
        assert!(matches!(
            parse_command("*nick   "),
            Some(Err(HandlerError::InvalidCommand(_)))
        ));
    }
}
