//! Handles `*` text commands before the conversation handler sees the message.

use crate::commands::{self, parse_command};
use crate::core::{Bot, Handler, HandlerResponse, Message, Result};
use crate::format;
use crate::session::SessionFactory;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct CommandHandler {
    bot: Arc<dyn Bot>,
    factory: Arc<SessionFactory>,
}

impl CommandHandler {
    pub fn new(bot: Arc<dyn Bot>, factory: Arc<SessionFactory>) -> Self {
        Self { bot, factory }
    }
}

#[async_trait]
impl Handler for CommandHandler {
    #[instrument(skip(self, message), fields(channel_id = message.channel.id))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let Some(parsed) = parse_command(&message.content) else {
            return Ok(HandlerResponse::Continue);
        };

        let reply = match parsed {
            Ok(command) => {
                info!(command = ?command, author_id = message.author.id, "step: command received");
                match commands::execute(
                    &command,
                    &message.channel,
                    self.factory.registry(),
                    self.factory.settings_repo(),
                )
                .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        error!(error = %e, "Command failed");
                        format::error_message(&e)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Rejected command");
                format!("⚠️ {}", e)
            }
        };

        if let Err(e) = self
            .bot
            .send_message(message.channel.id, &reply, Some(message.id))
            .await
        {
            warn!(error = %e, "Failed to send command reply");
        }
        Ok(HandlerResponse::Reply(reply))
    }
}
