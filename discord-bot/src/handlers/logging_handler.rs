//! Logs every message entering the chain and the final response.

use crate::core::{Handler, HandlerResponse, Message, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl Handler for LoggingHandler {
    #[instrument(skip(self, message))]
    async fn before(&self, message: &Message) -> Result<bool> {
        info!(
            author_id = message.author.id,
            username = %message.author.username,
            channel_id = message.channel.id,
            attachments = message.attachments.len(),
            message_content = %message.content,
            "Received message"
        );
        Ok(true)
    }

    async fn after(&self, message: &Message, response: &HandlerResponse) -> Result<()> {
        debug!(message_id = message.id, response = ?response, "Processed message");
        Ok(())
    }
}
