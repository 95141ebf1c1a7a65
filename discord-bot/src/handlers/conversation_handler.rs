//! Terminal handler: routes messages to the channel's conversation session.

use crate::core::{BotIdentity, Handler, HandlerResponse, Message, Result};
use crate::session::SessionFactory;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

pub struct ConversationHandler {
    factory: Arc<SessionFactory>,
    /// Filled in when the gateway reports ready.
    identity: Arc<RwLock<Option<BotIdentity>>>,
}

impl ConversationHandler {
    pub fn new(factory: Arc<SessionFactory>, identity: Arc<RwLock<Option<BotIdentity>>>) -> Self {
        Self { factory, identity }
    }
}

#[async_trait]
impl Handler for ConversationHandler {
    /// Drops messages from bots, including our own.
    async fn before(&self, message: &Message) -> Result<bool> {
        if message.author.bot {
            debug!(author_id = message.author.id, "Ignoring bot message");
            return Ok(false);
        }
        let own = self.identity.read().await.as_ref().map(|i| i.id);
        Ok(own != Some(message.author.id))
    }

    #[instrument(skip(self, message), fields(channel_id = message.channel.id, message_id = message.id))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let Some(identity) = self.identity.read().await.clone() else {
            warn!("Bot identity not known yet; dropping message");
            return Ok(HandlerResponse::Stop);
        };
        let session = self.factory.get_or_create(&message.channel, &identity).await;
        session.handle(message).await?;
        Ok(HandlerResponse::Stop)
    }
}
