//! # Handler chain
//!
//! Every incoming message passes through the handlers in order: all `before` hooks
//! (any false drops the message), then `handle` until one returns Stop or Reply, then
//! all `after` hooks in reverse.

use crate::core::{Handler, HandlerResponse, Message, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[instrument(skip(self, message), fields(channel_id = message.channel.id, message_id = message.id))]
    pub async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let author_id = message.author.id;
        info!(author_id, "step: handler_chain started");

        for h in &self.handlers {
            let name = std::any::type_name_of_val(h.as_ref());
            if !h.before(message).await? {
                info!(author_id, handler = %name, "step: before returned false, chain stopped");
                return Ok(HandlerResponse::Stop);
            }
            debug!(handler = %name, "step: handler before done");
        }

        let mut final_response = HandlerResponse::Continue;
        for h in &self.handlers {
            let name = std::any::type_name_of_val(h.as_ref());
            let response = h.handle(message).await?;
            let (response_type, reply_len) = match &response {
                HandlerResponse::Continue => ("Continue", None),
                HandlerResponse::Stop => ("Stop", None),
                HandlerResponse::Ignore => ("Ignore", None),
                HandlerResponse::Reply(s) => ("Reply", Some(s.len())),
            };
            info!(
                author_id,
                handler = %name,
                response_type,
                reply_len = ?reply_len,
                "step: handler handle done"
            );
            if matches!(response, HandlerResponse::Stop | HandlerResponse::Reply(_)) {
                final_response = response;
                break;
            }
        }

        for h in self.handlers.iter().rev() {
            h.after(message, &final_response).await?;
        }

        info!(author_id, response = ?final_response, "step: handler_chain finished");
        Ok(final_response)
    }
}
