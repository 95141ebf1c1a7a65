//! Core types: user, channel, message, chat mode, reactions, handler response, and Handler trait.
//!
//! One file per main type.

mod channel;
mod handler;
mod message;
mod mode;
mod reaction;
mod response;
mod user;

pub use channel::Channel;
pub use handler::Handler;
pub use message::{Attachment, Message, ReplyRef, RoleMention};
pub use mode::ChatMode;
pub use reaction::ReactionEmoji;
pub use response::HandlerResponse;
pub use user::{BotIdentity, User};
