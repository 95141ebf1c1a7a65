//! Core types and traits: Handler, Bot, Message, HandlerResponse, error, logger.
//! Transport-agnostic; the Discord adapter converts into these types.

pub mod bot;
pub mod error;
pub mod logger;
pub mod types;

pub use bot::{
    is_message_not_modified_error, is_permission_error, Bot, GuildChannelInfo, GuildInfo, MemberInfo,
    MessageMeta, MessageSearch, RoleInfo, SearchResults, SentMessage, UserProfile,
};
pub use error::{DbotError, HandlerError, Result};
pub use logger::init_tracing;
pub use types::{
    Attachment, BotIdentity, Channel, ChatMode, Handler, HandlerResponse, Message, ReactionEmoji,
    ReplyRef, RoleMention, User,
};
