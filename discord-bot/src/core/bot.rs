//! Bot abstraction for sending, editing, fetching and reacting to messages, plus the
//! read-only guild lookups the tools need.
//!
//! [`Bot`] is transport-agnostic; `crate::discord::DiscordBotAdapter` implements it over
//! serenity's HTTP client. Tests substitute a recording mock.

use crate::core::error::Result;
use crate::core::types::{Attachment, ReactionEmoji, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Handle to a message the bot sent; used for later edits and reply chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentMessage {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Metadata of a fetched message (reply-chain resolution, reaction targets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub id: u64,
    pub channel_id: u64,
    pub author: User,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Account-level profile of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub global_name: Option<String>,
    pub bot: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: u64,
    pub name: String,
    pub position: i64,
    pub color: u32,
}

/// A user's membership in one guild. Roles are ordered highest position first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub guild_id: u64,
    pub nickname: Option<String>,
    pub display_name: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub roles: Vec<RoleInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildChannelInfo {
    pub id: u64,
    pub name: String,
    /// Transport channel kind, e.g. `Text` or `Voice`.
    pub kind: String,
    pub parent_id: Option<u64>,
    pub position: i64,
    /// Whether messages can be read from it.
    pub text_based: bool,
}

/// Guild overview. Channels are ordered by position, roles highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
    pub owner_id: u64,
    pub member_count: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub preferred_locale: String,
    pub verification_level: String,
    pub channels: Vec<GuildChannelInfo>,
    pub roles: Vec<RoleInfo>,
}

/// Filters for a guild-wide message search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSearch {
    pub guild_id: u64,
    pub content: String,
    pub limit: usize,
    pub channel_ids: Vec<u64>,
    pub author_ids: Vec<u64>,
    pub mentions: Vec<u64>,
    pub min_id: Option<u64>,
    pub max_id: Option<u64>,
    pub offset: Option<usize>,
    pub pinned: Option<bool>,
    pub include_nsfw: bool,
    pub sort_by: String,
    pub sort_order: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub total: u64,
    pub messages: Vec<MessageMeta>,
}

/// Outbound transport operations.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends `text` to a channel, optionally as a reply to `reply_to` (same channel).
    async fn send_message(
        &self,
        channel_id: u64,
        text: &str,
        reply_to: Option<u64>,
    ) -> Result<SentMessage>;

    /// Replaces the content of an already-sent message.
    async fn edit_message(&self, message: &SentMessage, text: &str) -> Result<()>;

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<MessageMeta>;

    /// Shows the typing indicator.
    async fn broadcast_typing(&self, channel_id: u64) -> Result<()>;

    async fn react(&self, channel_id: u64, message_id: u64, emoji: &ReactionEmoji) -> Result<()>;

    /// Last `limit` messages of a channel, newest first.
    async fn fetch_recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageMeta>>;

    /// Forwards a message into another channel; returns the forwarded copy.
    async fn forward_message(
        &self,
        from_channel_id: u64,
        message_id: u64,
        to_channel_id: u64,
    ) -> Result<SentMessage>;

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile>;

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberInfo>;

    async fn fetch_guild(&self, guild_id: u64) -> Result<GuildInfo>;

    async fn search_messages(&self, search: &MessageSearch) -> Result<SearchResults>;
}

/// True when the transport rejected an edit because the content did not change.
pub fn is_message_not_modified_error(err: &str) -> bool {
    let lower = err.to_lowercase();
    lower.contains("message is not modified") || lower.contains("message not modified")
}

/// True when the error text reports a missing permission (code 50013 or HTTP 403).
pub fn is_permission_error(err: &str) -> bool {
    err.contains("Missing Permissions")
        || err.contains("50013")
        || err.contains("403 Forbidden")
}
