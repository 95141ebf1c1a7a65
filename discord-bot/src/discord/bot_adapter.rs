//! Implements [`crate::core::Bot`] over serenity's HTTP client.

use super::adapters::DiscordUserWrapper;
use super::rest::DiscordRest;
use crate::core::{
    is_permission_error, Attachment, Bot as CoreBot, DbotError, GuildChannelInfo, GuildInfo,
    MemberInfo, MessageMeta, MessageSearch, ReactionEmoji, Result, RoleInfo, SearchResults,
    SentMessage, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{CreateMessage, EditMessage, GetMessages};
use serenity::http::Http;
use serenity::model::channel::{ChannelType, Message as SerenityMessage, ReactionType};
use serenity::model::guild::Role;
use serenity::model::id::{ChannelId, EmojiId, GuildId, MessageId, UserId};
use serenity::model::Timestamp;
use std::sync::Arc;
use tracing::debug;

pub struct DiscordBotAdapter {
    http: Arc<Http>,
    rest: DiscordRest,
}

impl DiscordBotAdapter {
    pub fn new(http: Arc<Http>, rest: DiscordRest) -> Self {
        Self { http, rest }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Arc::new(Http::new(token)), DiscordRest::new(token))
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }
}

fn map_err(err: serenity::Error) -> DbotError {
    let text = err.to_string();
    if is_permission_error(&text) {
        DbotError::Permission(text)
    } else {
        DbotError::Bot(text)
    }
}

fn to_utc(ts: &Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0)
}

fn message_meta(msg: &SerenityMessage) -> MessageMeta {
    let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
    MessageMeta {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        author: DiscordUserWrapper(&msg.author).to_core(nick),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                url: a.url.clone(),
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
        created_at: to_utc(&msg.timestamp),
    }
}

fn role_info(role: &Role) -> RoleInfo {
    RoleInfo {
        id: role.id.get(),
        name: role.name.clone(),
        position: i64::from(role.position),
        color: role.colour.0,
    }
}

/// Highest position first.
fn sort_roles(roles: &mut [RoleInfo]) {
    roles.sort_by(|a, b| b.position.cmp(&a.position));
}

fn is_text_based(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::Text
            | ChannelType::News
            | ChannelType::Voice
            | ChannelType::Stage
            | ChannelType::NewsThread
            | ChannelType::PublicThread
            | ChannelType::PrivateThread
    )
}

fn to_reaction(emoji: &ReactionEmoji) -> ReactionType {
    match emoji {
        ReactionEmoji::Unicode(s) => ReactionType::Unicode(s.clone()),
        ReactionEmoji::Custom { id, name, animated } => ReactionType::Custom {
            animated: *animated,
            id: EmojiId::new(*id),
            name: name.clone(),
        },
    }
}

#[async_trait]
impl CoreBot for DiscordBotAdapter {
    async fn send_message(&self, channel_id: u64, text: &str, reply_to: Option<u64>) -> Result<SentMessage> {
        let channel = ChannelId::new(channel_id);
        let mut builder = CreateMessage::new().content(text);
        if let Some(id) = reply_to {
            builder = builder.reference_message((channel, MessageId::new(id)));
        }
        let sent = channel
            .send_message(&self.http, builder)
            .await
            .map_err(map_err)?;
        debug!(channel_id, message_id = sent.id.get(), chars = text.chars().count(), "Sent message");
        Ok(SentMessage {
            channel_id,
            message_id: sent.id.get(),
        })
    }

    async fn edit_message(&self, message: &SentMessage, text: &str) -> Result<()> {
        ChannelId::new(message.channel_id)
            .edit_message(
                &self.http,
                MessageId::new(message.message_id),
                EditMessage::new().content(text),
            )
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<MessageMeta> {
        let msg = ChannelId::new(channel_id)
            .message(&self.http, MessageId::new(message_id))
            .await
            .map_err(map_err)?;
        Ok(message_meta(&msg))
    }

    async fn broadcast_typing(&self, channel_id: u64) -> Result<()> {
        ChannelId::new(channel_id)
            .broadcast_typing(&self.http)
            .await
            .map_err(map_err)
    }

    async fn react(&self, channel_id: u64, message_id: u64, emoji: &ReactionEmoji) -> Result<()> {
        ChannelId::new(channel_id)
            .create_reaction(&self.http, MessageId::new(message_id), to_reaction(emoji))
            .await
            .map_err(map_err)
    }

    async fn fetch_recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageMeta>> {
        let mut messages = ChannelId::new(channel_id)
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(map_err)?;
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(messages.iter().map(message_meta).collect())
    }

    async fn forward_message(
        &self,
        from_channel_id: u64,
        message_id: u64,
        to_channel_id: u64,
    ) -> Result<SentMessage> {
        let forwarded = self
            .rest
            .forward(from_channel_id, message_id, to_channel_id)
            .await?;
        Ok(SentMessage {
            channel_id: to_channel_id,
            message_id: forwarded,
        })
    }

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile> {
        let user = self
            .http
            .get_user(UserId::new(user_id))
            .await
            .map_err(map_err)?;
        Ok(UserProfile {
            id: user.id.get(),
            username: user.name.clone(),
            global_name: user.global_name.clone(),
            bot: user.bot,
            created_at: to_utc(&user.id.created_at()),
            avatar_url: Some(user.face()),
        })
    }

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberInfo> {
        let guild = GuildId::new(guild_id);
        let member = self
            .http
            .get_member(guild, UserId::new(user_id))
            .await
            .map_err(map_err)?;
        let guild_roles = self.http.get_guild_roles(guild).await.map_err(map_err)?;
        let mut roles: Vec<RoleInfo> = guild_roles
            .iter()
            .filter(|r| member.roles.contains(&r.id))
            .map(role_info)
            .collect();
        sort_roles(&mut roles);
        Ok(MemberInfo {
            guild_id,
            nickname: member.nick.clone(),
            display_name: member.display_name().to_string(),
            joined_at: member.joined_at.as_ref().and_then(to_utc),
            roles,
        })
    }

    async fn fetch_guild(&self, guild_id: u64) -> Result<GuildInfo> {
        let id = GuildId::new(guild_id);
        let guild = self.http.get_guild_with_counts(id).await.map_err(map_err)?;
        let mut channels: Vec<GuildChannelInfo> = self
            .http
            .get_channels(id)
            .await
            .map_err(map_err)?
            .iter()
            .map(|c| GuildChannelInfo {
                id: c.id.get(),
                name: c.name.clone(),
                kind: format!("{:?}", c.kind),
                parent_id: c.parent_id.map(|p| p.get()),
                position: i64::from(c.position),
                text_based: is_text_based(c.kind),
            })
            .collect();
        channels.sort_by_key(|c| c.position);
        let mut roles: Vec<RoleInfo> = guild.roles.values().map(role_info).collect();
        sort_roles(&mut roles);
        Ok(GuildInfo {
            id: guild_id,
            name: guild.name.clone(),
            owner_id: guild.owner_id.get(),
            member_count: guild.approximate_member_count,
            created_at: to_utc(&id.created_at()),
            preferred_locale: guild.preferred_locale.clone(),
            verification_level: format!("{:?}", guild.verification_level),
            channels,
            roles,
        })
    }

    async fn search_messages(&self, search: &MessageSearch) -> Result<SearchResults> {
        self.rest.search(search).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_roles_highest_first() {
        let role = |id, position| RoleInfo {
            id,
            name: format!("r{}", id),
            position,
            color: 0,
        };
        let mut roles = vec![role(1, 0), role(2, 5), role(3, 2)];
        sort_roles(&mut roles);
        let ids: Vec<u64> = roles.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_text_based_channel_kinds() {
        assert!(is_text_based(ChannelType::Text));
        assert!(is_text_based(ChannelType::PublicThread));
        assert!(!is_text_based(ChannelType::Category));
        assert!(!is_text_based(ChannelType::Forum));
    }

    #[test]
    fn test_to_reaction() {
        assert_eq!(
            to_reaction(&ReactionEmoji::Unicode("👍".into())),
            ReactionType::Unicode("👍".into())
        );
        assert_eq!(
            to_reaction(&ReactionEmoji::Custom {
                id: 5,
                name: Some("wave".into()),
                animated: true
            }),
            ReactionType::Custom {
                animated: true,
                id: EmojiId::new(5),
                name: Some("wave".into())
            }
        );
    }
}
