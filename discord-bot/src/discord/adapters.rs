//! Conversion from serenity models to the core types.

use crate::core::{Attachment, Channel, Message, ReplyRef, RoleMention, User};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Guild nickname first, then global display name.
pub fn pick_display_name(nick: Option<&str>, global_name: Option<&str>) -> Option<String> {
    nick.or(global_name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Names resolved from the guild cache before conversion.
#[derive(Debug, Clone, Default)]
pub struct GuildNames {
    pub channel_name: Option<String>,
    pub roles: HashMap<u64, String>,
}

pub struct DiscordUserWrapper<'a>(pub &'a serenity::model::user::User);

impl DiscordUserWrapper<'_> {
    /// `nick` is the guild nickname when the event carried member data.
    pub fn to_core(&self, nick: Option<&str>) -> User {
        User {
            id: self.0.id.get(),
            username: self.0.name.clone(),
            display_name: pick_display_name(nick, self.0.global_name.as_deref()),
            bot: self.0.bot,
        }
    }
}

pub struct DiscordMessageWrapper<'a>(pub &'a serenity::model::channel::Message);

impl DiscordMessageWrapper<'_> {
    pub fn to_core(&self, names: &GuildNames) -> Message {
        let msg = self.0;
        let author_nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
        let author = DiscordUserWrapper(&msg.author).to_core(author_nick);

        let channel_name = match msg.guild_id {
            Some(_) => names.channel_name.clone(),
            None => Some(format!("{}'s DM", author.display())),
        };

        let reply_to = msg
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id)
            .map(|id| ReplyRef {
                message_id: id.get(),
                author: msg
                    .referenced_message
                    .as_ref()
                    .map(|m| DiscordUserWrapper(&m.author).to_core(None)),
            });

        Message {
            id: msg.id.get(),
            channel: Channel {
                id: msg.channel_id.get(),
                guild_id: msg.guild_id.map(|g| g.get()),
                name: channel_name,
            },
            author,
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
            mentions: msg
                .mentions
                .iter()
                .map(|u| DiscordUserWrapper(u).to_core(None))
                .collect(),
            role_mentions: role_mentions(msg.mention_roles.iter().map(|r| r.get()), &names.roles),
            reply_to,
            created_at: DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0)
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Mentioned roles with their cached names; unknown roles keep their id as name.
pub(crate) fn role_mentions(ids: impl Iterator<Item = u64>, names: &HashMap<u64, String>) -> Vec<RoleMention> {
    ids.map(|id| RoleMention {
        id,
        name: names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
    })
    .collect()
}
