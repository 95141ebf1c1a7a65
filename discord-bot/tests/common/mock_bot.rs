//! Mock implementation of [`discord_bot::Bot`] for integration tests.
//!
//! Records every send/edit/typing/react/forward call in order so tests can assert on the
//! exact message chain without hitting Discord. Sends and edits can be made to fail;
//! lookups answer from tables the test fills in.

use async_trait::async_trait;
use discord_bot::core::{
    Bot, DbotError, GuildInfo, MemberInfo, MessageMeta, MessageSearch, ReactionEmoji, Result,
    SearchResults, SentMessage, User, UserProfile,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// First id handed out by `send_message`.
pub const FIRST_SENT_ID: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOp {
    Send {
        channel_id: u64,
        message_id: u64,
        reply_to: Option<u64>,
        text: String,
    },
    Edit {
        message_id: u64,
        text: String,
    },
    Typing {
        channel_id: u64,
    },
    React {
        message_id: u64,
        emoji: ReactionEmoji,
    },
    Forward {
        from_channel_id: u64,
        message_id: u64,
        to_channel_id: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Permission,
    Server,
}

impl Failure {
    fn error(self) -> DbotError {
        match self {
            Failure::Permission => DbotError::Permission("Missing Permissions".into()),
            Failure::Server => DbotError::Bot("500 Internal Server Error".into()),
        }
    }
}

#[derive(Default)]
pub struct MockBot {
    ops: Mutex<Vec<BotOp>>,
    next_id: AtomicU64,
    fail_sends: Mutex<Option<Failure>>,
    fail_edits: Mutex<Option<Failure>>,
    authors: Mutex<HashMap<u64, User>>,
    history: Mutex<HashMap<u64, Vec<MessageMeta>>>,
    users: Mutex<HashMap<u64, UserProfile>>,
    members: Mutex<HashMap<(u64, u64), MemberInfo>>,
    guilds: Mutex<HashMap<u64, GuildInfo>>,
    searches: Mutex<Vec<MessageSearch>>,
}

impl MockBot {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(FIRST_SENT_ID),
            ..Default::default()
        }
    }

    pub fn fail_sends(&self, failure: Option<Failure>) {
        *self.fail_sends.lock().unwrap() = failure;
    }

    pub fn fail_edits(&self, failure: Option<Failure>) {
        *self.fail_edits.lock().unwrap() = failure;
    }

    /// Makes `fetch_message(_, message_id)` resolve to `author`.
    pub fn register_message(&self, message_id: u64, author: User) {
        self.authors.lock().unwrap().insert(message_id, author);
    }

    /// Appends a message to a channel's history, oldest first.
    pub fn push_history(&self, message: MessageMeta) {
        self.history
            .lock()
            .unwrap()
            .entry(message.channel_id)
            .or_default()
            .push(message);
    }

    pub fn register_user(&self, profile: UserProfile) {
        self.users.lock().unwrap().insert(profile.id, profile);
    }

    pub fn register_member(&self, user_id: u64, member: MemberInfo) {
        self.members.lock().unwrap().insert((member.guild_id, user_id), member);
    }

    pub fn register_guild(&self, guild: GuildInfo) {
        self.guilds.lock().unwrap().insert(guild.id, guild);
    }

    /// Every search request received.
    pub fn searches(&self) -> Vec<MessageSearch> {
        self.searches.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<BotOp> {
        self.ops.lock().unwrap().clone()
    }

    /// `(message_id, reply_to, text)` of every successful send.
    pub fn sends(&self) -> Vec<(u64, Option<u64>, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BotOp::Send {
                    message_id,
                    reply_to,
                    text,
                    ..
                } => Some((message_id, reply_to, text)),
                _ => None,
            })
            .collect()
    }

    /// `(message_id, text)` of every successful edit.
    pub fn edits(&self) -> Vec<(u64, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BotOp::Edit { message_id, text } => Some((message_id, text)),
                _ => None,
            })
            .collect()
    }

    /// Current text of `message_id`: last edit, otherwise the sent text.
    pub fn text_of(&self, message_id: u64) -> Option<String> {
        let mut text = None;
        for op in self.ops() {
            match op {
                BotOp::Send {
                    message_id: id,
                    text: t,
                    ..
                }
                | BotOp::Edit {
                    message_id: id,
                    text: t,
                } if id == message_id => text = Some(t),
                _ => {}
            }
        }
        text
    }
}

#[async_trait]
impl Bot for MockBot {
    async fn send_message(&self, channel_id: u64, text: &str, reply_to: Option<u64>) -> Result<SentMessage> {
        if let Some(failure) = *self.fail_sends.lock().unwrap() {
            return Err(failure.error());
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.ops.lock().unwrap().push(BotOp::Send {
            channel_id,
            message_id,
            reply_to,
            text: text.to_string(),
        });
        Ok(SentMessage {
            channel_id,
            message_id,
        })
    }

    async fn edit_message(&self, message: &SentMessage, text: &str) -> Result<()> {
        if let Some(failure) = *self.fail_edits.lock().unwrap() {
            return Err(failure.error());
        }
        self.ops.lock().unwrap().push(BotOp::Edit {
            message_id: message.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<MessageMeta> {
        let author = self.authors.lock().unwrap().get(&message_id).cloned();
        match author {
            Some(author) => Ok(MessageMeta {
                id: message_id,
                channel_id,
                author,
                content: String::new(),
                attachments: Vec::new(),
                created_at: None,
            }),
            None => Err(DbotError::Bot("Unknown Message".into())),
        }
    }

    async fn broadcast_typing(&self, channel_id: u64) -> Result<()> {
        self.ops.lock().unwrap().push(BotOp::Typing { channel_id });
        Ok(())
    }

    async fn react(&self, _channel_id: u64, message_id: u64, emoji: &ReactionEmoji) -> Result<()> {
        self.ops.lock().unwrap().push(BotOp::React {
            message_id,
            emoji: emoji.clone(),
        });
        Ok(())
    }

    async fn fetch_recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<MessageMeta>> {
        let history = self.history.lock().unwrap();
        let Some(messages) = history.get(&channel_id) else {
            return Err(DbotError::Bot("Unknown Channel".into()));
        };
        Ok(messages.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn forward_message(
        &self,
        from_channel_id: u64,
        message_id: u64,
        to_channel_id: u64,
    ) -> Result<SentMessage> {
        if let Some(failure) = *self.fail_sends.lock().unwrap() {
            return Err(failure.error());
        }
        let forwarded = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.ops.lock().unwrap().push(BotOp::Forward {
            from_channel_id,
            message_id,
            to_channel_id,
        });
        Ok(SentMessage {
            channel_id: to_channel_id,
            message_id: forwarded,
        })
    }

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| DbotError::Bot("Unknown User".into()))
    }

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberInfo> {
        self.members
            .lock()
            .unwrap()
            .get(&(guild_id, user_id))
            .cloned()
            .ok_or_else(|| DbotError::Bot("Unknown Member".into()))
    }

    async fn fetch_guild(&self, guild_id: u64) -> Result<GuildInfo> {
        self.guilds
            .lock()
            .unwrap()
            .get(&guild_id)
            .cloned()
            .ok_or_else(|| DbotError::Bot("Unknown Guild".into()))
    }

    /// Case-insensitive content match over the registered histories of the requested channels.
    async fn search_messages(&self, search: &MessageSearch) -> Result<SearchResults> {
        self.searches.lock().unwrap().push(search.clone());
        let needle = search.content.to_lowercase();
        let history = self.history.lock().unwrap();
        let mut hits: Vec<MessageMeta> = history
            .iter()
            .filter(|(channel, _)| search.channel_ids.is_empty() || search.channel_ids.contains(channel))
            .flat_map(|(_, messages)| messages.iter())
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .filter(|m| search.author_ids.is_empty() || search.author_ids.contains(&m.author.id))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.id.cmp(&a.id));
        let total = hits.len() as u64;
        hits.truncate(search.limit);
        Ok(SearchResults {
            total,
            messages: hits,
        })
    }
}
