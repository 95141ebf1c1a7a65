//! Tools the model may call during the chat-mode tool loop.
//!
//! [`ToolExecutor`] is the seam used by sessions; [`BuiltinTools`] implements the bot's
//! own tools over the transport (user, guild and message lookups, reactions, forwards),
//! the guild memory store, the custom emoji table and the session registry. Every result is a JSON string fed back to the model; failures
//! are reported as `{"ok":false,"error":...}` and never abort the batch.

use crate::core::{Bot, Channel, MessageMeta, MessageSearch, ReactionEmoji, RoleInfo};
use crate::emoji::EmojiTable;
use crate::registry::SessionRegistry;
use async_trait::async_trait;
use llm_client::{FunctionCall, Role, ToolDefinition};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Weak};
use storage::{MemoryQuery, MemoryRepository, NewMemory};
use tracing::{error, info, instrument};

/// Longest excerpt returned by `search_conversation_history`.
pub const EXCERPT_MAX_CHARS: usize = 500;

/// Largest page `fetch_recent_messages` asks the transport for.
pub const RECENT_MESSAGES_MAX: i64 = 50;

/// Highest result offset the guild search accepts.
pub const SEARCH_OFFSET_MAX: i64 = 9975;

/// Explicit `channelIds` beyond this are dropped from a search.
const SEARCH_CHANNELS_MAX: usize = 500;

static CUSTOM_MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(a?):(\w+):(\d+)>$").expect("invalid regex"));
static NAMED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(a:)?([a-zA-Z0-9_]+)\s*:\s*(\d+)$").expect("invalid regex"));
static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?([a-zA-Z0-9_]+):?$").expect("invalid regex"));

/// Where the tool call originated.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub channel: Channel,
    /// Message that triggered the invocation, when there is one.
    pub message_id: Option<u64>,
    pub author_id: Option<u64>,
}

/// Executes model function calls. `execute` always yields a JSON result string.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, call: &FunctionCall, ctx: &ToolContext) -> String;
}

/// Offers nothing; every call is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

#[async_trait]
impl ToolExecutor for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn execute(&self, call: &FunctionCall, _ctx: &ToolContext) -> String {
        failure(format!("Unknown tool: {}", call.name))
    }
}

fn failure(message: impl Into<String>) -> String {
    json!({ "ok": false, "error": message.into() }).to_string()
}

fn clamp_limit(value: Option<f64>, default: i64, min: i64, max: i64) -> usize {
    value
        .map(|v| v.floor() as i64)
        .unwrap_or(default)
        .clamp(min, max) as usize
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

fn ids(raw: Option<Vec<Option<String>>>) -> Vec<u64> {
    raw.unwrap_or_default()
        .iter()
        .flatten()
        .filter_map(|id| parse_id(id))
        .collect()
}

fn message_json(message: &MessageMeta) -> Value {
    json!({
        "id": message.id.to_string(),
        "channelId": message.channel_id.to_string(),
        "author": {
            "id": message.author.id.to_string(),
            "username": message.author.username,
            "displayName": message.author.display(),
        },
        "content": message.content,
        "createdAt": message.created_at.map(|t| t.to_rfc3339()),
        "attachments": message
            .attachments
            .iter()
            .map(|a| json!({ "name": a.filename, "url": a.url, "contentType": a.content_type }))
            .collect::<Vec<_>>(),
    })
}

fn role_json(role: &RoleInfo, guild_id: u64) -> Value {
    json!({
        "id": role.id.to_string(),
        "name": role.name,
        "position": role.position,
        "color": role.color,
        "isEveryone": role.id == guild_id,
    })
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_MAX_CHARS {
        let cut: String = text.chars().take(EXCERPT_MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Resolves the `emoji` argument of `react_message`.
///
/// Accepts `<:name:id>`, `<a:name:id>`, `name:id`, `a:name:id`, a bare numeric id,
/// `:name:` or `name` from the custom table, and otherwise treats the input as Unicode.
pub fn resolve_reaction(input: &str, emojis: &EmojiTable) -> ReactionEmoji {
    let trimmed = input.trim();
    if let Some(caps) = CUSTOM_MARKUP_RE.captures(trimmed) {
        if let Some(id) = parse_id(&caps[3]) {
            return ReactionEmoji::Custom {
                id,
                name: Some(caps[2].to_string()),
                animated: !caps[1].is_empty(),
            };
        }
    }
    if let Some(caps) = NAMED_ID_RE.captures(trimmed) {
        if let Some(id) = parse_id(&caps[3]) {
            return ReactionEmoji::Custom {
                id,
                name: Some(caps[2].to_string()),
                animated: caps.get(1).is_some(),
            };
        }
    }
    if let Some(id) = parse_id(trimmed) {
        return ReactionEmoji::Custom {
            id,
            name: None,
            animated: false,
        };
    }
    if let Some(caps) = SHORTCODE_RE.captures(trimmed) {
        if let Some(emoji) = emojis.get(&caps[1]) {
            return ReactionEmoji::Custom {
                id: emoji.id,
                name: Some(emoji.name.clone()),
                animated: emoji.animated,
            };
        }
    }
    ReactionEmoji::Unicode(trimmed.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoArgs {
    user_id: String,
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardArgs {
    from_channel_id: Option<String>,
    message_id: String,
    to_channel_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoArgs {
    guild_id: Option<String>,
    include_channels: Option<bool>,
    include_roles: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentMessagesArgs {
    channel_id: Option<String>,
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchMessagesArgs {
    guild_id: Option<String>,
    query: String,
    limit: Option<f64>,
    scan_limit: Option<f64>,
    channel_limit: Option<f64>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    author_ids: Option<Vec<Option<String>>>,
    mentions: Option<Vec<Option<String>>>,
    channel_ids: Option<Vec<String>>,
    min_id: Option<String>,
    max_id: Option<String>,
    offset: Option<f64>,
    pinned: Option<bool>,
    include_nsfw: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactArgs {
    channel_id: Option<String>,
    message_id: String,
    emoji: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMemoriesArgs {
    guild_id: Option<String>,
    query: Option<String>,
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMemoryArgs {
    guild_id: Option<String>,
    content: String,
    ttl_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListConversationsArgs {
    guild_id: Option<String>,
    include_current: Option<bool>,
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHistoryArgs {
    guild_id: Option<String>,
    channel_ids: Option<Vec<String>>,
    query: String,
    limit: Option<f64>,
    max_per_channel: Option<f64>,
    include_current: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ListEmojisArgs {
    query: Option<String>,
}

/// The bot's built-in tool set.
pub struct BuiltinTools {
    bot: Arc<dyn Bot>,
    memories: Option<MemoryRepository>,
    emojis: Arc<EmojiTable>,
    registry: Weak<SessionRegistry>,
}

impl BuiltinTools {
    pub fn new(
        bot: Arc<dyn Bot>,
        memories: Option<MemoryRepository>,
        emojis: Arc<EmojiTable>,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            bot,
            memories,
            emojis,
            registry,
        }
    }

    fn guild_for(&self, requested: Option<&str>, ctx: &ToolContext) -> Option<u64> {
        requested.and_then(parse_id).or(ctx.channel.guild_id)
    }

    async fn get_user_info(&self, args: UserInfoArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(user_id) = parse_id(&args.user_id) else {
            return Ok(json!({ "ok": false, "error": "Invalid user id." }));
        };
        let user = self.bot.fetch_user(user_id).await?;
        let member = match self.guild_for(args.guild_id.as_deref(), ctx) {
            Some(guild_id) => self.bot.fetch_member(guild_id, user_id).await.ok(),
            None => None,
        };
        let display_name = user.global_name.clone().unwrap_or_else(|| user.username.clone());
        Ok(json!({
            "ok": true,
            "user": {
                "id": user.id.to_string(),
                "username": user.username,
                "globalName": user.global_name,
                "displayName": display_name,
                "bot": user.bot,
                "createdAt": user.created_at.map(|t| t.to_rfc3339()),
                "avatarUrl": user.avatar_url,
            },
            "guildMember": member.map(|m| json!({
                "guildId": m.guild_id.to_string(),
                "nickname": m.nickname,
                "displayName": m.display_name,
                "joinedAt": m.joined_at.map(|t| t.to_rfc3339()),
                "roles": m.roles.iter().map(|r| role_json(r, m.guild_id)).collect::<Vec<_>>(),
            })),
        }))
    }

    async fn forward_message(&self, args: ForwardArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let from = args
            .from_channel_id
            .as_deref()
            .and_then(parse_id)
            .unwrap_or(ctx.channel.id);
        let Some(to) = parse_id(&args.to_channel_id) else {
            return Ok(json!({ "ok": false, "error": "Destination channel is not text-based or not found." }));
        };
        let Some(message_id) = parse_id(&args.message_id) else {
            return Ok(json!({ "ok": false, "error": "Invalid message id." }));
        };
        let sent = self.bot.forward_message(from, message_id, to).await?;
        Ok(json!({
            "ok": true,
            "forwardedMessageId": sent.message_id.to_string(),
            "fromChannelId": from.to_string(),
            "toChannelId": to.to_string(),
        }))
    }

    async fn get_server_info(&self, args: ServerInfoArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(guild_id) = self.guild_for(args.guild_id.as_deref(), ctx) else {
            return Ok(json!({ "ok": false, "error": "Guild not found or not available in this context." }));
        };
        let guild = self.bot.fetch_guild(guild_id).await?;
        let mut info = json!({
            "ok": true,
            "guild": {
                "id": guild.id.to_string(),
                "name": guild.name,
                "memberCount": guild.member_count,
                "ownerId": guild.owner_id.to_string(),
                "createdAt": guild.created_at.map(|t| t.to_rfc3339()),
                "preferredLocale": guild.preferred_locale,
                "verificationLevel": guild.verification_level,
            },
        });
        if args.include_channels.unwrap_or(true) {
            info["channels"] = guild
                .channels
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id.to_string(),
                        "name": c.name,
                        "type": c.kind,
                        "parentId": c.parent_id.map(|p| p.to_string()),
                    })
                })
                .collect();
        }
        if args.include_roles.unwrap_or(true) {
            info["roles"] = guild.roles.iter().map(|r| role_json(r, guild.id)).collect();
        }
        Ok(info)
    }

    async fn fetch_recent_messages(&self, args: RecentMessagesArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let channel_id = args
            .channel_id
            .as_deref()
            .and_then(parse_id)
            .unwrap_or(ctx.channel.id);
        let limit = clamp_limit(args.limit, 1, 1, RECENT_MESSAGES_MAX);
        let mut messages = self.bot.fetch_recent_messages(channel_id, limit as u8).await?;
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let items: Vec<Value> = messages.iter().map(message_json).collect();
        Ok(json!({ "ok": true, "count": items.len(), "items": items }))
    }

    async fn search_messages(&self, args: SearchMessagesArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(guild_id) = self.guild_for(args.guild_id.as_deref(), ctx) else {
            return Ok(json!({ "ok": false, "error": "Guild not found or not available in this context." }));
        };
        let content = args.query.trim().to_string();
        if content.is_empty() {
            return Ok(json!({ "ok": false, "error": "Search query cannot be empty." }));
        }
        let limit = clamp_limit(args.limit, 10, 1, 25);
        let channel_max = clamp_limit(args.channel_limit, 20, 1, 50);
        let scan_count = clamp_limit(args.scan_limit, channel_max as i64, 1, 50);

        let explicit: Vec<u64> = args
            .channel_ids
            .unwrap_or_default()
            .iter()
            .filter_map(|id| parse_id(id))
            .take(SEARCH_CHANNELS_MAX)
            .collect();
        let channel_ids = if explicit.is_empty() {
            self.bot
                .fetch_guild(guild_id)
                .await?
                .channels
                .into_iter()
                .filter(|c| c.text_based)
                .take(channel_max)
                .take(scan_count)
                .map(|c| c.id)
                .collect()
        } else {
            explicit
        };

        let search = MessageSearch {
            guild_id,
            content,
            limit,
            channel_ids,
            author_ids: ids(args.author_ids),
            mentions: ids(args.mentions),
            min_id: args.min_id.as_deref().and_then(parse_id),
            max_id: args.max_id.as_deref().and_then(parse_id),
            offset: args
                .offset
                .map(|o| (o.floor() as i64).clamp(0, SEARCH_OFFSET_MAX) as usize),
            pinned: args.pinned,
            include_nsfw: args.include_nsfw.unwrap_or(true),
            sort_by: args.sort_by.unwrap_or_else(|| "timestamp".to_string()),
            sort_order: args.sort_order.unwrap_or_else(|| "desc".to_string()),
        };
        let results = self.bot.search_messages(&search).await?;
        let items: Vec<Value> = results.messages.iter().take(limit).map(message_json).collect();
        Ok(json!({ "ok": true, "count": items.len(), "total": results.total, "items": items }))
    }

    async fn react_message(&self, args: ReactArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let channel_id = args
            .channel_id
            .as_deref()
            .and_then(parse_id)
            .unwrap_or(ctx.channel.id);
        let Some(message_id) = parse_id(&args.message_id) else {
            return Ok(json!({ "ok": false, "error": "Invalid message id." }));
        };
        let emoji = resolve_reaction(&args.emoji, &self.emojis);
        self.bot.react(channel_id, message_id, &emoji).await?;
        Ok(json!({
            "ok": true,
            "messageId": message_id.to_string(),
            "emoji": emoji.markup(),
        }))
    }

    async fn list_memories(&self, args: ListMemoriesArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(repo) = &self.memories else {
            return Ok(json!({ "ok": false, "error": "Memory store is not available." }));
        };
        let Some(guild_id) = self.guild_for(args.guild_id.as_deref(), ctx) else {
            return Ok(json!({ "ok": false, "error": "Guild not found or not available in this context." }));
        };
        let query = MemoryQuery {
            query: args.query,
            limit: args.limit.map(|l| l.floor() as i64),
        };
        let list = repo.list(guild_id, &query).await?;
        Ok(json!({ "ok": true, "total": list.total, "items": list.items }))
    }

    async fn create_memory(&self, args: CreateMemoryArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(repo) = &self.memories else {
            return Ok(json!({ "ok": false, "error": "Memory store is not available." }));
        };
        let Some(guild_id) = self.guild_for(args.guild_id.as_deref(), ctx) else {
            return Ok(json!({ "ok": false, "error": "Guild not found or not available in this context." }));
        };
        let memory = NewMemory {
            content: args.content,
            ttl_seconds: args.ttl_seconds.map(|t| t.floor() as i64),
            author_id: ctx.author_id,
            channel_id: Some(ctx.channel.id),
            message_id: ctx.message_id,
        };
        let item = repo.create(guild_id, memory).await?;
        Ok(json!({ "ok": true, "item": item }))
    }

    async fn list_conversations(&self, args: ListConversationsArgs, ctx: &ToolContext) -> anyhow::Result<Value> {
        let Some(registry) = self.registry.upgrade() else {
            return Ok(json!({ "ok": true, "count": 0, "items": [] }));
        };
        let guild = args.guild_id.as_deref().and_then(parse_id).or(ctx.channel.guild_id);
        let include_current = args.include_current.unwrap_or(false);
        let max = clamp_limit(args.limit, 50, 1, 100);

        let mut items = Vec::new();
        for session in registry.list() {
            let channel = session.channel();
            if !include_current && channel.id == ctx.channel.id {
                continue;
            }
            if guild.is_some() && channel.guild_id != guild {
                continue;
            }
            let history = session.history().await;
            let last = history.last().map(|t| t.timestamp);
            items.push((
                last,
                json!({
                    "channelId": channel.id.to_string(),
                    "channelName": channel.name,
                    "guildId": channel.guild_id.map(|g| g.to_string()),
                    "mode": session.mode().as_str(),
                    "model": session.model(),
                    "historyCount": history.len(),
                    "lastMessageAt": last.map(|t| t.to_rfc3339()),
                    "processing": session.is_processing().await,
                }),
            ));
        }
        items.sort_by(|a, b| b.0.cmp(&a.0));
        let count = items.len();
        let items: Vec<Value> = items.into_iter().take(max).map(|(_, v)| v).collect();
        Ok(json!({ "ok": true, "count": count, "items": items }))
    }

    async fn search_conversation_history(
        &self,
        args: SearchHistoryArgs,
        ctx: &ToolContext,
    ) -> anyhow::Result<Value> {
        let needle = args.query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(json!({ "ok": false, "error": "Search query cannot be empty." }));
        }
        let Some(registry) = self.registry.upgrade() else {
            return Ok(json!({ "ok": true, "count": 0, "items": [] }));
        };
        let guild = args.guild_id.as_deref().and_then(parse_id).or(ctx.channel.guild_id);
        let include_current = args.include_current.unwrap_or(false);
        let max_total = clamp_limit(args.limit, 50, 1, 200);
        let max_each = clamp_limit(args.max_per_channel, 10, 1, 50);
        let allowed: Option<HashSet<u64>> = args
            .channel_ids
            .map(|ids| ids.iter().filter_map(|id| parse_id(id)).collect());

        let mut results = Vec::new();
        for session in registry.list() {
            if results.len() >= max_total {
                break;
            }
            let channel = session.channel();
            if !include_current && channel.id == ctx.channel.id {
                continue;
            }
            if guild.is_some() && channel.guild_id != guild {
                continue;
            }
            if allowed.as_ref().is_some_and(|ids| !ids.contains(&channel.id)) {
                continue;
            }

            let mut per_channel = 0;
            for turn in session.history().await {
                if !matches!(turn.role, Role::User | Role::Assistant) {
                    continue;
                }
                for text in turn.content.iter().filter_map(|p| p.as_text()) {
                    if per_channel >= max_each || results.len() >= max_total {
                        break;
                    }
                    if !text.to_lowercase().contains(&needle) {
                        continue;
                    }
                    results.push(json!({
                        "channelId": channel.id.to_string(),
                        "channelName": channel.name,
                        "guildId": channel.guild_id.map(|g| g.to_string()),
                        "role": turn.role,
                        "timestamp": turn.timestamp.to_rfc3339(),
                        "text": excerpt(text),
                    }));
                    per_channel += 1;
                }
            }
        }
        Ok(json!({ "ok": true, "count": results.len(), "items": results }))
    }

    fn list_emojis(&self, args: ListEmojisArgs) -> Value {
        let needle = args.query.map(|q| q.to_lowercase());
        let items: Vec<Value> = self
            .emojis
            .iter()
            .filter(|e| {
                needle
                    .as_deref()
                    .map(|n| e.name.to_lowercase().contains(n))
                    .unwrap_or(true)
            })
            .map(|e| json!({ "id": e.id.to_string(), "name": e.name, "animated": e.animated }))
            .collect();
        json!({ "ok": true, "total": items.len(), "items": items })
    }

    async fn dispatch(&self, call: &FunctionCall, ctx: &ToolContext) -> Result<anyhow::Result<Value>, String> {
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        macro_rules! args {
            () => {
                serde_json::from_str(raw).map_err(|e| format!("Invalid tool arguments JSON: {}", e))?
            };
        }
        Ok(match call.name.as_str() {
            "get_user_info" => self.get_user_info(args!(), ctx).await,
            "react_message" => self.react_message(args!(), ctx).await,
            "forward_message" => self.forward_message(args!(), ctx).await,
            "get_server_info" => self.get_server_info(args!(), ctx).await,
            "list_memories" => self.list_memories(args!(), ctx).await,
            "create_memory" => self.create_memory(args!(), ctx).await,
            "list_conversations" => self.list_conversations(args!(), ctx).await,
            "search_conversation_history" => self.search_conversation_history(args!(), ctx).await,
            "list_emojis" => Ok(self.list_emojis(args!())),
            "fetch_recent_messages" => self.fetch_recent_messages(args!(), ctx).await,
            "search_messages" => self.search_messages(args!(), ctx).await,
            other => return Err(format!("Unknown tool: {}", other)),
        })
    }
}

#[async_trait]
impl ToolExecutor for BuiltinTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        builtin_definitions()
    }

    #[instrument(skip(self, call, ctx), fields(tool = %call.name, channel_id = ctx.channel.id))]
    async fn execute(&self, call: &FunctionCall, ctx: &ToolContext) -> String {
        info!(arguments = %call.arguments, "step: tool call");
        match self.dispatch(call, ctx).await {
            Err(message) => failure(message),
            Ok(Ok(value)) => value.to_string(),
            Ok(Err(e)) => {
                error!(error = %e, arguments = %call.arguments, "Tool {} failed", call.name);
                failure(format!("{:#}", e))
            }
        }
    }
}

fn tool(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// JSON-schema definitions of the built-in tools.
pub fn builtin_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "get_user_info",
            "Get information about a Discord user, including profile info and roles in a server.",
            json!({
                "type": "object",
                "properties": {
                    "userId": { "type": "string", "description": "Discord user ID." },
                    "guildId": { "type": ["string", "null"], "description": "Guild ID to resolve roles. Null means the current server." },
                    "includePresence": { "type": ["boolean", "null"], "description": "Include presence info if available." }
                },
                "required": ["userId", "guildId", "includePresence"],
                "additionalProperties": false
            }),
        ),
        tool(
            "react_message",
            "React to a Discord message. Emoji may be Unicode, a custom emoji id, or <:name:id>, <a:name:id>, name:id, a:name:id, or a configured custom emoji name.",
            json!({
                "type": "object",
                "properties": {
                    "channelId": { "type": ["string", "null"], "description": "Channel containing the message. Null means the current channel." },
                    "messageId": { "type": "string", "description": "Message ID to react to." },
                    "emoji": { "type": "string", "description": "Emoji to react with." }
                },
                "required": ["channelId", "messageId", "emoji"],
                "additionalProperties": false
            }),
        ),
        tool(
            "forward_message",
            "Forward a message from one channel to another. Attachments and embeds travel with the forward.",
            json!({
                "type": "object",
                "properties": {
                    "fromChannelId": { "type": ["string", "null"], "description": "Source channel ID. Null means the current channel." },
                    "messageId": { "type": "string", "description": "Message ID to forward." },
                    "toChannelId": { "type": "string", "description": "Destination channel ID." },
                    "includeAttachments": { "type": ["boolean", "null"], "description": "Include attachments if available." },
                    "includeEmbeds": { "type": ["boolean", "null"], "description": "Include embeds if available." }
                },
                "required": ["fromChannelId", "messageId", "toChannelId", "includeAttachments", "includeEmbeds"],
                "additionalProperties": false
            }),
        ),
        tool(
            "get_server_info",
            "Get information about a Discord server, including channels and roles if requested.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID. Null means the current server." },
                    "includeChannels": { "type": ["boolean", "null"], "description": "Include the channel list. Default true." },
                    "includeRoles": { "type": ["boolean", "null"], "description": "Include the role list. Default true." }
                },
                "required": ["guildId", "includeChannels", "includeRoles"],
                "additionalProperties": false
            }),
        ),
        tool(
            "list_memories",
            "List or search short-term memory items for a Discord server.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID. Null means the current server." },
                    "query": { "type": ["string", "null"], "description": "Filter memory items by content." },
                    "limit": { "type": ["number", "null"], "description": "Maximum number of items to return." }
                },
                "required": ["guildId", "query", "limit"],
                "additionalProperties": false
            }),
        ),
        tool(
            "create_memory",
            "Create a short-term memory item in the server's memory bank with an optional expiration in seconds.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID. Null means the current server." },
                    "content": { "type": "string", "description": "Memory content to store." },
                    "ttlSeconds": { "type": ["number", "null"], "description": "Expiration in seconds. Null uses the default." }
                },
                "required": ["guildId", "content", "ttlSeconds"],
                "additionalProperties": false
            }),
        ),
        tool(
            "list_conversations",
            "List in-memory chat conversations of other channels.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID filter. Null means the current server." },
                    "includeCurrent": { "type": ["boolean", "null"], "description": "Include the current channel. Default false." },
                    "limit": { "type": ["number", "null"], "description": "Maximum number of conversations to return." }
                },
                "required": ["guildId", "includeCurrent", "limit"],
                "additionalProperties": false
            }),
        ),
        tool(
            "search_conversation_history",
            "Search in-memory conversation history across other channels.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID filter. Null means the current server." },
                    "channelIds": { "type": ["array", "null"], "items": { "type": "string" }, "description": "Channels to search. Null searches all." },
                    "query": { "type": "string", "description": "Text to match." },
                    "limit": { "type": ["number", "null"], "description": "Maximum matches to return." },
                    "maxPerChannel": { "type": ["number", "null"], "description": "Maximum matches per channel." },
                    "includeCurrent": { "type": ["boolean", "null"], "description": "Include the current channel. Default false." }
                },
                "required": ["guildId", "channelIds", "query", "limit", "maxPerChannel", "includeCurrent"],
                "additionalProperties": false
            }),
        ),
        tool(
            "list_emojis",
            "List available custom emojis with id, name and animated flag.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": ["string", "null"], "description": "Optional name filter." }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ),
        tool(
            "fetch_recent_messages",
            "Fetch the last N messages from a channel.",
            json!({
                "type": "object",
                "properties": {
                    "channelId": { "type": ["string", "null"], "description": "Channel ID. Null means the current channel." },
                    "limit": { "type": "number", "description": "Number of recent messages to fetch (1-50)." }
                },
                "required": ["channelId", "limit"],
                "additionalProperties": false
            }),
        ),
        tool(
            "search_messages",
            "Search messages server-wide with Discord's search endpoint and filters.",
            json!({
                "type": "object",
                "properties": {
                    "guildId": { "type": ["string", "null"], "description": "Guild ID. Null means the current server." },
                    "query": { "type": "string", "description": "Keyword to match in message content." },
                    "limit": { "type": ["number", "null"], "description": "Max results to return (1-25)." },
                    "scanLimit": { "type": ["number", "null"], "description": "How many channels to include when auto-selecting (1-50)." },
                    "channelLimit": { "type": ["number", "null"], "description": "Max number of channels to scan (1-50)." },
                    "sortBy": { "type": ["string", "null"], "description": "Sorting mode, e.g. timestamp." },
                    "sortOrder": { "type": ["string", "null"], "description": "asc or desc." },
                    "authorIds": { "type": ["array", "null"], "items": { "type": ["string", "null"] }, "description": "Filter by author IDs." },
                    "mentions": { "type": ["array", "null"], "items": { "type": ["string", "null"] }, "description": "Filter by mentioned user IDs." },
                    "channelIds": { "type": ["array", "null"], "items": { "type": "string" }, "description": "Restrict the search to these channels." },
                    "minId": { "type": ["string", "null"], "description": "Minimum message ID (snowflake)." },
                    "maxId": { "type": ["string", "null"], "description": "Maximum message ID (snowflake)." },
                    "offset": { "type": ["number", "null"], "description": "Result offset (0-9975)." },
                    "pinned": { "type": ["boolean", "null"], "description": "Only pinned messages." },
                    "includeNsfw": { "type": ["boolean", "null"], "description": "Include NSFW channels." }
                },
                "required": ["guildId", "query", "limit", "scanLimit", "channelLimit", "sortBy", "sortOrder", "authorIds", "mentions", "channelIds", "minId", "maxId", "offset", "pinned", "includeNsfw"],
                "additionalProperties": false
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_reaction_forms() {
        let table = EmojiTable::parse("wave:10,party:20:a");
        assert_eq!(
            resolve_reaction("<a:dance:55>", &table),
            ReactionEmoji::Custom {
                id: 55,
                name: Some("dance".into()),
                animated: true
            }
        );
        assert_eq!(
            resolve_reaction("spin:66", &table),
            ReactionEmoji::Custom {
                id: 66,
                name: Some("spin".into()),
                animated: false
            }
        );
        assert_eq!(
            resolve_reaction("a:spin:66", &table),
            ReactionEmoji::Custom {
                id: 66,
                name: Some("spin".into()),
                animated: true
            }
        );
        assert_eq!(
            resolve_reaction(":party:", &table),
            ReactionEmoji::Custom {
                id: 20,
                name: Some("party".into()),
                animated: true
            }
        );
        assert_eq!(
            resolve_reaction("123", &table),
            ReactionEmoji::Custom {
                id: 123,
                name: None,
                animated: false
            }
        );
        assert_eq!(resolve_reaction(" 😄 ", &table), ReactionEmoji::Unicode("😄".into()));
        assert_eq!(resolve_reaction("unknown", &table), ReactionEmoji::Unicode("unknown".into()));
    }

    #[test]
    fn test_clamp_limit_and_excerpt() {
        assert_eq!(clamp_limit(None, 50, 1, 100), 50);
        assert_eq!(clamp_limit(Some(500.7), 50, 1, 100), 100);
        assert_eq!(clamp_limit(Some(-3.0), 50, 1, 100), 1);
        let long = "x".repeat(600);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_MAX_CHARS);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_definitions_cover_dispatch() {
        let names: Vec<String> = builtin_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "get_user_info",
                "react_message",
                "forward_message",
                "get_server_info",
                "list_memories",
                "create_memory",
                "list_conversations",
                "search_conversation_history",
                "list_emojis",
                "fetch_recent_messages",
                "search_messages"
            ]
        );
    }

    #[tokio::test]
    async fn test_no_tools_reports_unknown() {
        let call = FunctionCall {
            call_id: "c1".into(),
            name: "anything".into(),
            arguments: "{}".into(),
        };
        let ctx = ToolContext {
            channel: Channel {
                id: 1,
                guild_id: None,
                name: None,
            },
            message_id: None,
            author_id: None,
        };
        let out: Value = serde_json::from_str(&NoTools.execute(&call, &ctx).await).unwrap();
        assert_eq!(out["ok"], false);
        assert_eq!(out["error"], "Unknown tool: anything");
    }
}
