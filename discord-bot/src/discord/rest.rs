//! Raw Discord REST calls that serenity's typed routes do not cover: message forwarding
//! and guild message search.

use crate::core::{Attachment, DbotError, MessageMeta, MessageSearch, Result, SearchResults, User};
use super::adapters::pick_display_name;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

pub const API_BASE: &str = "https://discord.com/api/v10";

/// Message reference type that turns a send into a forward.
const REFERENCE_KIND_FORWARD: u8 = 1;

pub struct DiscordRest {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    id: String,
    username: String,
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    url: String,
    filename: String,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    channel_id: String,
    author: RawAuthor,
    #[serde(default)]
    content: String,
    timestamp: Option<String>,
    #[serde(default)]
    attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    total_results: Option<u64>,
    #[serde(default)]
    messages: Vec<Vec<RawMessage>>,
}

fn parse_snowflake(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| DbotError::Bot(format!("Invalid snowflake in response: {}", raw)))
}

impl RawMessage {
    fn into_meta(self) -> Result<MessageMeta> {
        Ok(MessageMeta {
            id: parse_snowflake(&self.id)?,
            channel_id: parse_snowflake(&self.channel_id)?,
            author: User {
                id: parse_snowflake(&self.author.id)?,
                display_name: pick_display_name(None, self.author.global_name.as_deref()),
                username: self.author.username,
                bot: self.author.bot,
            },
            content: self.content,
            attachments: self
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    url: a.url,
                    filename: a.filename,
                    content_type: a.content_type,
                })
                .collect(),
            created_at: self
                .timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
        })
    }
}

/// Search hits arrive as one group per match (the match plus context); the first entry
/// of each group is the hit.
fn parse_search(body: &str, limit: usize) -> Result<SearchResults> {
    let raw: RawSearch = serde_json::from_str(body)
        .map_err(|e| DbotError::Bot(format!("Invalid search response: {}", e)))?;
    let messages = raw
        .messages
        .into_iter()
        .filter_map(|group| group.into_iter().next())
        .take(limit)
        .map(RawMessage::into_meta)
        .collect::<Result<Vec<_>>>()?;
    Ok(SearchResults {
        total: raw.total_results.unwrap_or(messages.len() as u64),
        messages,
    })
}

fn search_params(search: &MessageSearch) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("content", search.content.clone()),
        ("limit", search.limit.to_string()),
        ("sort_by", search.sort_by.clone()),
        ("sort_order", search.sort_order.clone()),
        ("include_nsfw", search.include_nsfw.to_string()),
    ];
    if let Some(id) = search.min_id {
        params.push(("min_id", id.to_string()));
    }
    if let Some(id) = search.max_id {
        params.push(("max_id", id.to_string()));
    }
    if let Some(offset) = search.offset {
        params.push(("offset", offset.to_string()));
    }
    if let Some(pinned) = search.pinned {
        params.push(("pinned", pinned.to_string()));
    }
    params.extend(search.author_ids.iter().map(|id| ("author_id", id.to_string())));
    params.extend(search.mentions.iter().map(|id| ("mentions", id.to_string())));
    params.extend(search.channel_ids.iter().map(|id| ("channel_id", id.to_string())));
    params
}

fn status_error(status: StatusCode, body: &str) -> DbotError {
    let text = format!("{} {}", status, body);
    match status {
        StatusCode::FORBIDDEN => DbotError::Permission(text),
        _ => DbotError::Bot(text),
    }
}

impl DiscordRest {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Forwards `message_id` from `from_channel_id` into `to_channel_id`; returns the new message id.
    pub async fn forward(&self, from_channel_id: u64, message_id: u64, to_channel_id: u64) -> Result<u64> {
        let url = format!("{}/channels/{}/messages", self.base_url, to_channel_id);
        let body = json!({
            "message_reference": {
                "type": REFERENCE_KIND_FORWARD,
                "message_id": message_id.to_string(),
                "channel_id": from_channel_id.to_string(),
                "fail_if_not_exists": true,
            }
        });
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&body)
            .send()
            .await
            .map_err(|e| DbotError::Bot(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| DbotError::Bot(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        let sent: RawMessage = serde_json::from_str(&text)
            .map_err(|e| DbotError::Bot(format!("Invalid forward response: {}", e)))?;
        debug!(from_channel_id, message_id, to_channel_id, "Forwarded message");
        parse_snowflake(&sent.id)
    }

    /// Guild message search. HTTP 202 means the guild is still being indexed.
    pub async fn search(&self, search: &MessageSearch) -> Result<SearchResults> {
        let url = format!("{}/guilds/{}/messages/search", self.base_url, search.guild_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .query(&search_params(search))
            .send()
            .await
            .map_err(|e| DbotError::Bot(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::ACCEPTED {
            warn!(guild_id = search.guild_id, "Search index not ready");
            return Err(DbotError::Bot("Search index not ready. Try again shortly.".into()));
        }
        let text = response.text().await.map_err(|e| DbotError::Bot(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        parse_search(&text, search.limit)
    }
}
