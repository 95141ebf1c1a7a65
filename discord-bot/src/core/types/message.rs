//! Message types for the core model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{channel::Channel, user::User};

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("image"))
            .unwrap_or(false)
    }
}

/// A role mentioned in a message, with its resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMention {
    pub id: u64,
    pub name: String,
}

/// Reference to the message being replied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: u64,
    /// Author of the referenced message when the transport delivered it; otherwise it
    /// has to be fetched.
    pub author: Option<User>,
}

/// A single incoming message with author, channel, content and mention/reply context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub channel: Channel,
    pub author: User,
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// Users mentioned in the content.
    pub mentions: Vec<User>,
    pub role_mentions: Vec<RoleMention>,
    pub reply_to: Option<ReplyRef>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn mentions_user(&self, user_id: u64) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }

    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| a.url.as_str())
    }
}
