//! Converts an incoming message into the structured user turn sent to the model.
//!
//! The text part is a JSON object describing channel, author, reply target and the
//! message text with user and role mentions expanded to readable tags. Image
//! attachments become image parts.

use crate::core::{Message, User};
use llm_client::{ContentPart, ConversationTurn, Role};
use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@(!|&)?(\d+)>").expect("invalid regex"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelRef<'a> {
    id: String,
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorRef<'a> {
    id: String,
    username: &'a str,
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyingTo<'a> {
    id: String,
    username: &'a str,
    display_name: &'a str,
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload<'a> {
    current_channel: ChannelRef<'a>,
    channel_id: String,
    server_id: Option<String>,
    message_id: String,
    message_author: AuthorRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replying_to: Option<ReplyingTo<'a>>,
    message: String,
}

/// Replaces `<@id>` / `<@!id>` with `[display (username) <@id>]` and `<@&id>` with
/// `[role name <@&id>]` in one pass. Unknown ids are left as they are.
pub fn expand_mentions(message: &Message) -> String {
    MENTION_RE
        .replace_all(&message.content, |caps: &Captures| {
            let raw = caps[0].to_string();
            let Ok(id) = caps[2].parse::<u64>() else {
                return raw;
            };
            if caps.get(1).is_some_and(|m| m.as_str() == "&") {
                return match message.role_mentions.iter().find(|r| r.id == id) {
                    Some(role) => format!("[role {} <@&{}>]", role.name, role.id),
                    None => raw,
                };
            }
            match message.mentions.iter().find(|u| u.id == id) {
                Some(user) => format!("[{} ({}) <@{}>]", user.display(), user.username, user.id),
                None => raw,
            }
        })
        .into_owned()
}

/// JSON text describing the message for the model.
pub fn message_payload(message: &Message, reply_author: Option<&User>) -> String {
    let payload = MessagePayload {
        current_channel: ChannelRef {
            id: message.channel.id.to_string(),
            name: message.channel.name.as_deref(),
        },
        channel_id: message.channel.id.to_string(),
        server_id: message.channel.guild_id.map(|g| g.to_string()),
        message_id: message.id.to_string(),
        message_author: AuthorRef {
            id: message.author.id.to_string(),
            username: &message.author.username,
            display_name: message.author.display(),
        },
        replying_to: match (&message.reply_to, reply_author) {
            (Some(reply), Some(author)) => Some(ReplyingTo {
                id: author.id.to_string(),
                username: &author.username,
                display_name: author.display(),
                message_id: reply.message_id.to_string(),
            }),
            _ => None,
        },
        message: expand_mentions(message),
    };
    // Serializing plain strings and options cannot fail.
    serde_json::to_string(&payload).unwrap_or_default()
}

/// User turn for `message`, or `None` when it has neither text nor images.
pub fn build_user_turn(message: &Message, reply_author: Option<&User>) -> Option<ConversationTurn> {
    let mut content = Vec::new();
    if !message.content.trim().is_empty() {
        content.push(ContentPart::text(message_payload(message, reply_author)));
    }
    content.extend(message.image_urls().map(ContentPart::image));
    if content.is_empty() {
        return None;
    }
    Some(ConversationTurn::new(Role::User, content).at(message.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Attachment, Channel, ReplyRef, RoleMention};
    use chrono::Utc;

    fn user(id: u64, name: &str, display: Option<&str>) -> User {
        User {
            id,
            username: name.to_string(),
            display_name: display.map(String::from),
            bot: false,
        }
    }

    fn message(content: &str) -> Message {
        Message {
            id: 900,
            channel: Channel {
                id: 10,
                guild_id: Some(1),
                name: Some("general".to_string()),
            },
            author: user(5, "alice", Some("Alice")),
            content: content.to_string(),
            attachments: Vec::new(),
            mentions: Vec::new(),
            role_mentions: Vec::new(),
            reply_to: None,
            created_at: Utc::now(),
        }
    }

    /// **Test: User and role mentions are expanded to readable tags.**
    #[test]
    fn test_expand_mentions() {
        let mut msg = message("hi <@7> and <@!7>, ping <@&3>");
        msg.mentions.push(user(7, "bob", Some("Bobby")));
        msg.role_mentions.push(RoleMention {
            id: 3,
            name: "mods".to_string(),
        });
        assert_eq!(
            expand_mentions(&msg),
            "hi [Bobby (bob) <@7>] and [Bobby (bob) <@7>], ping [role mods <@&3>]"
        );
    }

    /// **Test: Duplicate mention entries and unknown ids do not nest or change the text.**
    #[test]
    fn test_expand_mentions_duplicates_and_unknown() {
        let mut msg = message("<@!7><@7> <@8> <@&4>");
        msg.mentions.push(user(7, "bob", None));
        msg.mentions.push(user(7, "bob", None));
        assert_eq!(
            expand_mentions(&msg),
            "[bob (bob) <@7>][bob (bob) <@7>] <@8> <@&4>"
        );
    }

    #[test]
    fn test_payload_fields() {
        let mut msg = message("hello");
        msg.reply_to = Some(ReplyRef {
            message_id: 800,
            author: None,
        });
        let replied = user(99, "bot", None);
        let value: serde_json::Value =
            serde_json::from_str(&message_payload(&msg, Some(&replied))).unwrap();
        assert_eq!(value["currentChannel"]["name"], "general");
        assert_eq!(value["channelId"], "10");
        assert_eq!(value["serverId"], "1");
        assert_eq!(value["messageAuthor"]["displayName"], "Alice");
        assert_eq!(value["replyingTo"]["displayName"], "bot");
        assert_eq!(value["replyingTo"]["messageId"], "800");
        assert_eq!(value["message"], "hello");
    }

    /// **Test: A message with no text and no image produces no turn; images alone do.**
    #[test]
    fn test_empty_and_image_only() {
        assert!(build_user_turn(&message("   "), None).is_none());

        let mut msg = message("");
        msg.attachments.push(Attachment {
            url: "https://cdn.example/x.png".to_string(),
            filename: "x.png".to_string(),
            content_type: Some("image/png".to_string()),
        });
        msg.attachments.push(Attachment {
            url: "https://cdn.example/notes.txt".to_string(),
            filename: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
        });
        let turn = build_user_turn(&msg, None).unwrap();
        assert_eq!(turn.content, vec![ContentPart::image("https://cdn.example/x.png")]);
    }
}
