//! Shared fixtures for discord-bot integration tests: recording Bot, scripted LLM,
//! message builders.

#![allow(dead_code)]

pub mod mock_bot;
pub mod mock_llm;

use chrono::Utc;
use discord_bot::core::{Channel, Message, User};

pub const BOT_ID: u64 = 99;
pub const CHANNEL_ID: u64 = 42;
pub const GUILD_ID: u64 = 1;

pub fn channel() -> Channel {
    Channel {
        id: CHANNEL_ID,
        guild_id: Some(GUILD_ID),
        name: Some("general".into()),
    }
}

pub fn alice() -> User {
    User {
        id: 7,
        username: "alice".into(),
        display_name: Some("Alice".into()),
        bot: false,
    }
}

pub fn bot_user() -> User {
    User {
        id: BOT_ID,
        username: "chatbot".into(),
        display_name: None,
        bot: true,
    }
}

/// Plain message from alice in the test channel.
pub fn user_message(id: u64, content: &str) -> Message {
    Message {
        id,
        channel: channel(),
        author: alice(),
        content: content.to_string(),
        attachments: Vec::new(),
        mentions: Vec::new(),
        role_mentions: Vec::new(),
        reply_to: None,
        created_at: Utc::now(),
    }
}

/// Message from alice that mentions the bot.
pub fn mention_message(id: u64, content: &str) -> Message {
    let mut msg = user_message(id, &format!("<@{}> {}", BOT_ID, content));
    msg.mentions.push(bot_user());
    msg
}
