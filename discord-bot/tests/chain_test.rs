//! Integration tests for the assembled handler chain: text commands, session creation
//! from stored overrides, and bot-message filtering.
//!
//! Components are built from env config with an in-memory SQLite database and the
//! recording Bot / scripted LLM in place of Discord and OpenAI.

mod common;

use common::mock_bot::MockBot;
use common::mock_llm::MockLlm;
use common::{bot_user, user_message, BOT_ID, CHANNEL_ID, GUILD_ID};
use discord_bot::core::{BotIdentity, HandlerResponse};
use discord_bot::{build_bot_components_with, build_handler_chain, BotComponents, BotConfig, HandlerChain};
use serial_test::serial;
use std::env;
use std::sync::Arc;

/// Builds BotConfig for tests: fixed token and key, in-memory DB, long debounce so no
/// model call fires while a test runs.
fn test_config() -> BotConfig {
    env::set_var("DISCORD_TOKEN", "test_discord_token");
    env::set_var("OPENAI_API_KEY", "test_key");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("DEBOUNCE_MS", "60000");
    env::set_var("CHAT_MODE", "chat");
    env::remove_var("MODEL");
    BotConfig::load(None).expect("BotConfig::load must succeed in test setup")
}

async fn setup() -> (BotComponents, HandlerChain, Arc<MockBot>) {
    let config = test_config();
    let bot = Arc::new(MockBot::new());
    let components = build_bot_components_with(&config, bot.clone(), Arc::new(MockLlm::replying("hey")))
        .await
        .unwrap();
    *components.identity.write().await = Some(BotIdentity {
        id: BOT_ID,
        username: "chatbot".into(),
    });
    let chain = build_handler_chain(&components);
    (components, chain, bot)
}

fn reply_text(response: HandlerResponse) -> String {
    match response {
        HandlerResponse::Reply(text) => text,
        other => panic!("expected Reply, got {:?}", other),
    }
}

/// **Test: *model persists the override and the next session is built with it.**
#[tokio::test]
#[serial]
async fn test_model_command_applies_to_new_session() {
    let (components, chain, bot) = setup().await;
    assert_eq!(chain.len(), 3);

    let reply = reply_text(chain.handle(&user_message(1, "*model gpt-4.1-mini")).await.unwrap());
    assert!(reply.contains("gpt-4.1-mini"));
    assert_eq!(bot.sends()[0].1, Some(1), "command reply references the command");

    let stored = components
        .settings_repo
        .get_override(CHANNEL_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.model.as_deref(), Some("gpt-4.1-mini"));

    let response = chain.handle(&user_message(2, "hello")).await.unwrap();
    assert!(matches!(response, HandlerResponse::Stop));
    let session = components.registry.get(CHANNEL_ID).unwrap();
    assert_eq!(session.model(), "gpt-4.1-mini");
    assert_eq!(session.history_len().await, 1);
}

/// **Test: *clear reports the discarded turns and drops the session.**
#[tokio::test]
#[serial]
async fn test_clear_command() {
    let (components, chain, _bot) = setup().await;

    chain.handle(&user_message(1, "hello")).await.unwrap();
    chain.handle(&user_message(2, "again")).await.unwrap();
    assert!(components.registry.get(CHANNEL_ID).is_some());

    let reply = reply_text(chain.handle(&user_message(3, "*clear")).await.unwrap());
    assert!(reply.contains("2 chat contexts"), "{}", reply);
    assert!(components.registry.get(CHANNEL_ID).is_none());

    let reply = reply_text(chain.handle(&user_message(4, "*clear")).await.unwrap());
    assert!(reply.contains("0 chat contexts"), "{}", reply);
}

/// **Test: *nick is stored per guild and invalid commands get a usage reply.**
#[tokio::test]
#[serial]
async fn test_nick_and_invalid_commands() {
    let (components, chain, _bot) = setup().await;

    let reply = reply_text(chain.handle(&user_message(1, "*nick Robo Buddy")).await.unwrap());
    assert!(reply.contains("Robo Buddy"));
    assert_eq!(
        components.settings_repo.get_nickname(GUILD_ID).await.unwrap().as_deref(),
        Some("Robo Buddy")
    );

    let reply = reply_text(chain.handle(&user_message(2, "*mode loud")).await.unwrap());
    assert!(reply.starts_with("⚠️"), "{}", reply);
    assert!(components.registry.is_empty());
}

/// **Test: Messages from bots never reach commands or sessions.**
#[tokio::test]
#[serial]
async fn test_bot_messages_are_dropped() {
    let (components, chain, bot) = setup().await;

    let mut own = user_message(1, "*clear");
    own.author = bot_user();
    let response = chain.handle(&own).await.unwrap();
    assert!(matches!(response, HandlerResponse::Stop));
    assert!(bot.sends().is_empty());
    assert!(components.registry.is_empty());
}

/// **Test: Channel overrides are read back after the components are rebuilt.**
#[tokio::test]
#[serial]
async fn test_overrides_survive_restart() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bot.db");

    let _ = test_config();
    env::set_var("DATABASE_URL", db_path.display().to_string());
    let config = BotConfig::load(None).unwrap();
    let identity = BotIdentity {
        id: BOT_ID,
        username: "chatbot".into(),
    };

    {
        let bot = Arc::new(MockBot::new());
        let components = build_bot_components_with(&config, bot, Arc::new(MockLlm::replying("hey")))
            .await
            .unwrap();
        *components.identity.write().await = Some(identity.clone());
        let chain = build_handler_chain(&components);
        let reply = reply_text(chain.handle(&user_message(1, "*mode assistant")).await.unwrap());
        assert!(reply.contains("assistant"));
    }

    let components = build_bot_components_with(
        &config,
        Arc::new(MockBot::new()),
        Arc::new(MockLlm::replying("hey")),
    )
    .await
    .unwrap();
    let session = components
        .factory
        .get_or_create(&common::channel(), &identity)
        .await;
    assert_eq!(session.mode(), discord_bot::core::ChatMode::Assistant);
}
