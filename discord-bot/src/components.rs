//! Component factory: builds BotComponents from config. Isolates assembly logic from runner.

use crate::chain::HandlerChain;
use crate::config::BotConfig;
use crate::core::{Bot, BotIdentity};
use crate::discord::DiscordBotAdapter;
use crate::emoji::EmojiTable;
use crate::format::FooterStyle;
use crate::handlers::{CommandHandler, ConversationHandler, LoggingHandler};
use crate::registry::SessionRegistry;
use crate::session::{SessionDeps, SessionFactory, SessionSettings};
use crate::tools::BuiltinTools;
use anyhow::Result;
use llm_client::{LlmClient, LlmConfig, OpenAILlmClient};
use std::sync::Arc;
use storage::{MemoryRepository, SettingsRepository, SqlitePoolManager};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

/// Core dependencies for run_bot; produced by the component factory.
#[derive(Clone)]
pub struct BotComponents {
    pub bot: Arc<dyn Bot>,
    pub llm: Arc<dyn LlmClient>,
    pub settings_repo: SettingsRepository,
    pub memories: MemoryRepository,
    pub registry: Arc<SessionRegistry>,
    pub factory: Arc<SessionFactory>,
    pub emojis: Arc<EmojiTable>,
    /// Filled by the gateway ready event.
    pub identity: Arc<RwLock<Option<BotIdentity>>>,
}

/// Session defaults derived from the chat and LLM config.
pub fn session_defaults(config: &BotConfig, emojis: &EmojiTable) -> SessionSettings {
    let chat = config.chat();
    let template = chat
        .system_prompt
        .clone()
        .unwrap_or_else(|| prompt::DEFAULT_INSTRUCTIONS.to_string());

    let mut settings = SessionSettings::new(config.model(), chat.default_mode, template);
    settings.thinking_template = chat.thinking_message.clone();
    settings.wake_keywords = chat.wake_keywords.clone();
    settings.debounce = chat.debounce();
    settings.max_length = chat.message_max_length;
    settings.history_retention = chat.history_retention();
    settings.max_tool_passes = chat.max_tool_passes;
    settings.footer = FooterStyle::from_emojis(emojis);
    settings
}

/// Builds components with the serenity HTTP adapter and the OpenAI client.
#[instrument(skip(config))]
pub async fn build_bot_components(config: &BotConfig) -> Result<BotComponents> {
    let bot: Arc<dyn Bot> = Arc::new(DiscordBotAdapter::from_token(config.discord_token()));
    let llm_cfg = config.llm();
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAILlmClient::with_base_url(
        llm_cfg.api_key().to_string(),
        llm_cfg.base_url().to_string(),
    ));
    build_bot_components_with(config, bot, llm).await
}

/// Builds components around the given bot and LLM client (used by tests to inject mocks).
#[instrument(skip(config, bot, llm))]
pub async fn build_bot_components_with(
    config: &BotConfig,
    bot: Arc<dyn Bot>,
    llm: Arc<dyn LlmClient>,
) -> Result<BotComponents> {
    let pool = SqlitePoolManager::new(config.database_url())
        .await
        .map_err(|e| {
            error!(
                error = %e,
                database_url = %config.database_url(),
                "Failed to open database"
            );
            anyhow::anyhow!("Failed to open database: {}", e)
        })?;
    let settings_repo = SettingsRepository::with_pool(pool.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize settings storage: {}", e))?;
    let memories = MemoryRepository::with_pool(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize memory storage: {}", e))?;

    let emojis = Arc::new(EmojiTable::parse(&config.chat().custom_emojis));
    let registry = Arc::new(SessionRegistry::new());
    let tools = Arc::new(BuiltinTools::new(
        bot.clone(),
        Some(memories.clone()),
        emojis.clone(),
        Arc::downgrade(&registry),
    ));

    let deps = SessionDeps {
        bot: bot.clone(),
        llm: llm.clone(),
        tools,
        emojis: emojis.clone(),
    };
    let factory = Arc::new(SessionFactory::new(
        session_defaults(config, &emojis),
        config.chat().bot_nickname.clone(),
        deps,
        Some(settings_repo.clone()),
        registry.clone(),
    ));

    info!(
        model = %config.model(),
        mode = %config.chat().default_mode,
        custom_emojis = emojis.iter().count(),
        "Bot components built"
    );

    Ok(BotComponents {
        bot,
        llm,
        settings_repo,
        memories,
        registry,
        factory,
        emojis,
        identity: Arc::new(RwLock::new(None)),
    })
}

/// Chain order: logging, text commands, conversation.
pub fn build_handler_chain(components: &BotComponents) -> HandlerChain {
    HandlerChain::new()
        .add_handler(Arc::new(LoggingHandler))
        .add_handler(Arc::new(CommandHandler::new(
            components.bot.clone(),
            components.factory.clone(),
        )))
        .add_handler(Arc::new(ConversationHandler::new(
            components.factory.clone(),
            components.identity.clone(),
        )))
}
