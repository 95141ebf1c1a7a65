//! BotConfig: BaseConfig + ChatConfig + LLM config. Use load() for env-based loading.

use anyhow::Result;
use llm_client::{EnvLlmConfig, LlmConfig};

use super::{BaseConfig, ChatConfig};

pub struct BotConfig {
    pub base: BaseConfig,
    pub chat: ChatConfig,
    pub llm: EnvLlmConfig,
}

impl BotConfig {
    /// Load full config from environment variables. If `token` is provided it overrides
    /// DISCORD_TOKEN. Call validate() after load to check config before init.
    pub fn load(token: Option<String>) -> Result<Self> {
        let base = BaseConfig::load(token)?;
        let chat = ChatConfig::from_env()?;
        let llm = EnvLlmConfig::from_env()?;
        Ok(Self { base, chat, llm })
    }

    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        self.chat.validate()?;
        if reqwest::Url::parse(self.llm.base_url()).is_err() {
            anyhow::bail!("OPENAI_BASE_URL is not a valid URL: {}", self.llm.base_url());
        }
        Ok(())
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }
    pub fn chat(&self) -> &ChatConfig {
        &self.chat
    }
    pub fn llm(&self) -> &EnvLlmConfig {
        &self.llm
    }

    pub fn discord_token(&self) -> &str {
        &self.base.discord_token
    }
    pub fn database_url(&self) -> &str {
        &self.base.database_url
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn model(&self) -> &str {
        self.llm.model()
    }
}
