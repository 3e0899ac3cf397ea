//! BotConfig: BaseConfig + ReplConfig. Use load() for env-based loading.

use anyhow::{Context, Result};
use repl_client::ReplConfig;

use super::BaseConfig;

/// Bot config: chat side plus REPL client side. Built once and passed by reference.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub base: BaseConfig,
    pub repl: ReplConfig,
}

impl BotConfig {
    /// Load full config from environment variables. If `token` is provided it overrides BOT_TOKEN.
    /// Call validate() after load to check config before init.
    pub fn load(token: Option<String>) -> Result<Self> {
        let base = BaseConfig::load(token)?;
        let repl = ReplConfig::from_env().context("Failed to load REPL config")?;
        Ok(Self { base, repl })
    }

    /// Validate config. Call after load() to fail fast before init.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        self.repl.validate()
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }
    pub fn repl(&self) -> &ReplConfig {
        &self.repl
    }

    pub fn bot_token(&self) -> &str {
        &self.base.bot_token
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn telegram_api_url(&self) -> Option<&str> {
        self.base.telegram_api_url.as_deref()
    }
    pub fn allowed_usernames(&self) -> &[String] {
        &self.base.allowed_usernames
    }
}
