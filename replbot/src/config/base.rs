//! Base config: Telegram Bot connection, logging, allowed users. Loaded from env.

use anyhow::Result;
use std::env;

/// Base config: Telegram-related, logging and the allow-list.
#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// BOT_TOKEN
    pub bot_token: String,
    /// TELEGRAM_API_URL or TELOXIDE_API_URL
    pub telegram_api_url: Option<String>,
    /// Log file path
    pub log_file: String,
    /// ALLOWED_USERNAMES, without leading `@`
    pub allowed_usernames: Vec<String>,
}

impl BaseConfig {
    /// Load from environment variables. `token` overrides BOT_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?,
        };
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/replbot.log".to_string());
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let allowed_usernames = env::var("ALLOWED_USERNAMES")
            .map(|raw| parse_usernames(&raw))
            .unwrap_or_default();

        Ok(Self {
            bot_token,
            telegram_api_url,
            log_file,
            allowed_usernames,
        })
    }

    /// Validate config (e.g. telegram_api_url must be valid URL if set).
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if let Some(ref url_str) = self.telegram_api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                    url_str
                );
            }
        }
        Ok(())
    }
}

/// Splits a comma-separated list, dropping blanks and a leading `@`.
pub(crate) fn parse_usernames(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim().trim_start_matches('@'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
