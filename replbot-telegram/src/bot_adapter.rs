//! Wraps teloxide::Bot and implements [`replbot_core::Bot`]. Production code talks to Telegram;
//! tests substitute another Bot impl.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use replbot_core::{download_file_name, Bot as CoreBot, Chat, BotError, Document, Message, Result};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, FileId};
use tracing::{error, info, warn};

/// Creates a teloxide Bot for `token`, pointed at `api_url` when given (e.g. a local Bot API server).
pub fn build_teloxide_bot(token: &str, api_url: Option<&str>) -> anyhow::Result<teloxide::Bot> {
    let bot = teloxide::Bot::new(token);
    match api_url {
        Some(url_str) => {
            let url = reqwest::Url::parse(url_str).map_err(|e| {
                anyhow::anyhow!("Invalid TELEGRAM_API_URL {}: {}", url_str, e)
            })?;
            info!(url = %url, "Using custom Telegram API URL");
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Telegram rejects messages longer than this many UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;
const TRUNCATED_MARKER: &str = "\n... (truncated)";

/// Cuts `text` on a char boundary and appends a marker when it exceeds [`MAX_MESSAGE_LEN`].
pub fn fit_message(text: &str) -> Cow<'_, str> {
    if text.encode_utf16().count() <= MAX_MESSAGE_LEN {
        return Cow::Borrowed(text);
    }
    let budget = MAX_MESSAGE_LEN - TRUNCATED_MARKER.encode_utf16().count();
    let mut used = 0;
    let mut end = 0;
    for (idx, c) in text.char_indices() {
        if used + c.len_utf16() > budget {
            break;
        }
        used += c.len_utf16();
        end = idx + c.len_utf8();
    }
    Cow::Owned(format!("{}{}", &text[..end], TRUNCATED_MARKER))
}

/// Thin wrapper around teloxide::Bot that implements replbot-core's Bot trait.
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    /// Creates an adapter from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()> {
        let text = fit_message(text);
        if let Cow::Owned(_) = text {
            warn!(chat_id = chat.id, limit = MAX_MESSAGE_LEN, "Reply too long, truncated");
        }
        self.bot
            .send_message(ChatId(chat.id), text.into_owned())
            .await
            .map_err(|e| BotError::Bot(e.to_string()))?;
        Ok(())
    }

    async fn reply_to(&self, message: &Message, text: &str) -> Result<()> {
        self.send_message(&message.chat, text).await
    }

    async fn send_typing(&self, chat: &Chat) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat.id), ChatAction::Typing)
            .await
            .map_err(|e| BotError::Bot(e.to_string()))?;
        Ok(())
    }

    async fn download_file(&self, document: &Document, dest_dir: &Path) -> Result<PathBuf> {
        let file = self
            .bot
            .get_file(FileId(document.file_id.clone()))
            .await
            .map_err(|e| BotError::Download(e.to_string()))?;

        let dest = dest_dir.join(download_file_name(document));
        let mut dst = tokio::fs::File::create(&dest).await?;
        if let Err(e) = self.bot.download_file(&file.path, &mut dst).await {
            error!(error = %e, file_id = %document.file_id, "Failed to download file");
            if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
                warn!(error = %remove_err, path = %dest.display(), "Failed to remove partial download");
            }
            return Err(BotError::Download(e.to_string()));
        }

        info!(file_id = %document.file_id, path = %dest.display(), "Downloaded file");
        Ok(dest)
    }
}
