//! Chat commands to REPL operations: evaluates text, loads uploaded files, answers with the
//! rendered response batch.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use repl_client::{commands, render, ReplClient, ResponseRecord};
use replbot_core::{Bot, Document, Handler, HandlerResponse, Message, MessageType, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{error, info, instrument, warn};

pub const MESSAGE_WELCOME: &str = "Welcome!";
pub const MESSAGE_FAILED_TO_RESET: &str = "Failed to reset REPL.";
pub const MESSAGE_NO_OUTPUT: &str = "(no output)";
pub const MESSAGE_UNPROCESSABLE: &str = "Error: couldn't process your message.";

/// Bot commands understood before falling back to evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Reset,
    Publics,
}

impl ChatCommand {
    /// Parses `/start`, `/reset`, `/publics`, also in the `/cmd@botname` form used in groups.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(ChatCommand::Start),
            "reset" => Some(ChatCommand::Reset),
            "publics" => Some(ChatCommand::Publics),
            _ => None,
        }
    }
}

/// Terminal handler: every message that reaches it gets exactly one reply.
pub struct ReplHandler<S = TcpStream> {
    bot: Arc<dyn Bot>,
    client: Arc<ReplClient<S>>,
    download_dir: PathBuf,
}

impl<S> ReplHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Uploaded files are downloaded into the system temp directory.
    pub fn new(bot: Arc<dyn Bot>, client: Arc<ReplClient<S>>) -> Self {
        Self::with_download_dir(bot, client, std::env::temp_dir())
    }

    pub fn with_download_dir(
        bot: Arc<dyn Bot>,
        client: Arc<ReplClient<S>>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bot,
            client,
            download_dir: download_dir.into(),
        }
    }

    /// Reply text for a text message.
    pub async fn reply_for_text(&self, text: &str) -> String {
        match ChatCommand::parse(text) {
            Some(ChatCommand::Start) => MESSAGE_WELCOME.to_string(),
            Some(ChatCommand::Reset) => match self.client.eval(commands::RESET).await {
                Ok(records) => render_or_placeholder(&records),
                Err(e) => {
                    error!(error = %e, "Failed to reset REPL");
                    MESSAGE_FAILED_TO_RESET.to_string()
                }
            },
            Some(ChatCommand::Publics) => self.eval_reply(commands::PUBLICS).await,
            None => self.eval_reply(text).await,
        }
    }

    /// Reply text for an uploaded document: download, load, delete.
    pub async fn reply_for_document(&self, document: &Document) -> String {
        let path = match self.bot.download_file(document, &self.download_dir).await {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, file_id = %document.file_id, "Failed to download the document");
                return format!("Failed to download the document: {}", e);
            }
        };

        let reply = match self.client.load_file(&path).await {
            Ok(records) => render_or_placeholder(&records),
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to load file");
                format!("Failed to load file: {}", e)
            }
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(error = %e, path = %path.display(), "Failed to delete downloaded file");
        }
        reply
    }

    async fn eval_reply(&self, code: &str) -> String {
        match self.client.eval(code).await {
            Ok(records) => render_or_placeholder(&records),
            Err(e) => {
                error!(error = %e, "Failed to evaluate");
                format!("Error: {}", e)
            }
        }
    }
}

/// Rendered batch, or a placeholder when nothing printable came back.
pub fn render_or_placeholder(records: &[ResponseRecord]) -> String {
    let rendered = render(records);
    if rendered.trim().is_empty() {
        MESSAGE_NO_OUTPUT.to_string()
    } else {
        rendered
    }
}

#[async_trait]
impl<S> Handler for ReplHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    #[instrument(skip(self, message))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        if let Err(e) = self.bot.send_typing(&message.chat).await {
            warn!(error = %e, chat_id = message.chat.id, "Failed to send typing indicator");
        }

        let reply = match (message.text(), message.message_type, &message.document) {
            (Some(text), _, _) => self.reply_for_text(text).await,
            (None, MessageType::Document, Some(document)) => {
                self.reply_for_document(document).await
            }
            _ => MESSAGE_UNPROCESSABLE.to_string(),
        };

        info!(
            user_id = message.user.id,
            chat_id = message.chat.id,
            reply_len = reply.len(),
            "Sending reply"
        );
        self.bot.reply_to(message, &reply).await?;
        Ok(HandlerResponse::Reply(reply))
    }
}
