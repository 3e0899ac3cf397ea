//! Handlers for logging and the username allow-list.

use std::sync::Arc;

use async_trait::async_trait;
use replbot_core::{Bot, Handler, HandlerResponse, Message, Result};
use tracing::{debug, info, instrument, warn};

/// Logs each message in before() and the response in after(); always continues.
pub struct LoggingHandler;

#[async_trait]
impl Handler for LoggingHandler {
    #[instrument(skip(self, message))]
    async fn before(&self, message: &Message) -> Result<bool> {
        info!(
            user_id = message.user.id,
            username = %message.user.username.as_deref().unwrap_or("unknown"),
            message_type = ?message.message_type,
            message_content = %message.content,
            "Received message"
        );
        Ok(true)
    }

    #[instrument(skip(self, message, response))]
    async fn after(&self, message: &Message, response: &HandlerResponse) -> Result<()> {
        debug!(
            message_id = ?message.id,
            response = ?response,
            "Processed message"
        );
        Ok(())
    }
}

/// Lets through only users whose username is in the allow-list. Anyone else is told their id is
/// not allowed and the chain stops. An empty list allows nobody.
pub struct AuthHandler {
    allowed_usernames: Vec<String>,
    bot: Arc<dyn Bot>,
}

impl AuthHandler {
    /// Creates a handler that allows only the given usernames (compared without a leading `@`).
    pub fn new(allowed_usernames: Vec<String>, bot: Arc<dyn Bot>) -> Self {
        let allowed_usernames = allowed_usernames
            .into_iter()
            .map(|name| name.trim_start_matches('@').to_string())
            .collect();
        Self {
            allowed_usernames,
            bot,
        }
    }

    fn is_allowed(&self, username: Option<&str>) -> bool {
        username.is_some_and(|name| self.allowed_usernames.iter().any(|allowed| allowed == name))
    }
}

/// Reply sent to users outside the allow-list.
pub fn unauthorized_message(message: &Message) -> String {
    let id = match message.user.username.as_deref() {
        Some(username) => username.to_string(),
        None => message.user.id.to_string(),
    };
    format!("Your id: @{} is not allowed to use this bot.", id)
}

#[async_trait]
impl Handler for AuthHandler {
    #[instrument(skip(self, message))]
    async fn before(&self, message: &Message) -> Result<bool> {
        let username = message.user.username.as_deref();
        if self.is_allowed(username) {
            debug!(user_id = message.user.id, "User authorized");
            return Ok(true);
        }

        warn!(
            user_id = message.user.id,
            username = %username.unwrap_or("unknown"),
            "Received an update from an unauthorized user"
        );
        self.bot
            .reply_to(message, &unauthorized_message(message))
            .await?;
        Ok(false)
    }
}
