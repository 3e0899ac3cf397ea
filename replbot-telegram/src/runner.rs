//! Update loop: converts teloxide messages (new and edited) to core messages and runs the handler
//! chain on each.

use anyhow::Result;
use handler_chain::HandlerChain;
use replbot_core::{MessageType, ToCoreMessage};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::TelegramMessageWrapper;

/// Routes new and edited messages to the same endpoint, so editing a form re-evaluates it.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_edited_message().endpoint(handle_message))
}

async fn handle_message(msg: Message, chain: HandlerChain) -> ResponseResult<()> {
    let core_msg = TelegramMessageWrapper(&msg).to_core();
    match core_msg.message_type {
        MessageType::Text => info!(
            user_id = core_msg.user.id,
            chat_id = core_msg.chat.id,
            edited = msg.edit_date().is_some(),
            message_content = %core_msg.content,
            "Received message"
        ),
        MessageType::Document => info!(
            user_id = core_msg.user.id,
            chat_id = core_msg.chat.id,
            file_name = ?core_msg.document.as_ref().and_then(|d| d.file_name.as_deref()),
            "Received document"
        ),
        MessageType::Other => info!(
            user_id = core_msg.user.id,
            chat_id = core_msg.chat.id,
            "Received non-text message"
        ),
    }

    if let Err(e) = chain.handle(&core_msg).await {
        error!(error = %e, user_id = core_msg.user.id, "Handler chain failed");
    }
    Ok(())
}

/// Starts long polling with the given teloxide Bot and HandlerChain. Returns when the dispatcher
/// stops.
///
/// The chain is awaited inline: updates from one chat are handled one after another, and every
/// evaluation goes through the single REPL connection anyway. Signals are left to the caller.
#[instrument(skip(bot, handler_chain))]
pub async fn run_repl(bot: teloxide::Bot, handler_chain: HandlerChain) -> Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(
            username = %me.user.username.as_deref().unwrap_or("unknown"),
            first_name = %me.user.first_name,
            "Starting bot"
        ),
        Err(e) => warn!(error = %e, "Failed to get info of the bot"),
    }

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![handler_chain])
        .default_handler(|update| async move {
            debug!(update_id = ?update.id, "Ignoring unsupported update");
        })
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use replbot_core::{Handler, HandlerResponse, Message as CoreMessage};
    use std::ops::ControlFlow;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Handler for RecordingHandler {
        async fn handle(&self, message: &CoreMessage) -> replbot_core::Result<HandlerResponse> {
            self.seen.lock().unwrap().push(message.content.clone());
            Ok(HandlerResponse::Reply(String::new()))
        }
    }

    fn update(kind: &str, text: &str) -> Update {
        let mut message = serde_json::json!({
            "message_id": 5,
            "date": 1700000000,
            "chat": { "id": 42, "type": "private", "first_name": "Ann", "username": "ann" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann", "username": "ann" },
            "text": text,
        });
        if kind == "edited_message" {
            message["edit_date"] = serde_json::json!(1700000100);
        }
        let mut root = serde_json::Map::new();
        root.insert("update_id".to_string(), serde_json::json!(1));
        root.insert(kind.to_string(), message);
        serde_json::from_str(&serde_json::Value::Object(root).to_string()).unwrap()
    }

    async fn dispatch(update: Update) -> Vec<String> {
        let recorder = Arc::new(RecordingHandler::default());
        let chain = HandlerChain::new().add_handler(recorder.clone());
        let outcome = schema().dispatch(dptree::deps![update, chain]).await;
        assert!(matches!(outcome, ControlFlow::Break(Ok(()))));
        let seen = recorder.seen.lock().unwrap().clone();
        seen
    }

    /// **Test: a new text message reaches the chain.**
    #[tokio::test]
    async fn test_new_message_reaches_chain() {
        assert_eq!(dispatch(update("message", "(+ 1 2)")).await, vec!["(+ 1 2)"]);
    }

    /// **Test: an edited message is routed through the same chain, so the edited form is evaluated.**
    #[tokio::test]
    async fn test_edited_message_reaches_chain() {
        assert_eq!(
            dispatch(update("edited_message", "(+ 1 3)")).await,
            vec!["(+ 1 3)"]
        );
    }
}
