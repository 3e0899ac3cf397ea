//! # replbot-telegram
//!
//! Telegram layer: adapters from teloxide types, the [`replbot_core::Bot`] implementation and the
//! update loop feeding the handler chain. No REPL logic lives here.

mod adapters;
mod bot_adapter;
mod runner;

pub use adapters::{TelegramMessageWrapper, TelegramUserWrapper};
pub use bot_adapter::{build_teloxide_bot, fit_message, TelegramBotAdapter, MAX_MESSAGE_LEN};
pub use runner::{run_repl, schema};
