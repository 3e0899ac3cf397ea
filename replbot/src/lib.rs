//! # replbot
//!
//! Telegram bot in front of a Clojure REPL. Wires replbot-core, handler-chain, replbot-telegram and
//! repl-client: loads config from env, attaches to or launches the backend, and runs the update
//! loop until a shutdown signal.

pub mod cli;
pub mod config;
pub mod handlers;
pub mod runner;

pub use cli::{load_config, Cli, Commands};
pub use config::{BaseConfig, BotConfig};
pub use handlers::{AuthHandler, ChatCommand, LoggingHandler, ReplHandler};
pub use runner::{build_handler_chain, run_bot};
