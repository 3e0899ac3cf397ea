//! # replbot-core
//!
//! Core types and traits for the REPL bot: [`Bot`], [`Handler`], message, document and user types,
//! and tracing initialization. Transport-agnostic; used by replbot-telegram and handler-chain.

pub mod bot;
pub mod error;
pub mod logger;
pub mod types;

pub use bot::{download_file_name, Bot};
pub use error::{BotError, HandlerError, Result};
pub use logger::init_tracing;
pub use types::{
    Chat, Document, Handler, HandlerResponse, Message, MessageType, ToCoreMessage, ToCoreUser,
    User,
};
