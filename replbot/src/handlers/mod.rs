//! Chain handlers: logging, allow-list auth, REPL evaluation.

mod logging_auth;
mod repl_handler;

pub use logging_auth::{unauthorized_message, AuthHandler, LoggingHandler};
pub use repl_handler::{
    render_or_placeholder, ChatCommand, ReplHandler, MESSAGE_FAILED_TO_RESET, MESSAGE_NO_OUTPUT,
    MESSAGE_UNPROCESSABLE, MESSAGE_WELCOME,
};
