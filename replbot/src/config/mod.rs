//! Bot configuration: BaseConfig (Telegram + log + allow-list) + ReplConfig (backend and transport).

mod base;
mod bot_config;


pub use base::BaseConfig;
pub use bot_config::BotConfig;
