use anyhow::{Context, Result};
use handler_chain::HandlerChain;
use repl_client::ReplClient;
use replbot_core::{init_tracing, Bot};
use replbot_telegram::{build_teloxide_bot, run_repl, TelegramBotAdapter};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, instrument, warn};

use crate::config::BotConfig;
use crate::handlers::{AuthHandler, LoggingHandler, ReplHandler};

/// Builds the chain: logging → allow-list → REPL evaluation.
pub fn build_handler_chain<S>(
    config: &BotConfig,
    bot: Arc<dyn Bot>,
    client: Arc<ReplClient<S>>,
) -> HandlerChain
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    HandlerChain::new()
        .add_handler(Arc::new(LoggingHandler))
        .add_handler(Arc::new(AuthHandler::new(
            config.allowed_usernames().to_vec(),
            bot.clone(),
        )))
        .add_handler(Arc::new(ReplHandler::new(bot, client)))
}

/// Main entry: validate config, init logging, acquire the REPL (fatal on failure), then run the
/// update loop until it exits or SIGINT/SIGTERM arrives. The REPL connection is shut down on the
/// way out.
#[instrument(skip(config))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate()?;
    init_tracing(config.log_file())?;

    let repl = config.repl();
    info!(
        protocol = ?repl.protocol,
        addr = %repl.address(),
        executable = %repl.executable_path,
        "Initializing bot"
    );
    if config.allowed_usernames().is_empty() {
        warn!("ALLOWED_USERNAMES is empty, every user will be rejected");
    }

    let client = Arc::new(
        ReplClient::connect(repl)
            .await
            .context("Failed to connect to REPL")?,
    );

    let teloxide_bot = build_teloxide_bot(config.bot_token(), config.telegram_api_url())?;
    let bot: Arc<dyn Bot> = Arc::new(TelegramBotAdapter::new(teloxide_bot.clone()));
    let handler_chain = build_handler_chain(&config, bot, client.clone());

    info!("Bot started successfully");

    let outcome = tokio::select! {
        result = run_repl(teloxide_bot, handler_chain) => {
            info!("Update loop exited");
            result
        }
        signal = shutdown_signal() => match signal {
            Ok(name) => {
                info!(signal = name, "Received shutdown signal");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signals");
                Err(e)
            }
        },
    };

    client.shutdown().await;
    info!("Bot stopped");
    outcome
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT")?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    Ok("SIGINT")
}
