//! Process supervisor: attach to a running backend, or launch one and wait for it to listen.
//!
//! Two windows: the connect window polls for an existing backend; when it expires the backend is
//! launched and the boot window polls again. A launch always pays the full connect window first.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ReplConfig;
use crate::error::{ReplError, Result};

/// Exit of a launched backend: `Ok(())` on a clean exit, `Err(reason)` otherwise.
pub type LaunchOutcome = std::result::Result<(), String>;

/// Starts the backend process. The returned receiver fires once when the process exits.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, config: &ReplConfig) -> Result<oneshot::Receiver<LaunchOutcome>>;
}

/// Launches `config.executable_path` with the protocol's headless-server arguments. The child's
/// stdio is inherited; its exit is awaited on a spawned task and reported on the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, config: &ReplConfig) -> Result<oneshot::Receiver<LaunchOutcome>> {
        let args = config.protocol.launch_args(&config.host, config.port);
        info!(executable = %config.executable_path, args = ?args, "Launching REPL backend");

        // A console REPL that sees EOF on stdin exits and takes the socket server with it.
        let mut child = Command::new(&config.executable_path)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ReplError::Launch(format!("{}: {}", config.executable_path, e)))?;

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) if status.success() => {
                    info!("REPL backend exited");
                    Ok(())
                }
                Ok(status) => {
                    error!(status = %status, "REPL backend exited with failure");
                    Err(format!("backend exited with {}", status))
                }
                Err(e) => {
                    error!(error = %e, "Failed to wait for REPL backend");
                    Err(e.to_string())
                }
            };
            let _ = tx.send(outcome);
        });

        Ok(rx)
    }
}

/// Connection obtained by [`acquire_connection`].
#[derive(Debug)]
pub struct Acquired {
    pub stream: TcpStream,
    /// True when the backend had to be launched (initialization commands are due).
    pub launched: bool,
}

/// Returns a connection to the backend at `config.address()`, launching it if nothing answers
/// within the connect window. Failing the boot window as well is fatal to the caller.
#[instrument(skip(config, launcher), fields(addr = %config.address()))]
pub async fn acquire_connection(config: &ReplConfig, launcher: &dyn Launcher) -> Result<Acquired> {
    let addr = config.address();

    let connect_attempts = config.attempts_in(config.connect_window);
    if let Some(stream) = poll_dial(config, &addr, connect_attempts, None).await? {
        info!(addr = %addr, "There is an existing REPL");
        return Ok(Acquired {
            stream,
            launched: false,
        });
    }

    warn!(
        addr = %addr,
        executable = %config.executable_path,
        "Failed to connect to an existing REPL, trying to launch one"
    );
    let mut exit_rx = launcher.launch(config).await?;

    info!(addr = %addr, "Waiting for REPL to boot");
    let boot_attempts = config.attempts_in(config.boot_window);
    match poll_dial(config, &addr, boot_attempts, Some(&mut exit_rx)).await? {
        Some(stream) => {
            info!(addr = %addr, "Connected to launched REPL");
            Ok(Acquired {
                stream,
                launched: true,
            })
        }
        None => {
            error!(addr = %addr, "Failed to connect to launched REPL");
            Err(ReplError::BackendUnreachable {
                addr,
                waited: config.connect_window + config.boot_window,
            })
        }
    }
}

async fn poll_dial(
    config: &ReplConfig,
    addr: &str,
    attempts: u32,
    mut exit_rx: Option<&mut oneshot::Receiver<LaunchOutcome>>,
) -> Result<Option<TcpStream>> {
    for attempt in 1..=attempts {
        match timeout(config.poll_interval, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(Some(stream)),
            Ok(Err(e)) => debug!(attempt, error = %e, "Dial failed"),
            Err(_) => debug!(attempt, "Dial timed out"),
        }

        if let Some(rx) = exit_rx.as_mut() {
            match rx.try_recv() {
                Ok(Err(reason)) => return Err(ReplError::Launch(reason)),
                Ok(Ok(())) => warn!("REPL backend exited before accepting connections"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
            }
        }

        if attempt < attempts {
            sleep(config.poll_interval).await;
        }
    }
    Ok(None)
}
