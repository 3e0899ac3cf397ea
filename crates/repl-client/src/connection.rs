//! Connection manager: one stream to the backend, one exchange at a time.
//!
//! Every operation holds the connection lock for its whole exchange (write, all reads, decode),
//! so concurrent chat handlers never interleave bytes on the wire.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::{Codec, Request};
use crate::commands;
use crate::config::ReplConfig;
use crate::error::{ReplError, Result};
use crate::response::{normalize_all, ResponseRecord};
use crate::retry::{read_accumulated, ReadPolicy};
use crate::supervisor::{acquire_connection, Launcher, ProcessLauncher};

/// Client for a REPL backend over any byte stream (TCP in production).
pub struct ReplClient<S = TcpStream> {
    conn: Mutex<Option<S>>,
    codec: Box<dyn Codec>,
    policy: ReadPolicy,
    verbose: bool,
}

impl ReplClient<TcpStream> {
    /// Attaches to or launches the backend described by `config` and runs the protocol's
    /// initialization commands if it had to be launched.
    pub async fn connect(config: &ReplConfig) -> Result<Self> {
        Self::connect_with(config, &ProcessLauncher).await
    }

    /// Like [`ReplClient::connect`] with a custom launcher.
    pub async fn connect_with(config: &ReplConfig, launcher: &dyn Launcher) -> Result<Self> {
        let acquired = acquire_connection(config, launcher).await?;
        let client = Self::from_stream(
            acquired.stream,
            config.protocol.codec(),
            config.read_policy,
            config.verbose,
        );
        if acquired.launched {
            client.initialize(config.protocol.init_commands()).await;
        }
        Ok(client)
    }
}

impl<S> ReplClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an already connected stream.
    pub fn from_stream(stream: S, codec: Box<dyn Codec>, policy: ReadPolicy, verbose: bool) -> Self {
        Self {
            conn: Mutex::new(Some(stream)),
            codec,
            policy,
            verbose,
        }
    }

    /// Evaluates each command in order. Failures are logged and do not stop the sequence.
    pub async fn initialize(&self, commands: &[&str]) {
        for command in commands {
            if let Err(e) = self.eval(command).await {
                warn!(command = %command, error = %e, "Failed to evaluate initialization command");
            }
        }
    }

    /// Evaluates `code` and returns the decoded records in arrival order.
    #[instrument(skip(self, code))]
    pub async fn eval(&self, code: &str) -> Result<Vec<ResponseRecord>> {
        let mut guard = self.conn.lock().await;
        let stream = guard.as_mut().ok_or(ReplError::Closed)?;

        if self.verbose {
            info!(code = %code, "Will evaluate");
        }
        let records = self.exchange(stream, &Request::eval(code)).await;
        if self.verbose {
            info!(code = %code, records = ?records, "Evaluated");
        }
        records
    }

    /// Loads a source file on the backend; same transport path as [`ReplClient::eval`].
    #[instrument(skip(self, path))]
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<Vec<ResponseRecord>> {
        let path = path.as_ref().to_string_lossy();
        if self.verbose {
            info!(path = %path, "Will load file");
        }
        self.eval(&commands::load_file(&path)).await
    }

    /// Sends the backend shutdown form (best-effort), then closes the connection. Only the first
    /// call does anything; later operations fail with [`ReplError::Closed`].
    pub async fn shutdown(&self) {
        let mut guard = self.conn.lock().await;
        let Some(mut stream) = guard.take() else {
            debug!("REPL connection already closed");
            return;
        };

        info!("Sending shutdown command to REPL");
        if let Err(e) = self.exchange(&mut stream, &Request::eval(commands::SHUTDOWN)).await {
            warn!(error = %e, "Failed to send shutdown command to REPL");
        }

        info!("Closing connection to REPL");
        if let Err(e) = stream.shutdown().await {
            warn!(error = %e, "Failed to close connection to REPL");
        }
    }

    /// True until [`ReplClient::shutdown`] has run.
    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    async fn exchange(&self, stream: &mut S, request: &Request) -> Result<Vec<ResponseRecord>> {
        let bytes = self.codec.encode(request)?;
        if self.verbose {
            info!(codec = self.codec.name(), bytes = bytes.len(), "Writing request");
        }

        if let Err(e) = write_request(stream, &bytes).await {
            error!(error = %e, "Error while writing request");
            return Err(ReplError::Write(e));
        }

        let acc = read_accumulated(stream, &self.policy).await;
        if self.verbose {
            info!(buffer = %String::from_utf8_lossy(&acc.bytes), "Read buffer");
        } else {
            debug!(bytes = acc.bytes.len(), "Read buffer");
        }

        if acc.bytes.is_empty() {
            return Err(match acc.aborted {
                Some(e) => ReplError::Read(e),
                None => ReplError::NothingReceived,
            });
        }
        if let Some(e) = &acc.aborted {
            warn!(error = %e, "Read aborted, decoding partial buffer");
        }

        let replies = self.codec.decode(&acc.bytes).map_err(|e| {
            error!(
                error = %e,
                buffer = %String::from_utf8_lossy(&acc.bytes),
                "Error while decoding response"
            );
            e
        })?;
        Ok(normalize_all(replies))
    }
}

async fn write_request<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await
}
