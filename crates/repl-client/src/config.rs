//! REPL client config: protocol, backend executable, address, timeouts, read policy.
//! Loaded once from env (REPL_*) and passed by reference to the supervisor and client.

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::{BencodeCodec, Codec, EdnStreamCodec};
use crate::commands;
use crate::retry::ReadPolicy;

/// Wire protocol spoken by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Clojure socket prepl: newline-delimited EDN.
    Prepl,
    /// nREPL: bencode.
    Nrepl,
}

impl Protocol {
    pub fn codec(&self) -> Box<dyn Codec> {
        match self {
            Protocol::Prepl => Box::new(EdnStreamCodec),
            Protocol::Nrepl => Box::new(BencodeCodec),
        }
    }

    pub fn default_executable(&self) -> &'static str {
        match self {
            Protocol::Prepl => "clojure",
            Protocol::Nrepl => "lein",
        }
    }

    /// Arguments that start a headless server listening on `host:port`.
    pub fn launch_args(&self, host: &str, port: u16) -> Vec<String> {
        match self {
            Protocol::Prepl => vec![format!(
                r#"-J-Dclojure.server.jvm={{:address "{}" :port {} :accept clojure.core.server/io-prepl}}"#,
                host, port
            )],
            Protocol::Nrepl => vec![
                "repl".to_string(),
                ":headless".to_string(),
                ":host".to_string(),
                host.to_string(),
                ":port".to_string(),
                port.to_string(),
            ],
        }
    }

    /// Forms evaluated once after connecting to a freshly launched backend.
    pub fn init_commands(&self) -> &'static [&'static str] {
        match self {
            Protocol::Prepl => &[commands::REQUIRE_REPL, commands::SET_PRINT_LENGTH],
            Protocol::Nrepl => &[],
        }
    }

    pub fn default_read_policy(&self) -> ReadPolicy {
        match self {
            Protocol::Prepl => ReadPolicy {
                attempts: 10,
                read_timeout: Duration::from_millis(1000),
                chunk_size: 10 * 1024,
            },
            Protocol::Nrepl => ReadPolicy {
                attempts: 128,
                read_timeout: Duration::from_millis(100),
                chunk_size: 1024,
            },
        }
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepl" => Ok(Protocol::Prepl),
            "nrepl" => Ok(Protocol::Nrepl),
            other => anyhow::bail!("Unknown REPL_PROTOCOL `{}` (expected prepl or nrepl)", other),
        }
    }
}

/// Immutable REPL client config.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    pub protocol: Protocol,
    /// Backend executable launched when nothing listens on `host:port`.
    pub executable_path: String,
    pub host: String,
    pub port: u16,
    /// Log every request, raw buffer and decoded batch at info level.
    pub verbose: bool,
    /// How long to poll for an already running backend before launching one.
    pub connect_window: Duration,
    /// How long to poll for a freshly launched backend.
    pub boot_window: Duration,
    pub poll_interval: Duration,
    pub read_policy: ReadPolicy,
}

impl ReplConfig {
    /// Defaults for `protocol` on `host:port`.
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            executable_path: protocol.default_executable().to_string(),
            host: host.into(),
            port,
            verbose: false,
            connect_window: Duration::from_secs(10),
            boot_window: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            read_policy: protocol.default_read_policy(),
        }
    }

    /// Loads from env: REPL_PROTOCOL, REPL_EXEC_PATH, REPL_HOST, REPL_PORT, REPL_VERBOSE,
    /// REPL_CONNECT_TIMEOUT_SECS, REPL_BOOT_TIMEOUT_SECS, REPL_READ_TIMEOUT_MS, REPL_READ_RETRIES,
    /// REPL_READ_CHUNK_BYTES. All optional.
    pub fn from_env() -> Result<Self> {
        let protocol = match env::var("REPL_PROTOCOL") {
            Ok(s) if !s.trim().is_empty() => s.parse()?,
            _ => Protocol::Prepl,
        };
        let host = env::var("REPL_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = parse_var("REPL_PORT")?.unwrap_or(5555);
        let mut config = Self::new(protocol, host, port);

        if let Ok(path) = env::var("REPL_EXEC_PATH") {
            if !path.trim().is_empty() {
                config.executable_path = path;
            }
        }
        config.verbose = env::var("REPL_VERBOSE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if let Some(secs) = parse_var::<u64>("REPL_CONNECT_TIMEOUT_SECS")? {
            config.connect_window = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("REPL_BOOT_TIMEOUT_SECS")? {
            config.boot_window = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>("REPL_READ_TIMEOUT_MS")? {
            config.read_policy.read_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var("REPL_READ_RETRIES")? {
            config.read_policy.attempts = attempts;
        }
        if let Some(bytes) = parse_var("REPL_READ_CHUNK_BYTES")? {
            config.read_policy.chunk_size = bytes;
        }
        Ok(config)
    }

    /// Checks values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("REPL_PORT must be non-zero");
        }
        if self.executable_path.trim().is_empty() {
            anyhow::bail!("REPL_EXEC_PATH must not be empty");
        }
        if self.read_policy.attempts == 0 {
            anyhow::bail!("REPL_READ_RETRIES must be at least 1");
        }
        if self.read_policy.read_timeout.is_zero() {
            anyhow::bail!("REPL_READ_TIMEOUT_MS must be non-zero");
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll interval must be non-zero");
        }
        Ok(())
    }

    /// `host:port` for dialing.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of dial attempts that fit in `window` at one attempt per `poll_interval`.
    pub fn attempts_in(&self, window: Duration) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let attempts = window.as_millis() / interval;
        u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} is not a valid value: {}", name, raw)),
        _ => Ok(None),
    }
}
