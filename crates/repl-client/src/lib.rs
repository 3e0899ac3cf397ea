//! # repl-client
//!
//! Client for a remote Clojure evaluation server. Finds or launches the backend
//! ([`acquire_connection`]), owns one connection guarded by a lock ([`ReplClient`]), speaks either
//! nREPL bencode or prepl EDN ([`codec`]), reads under a bounded retry policy ([`ReadPolicy`]) and
//! normalizes replies into [`ResponseRecord`]s that [`render`] turns into chat text.

pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod render;
pub mod response;
pub mod retry;
pub mod supervisor;
pub mod value;

pub use codec::{BencodeCodec, Codec, DecodeError, EdnStreamCodec, Request};
pub use config::{Protocol, ReplConfig};
pub use connection::ReplClient;
pub use error::{ReplError, Result};
pub use render::{parse_exception, render, ExceptionValue};
pub use response::{ResponseRecord, Tag};
pub use retry::{read_accumulated, Accumulated, ReadPolicy};
pub use supervisor::{acquire_connection, Acquired, LaunchOutcome, Launcher, ProcessLauncher};
pub use value::{Reply, Value};
