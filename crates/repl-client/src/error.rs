//! Transport-level errors for the REPL client.
//!
//! Evaluation-level faults (the evaluated code threw) are not errors here; they travel as data
//! inside [`crate::ResponseRecord`].

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::codec::DecodeError;

/// Errors surfaced by the supervisor and the connection manager.
#[derive(Error, Debug)]
pub enum ReplError {
    #[error("REPL backend at {addr} unreachable after {waited:?}")]
    BackendUnreachable { addr: String, waited: Duration },

    #[error("Failed to launch REPL backend: {0}")]
    Launch(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Failed to write request: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to read response: {0}")]
    Read(#[source] io::Error),

    #[error("Nothing received from REPL")]
    NothingReceived,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connection to REPL is closed")]
    Closed,
}

/// Result type for REPL client operations; uses [`ReplError`].
pub type Result<T> = std::result::Result<T, ReplError>;
