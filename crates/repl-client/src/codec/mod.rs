//! Wire codecs: request encoding and reply decoding for the two supported REPL protocols.
//!
//! - [`BencodeCodec`]: length-prefixed binary maps (nREPL).
//! - [`EdnStreamCodec`]: newline-terminated source forms out, newline-delimited EDN records back (prepl).

pub mod bencode;
pub mod compat;
pub mod edn;
mod stream;

pub use bencode::BencodeCodec;
pub use stream::EdnStreamCodec;

use thiserror::Error;

use crate::error::Result;
use crate::value::Reply;

/// Operation tag for evaluation requests.
pub const OP_EVAL: &str = "eval";

/// A single request: operation tag plus code payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: String,
    pub code: String,
}

impl Request {
    /// Builds an `eval` request for the given code.
    pub fn eval(code: impl Into<String>) -> Self {
        Self {
            op: OP_EVAL.to_string(),
            code: code.into(),
        }
    }
}

/// Malformed wire bytes, with the offset where decoding stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} (at offset {offset})")]
pub struct DecodeError {
    pub offset: usize,
    pub reason: String,
}

impl DecodeError {
    pub fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// Pluggable wire codec. One codec instance is owned by a [`crate::ReplClient`].
pub trait Codec: Send + Sync {
    /// Short protocol name for logs.
    fn name(&self) -> &'static str;

    /// Serializes a request into the bytes written on the wire.
    fn encode(&self, request: &Request) -> Result<Vec<u8>>;

    /// Decodes an accumulated read buffer into reply units, in arrival order.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Reply>>;
}
