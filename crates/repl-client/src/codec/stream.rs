//! prepl codec: one source form per request line, one EDN map per reply line.

use tracing::warn;

use super::compat::neutralize;
use super::{edn, Codec, DecodeError, Request};
use crate::error::Result;
use crate::value::Reply;

/// Newline-delimited EDN stream codec. Each reply line is parsed on its own; a malformed line is
/// logged and skipped so its siblings survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdnStreamCodec;

impl Codec for EdnStreamCodec {
    fn name(&self) -> &'static str {
        "edn-stream"
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>> {
        let mut out = request.code.trim_end_matches(['\r', '\n']).as_bytes().to_vec();
        out.push(b'\n');
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Reply>> {
        let text = String::from_utf8_lossy(bytes);
        let mut replies = Vec::new();
        let mut first_failure: Option<DecodeError> = None;

        for (line_no, line) in text.split('\n').enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match edn::parse(&neutralize(line)) {
                Ok(value) => replies.push(Reply::from(value)),
                Err(e) => {
                    warn!(line = line_no, error = %e, raw = %line, "Skipping malformed response line");
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) if replies.is_empty() => Err(e.into()),
            _ => Ok(replies),
        }
    }
}
