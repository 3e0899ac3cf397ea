//! Bot abstraction for replying, showing a typing indicator and fetching uploaded files.
//!
//! [`Bot`] is transport-agnostic; replbot-telegram implements it via teloxide, tests with mocks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chat, Document, Message};

/// Abstraction for the chat transport.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message to the given chat.
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()>;
    /// Sends a reply to the given message (same chat).
    async fn reply_to(&self, message: &Message, text: &str) -> Result<()>;
    /// Shows "typing..." in the chat. Best-effort; the default does nothing.
    async fn send_typing(&self, _chat: &Chat) -> Result<()> {
        Ok(())
    }
    /// Downloads `document` into `dest_dir` and returns the path of the written file.
    async fn download_file(&self, document: &Document, dest_dir: &Path) -> Result<PathBuf>;
}

/// File name used for a downloaded document: its own name when it has a usable one,
/// otherwise one derived from the file id. Path components are stripped.
pub fn download_file_name(document: &Document) -> String {
    let own = document
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty());
    match own {
        Some(name) => name.to_string(),
        None => format!("{}.clj", sanitize(&document.file_id)),
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(file_id: &str, file_name: Option<&str>) -> Document {
        Document {
            file_id: file_id.to_string(),
            file_name: file_name.map(str::to_string),
        }
    }

    #[test]
    fn test_download_file_name_uses_own_name() {
        assert_eq!(download_file_name(&document("abc", Some("core.clj"))), "core.clj");
    }

    #[test]
    fn test_download_file_name_strips_directories() {
        assert_eq!(
            download_file_name(&document("abc", Some("../../etc/passwd"))),
            "passwd"
        );
    }

    #[test]
    fn test_download_file_name_falls_back_to_id() {
        assert_eq!(download_file_name(&document("AB:c/d", None)), "AB_c_d.clj");
        assert_eq!(download_file_name(&document("x", Some(""))), "x.clj");
    }
}
