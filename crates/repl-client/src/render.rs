//! Renders a batch of records into a single chat reply.

use tracing::warn;

use crate::codec::compat::neutralize;
use crate::codec::{edn, DecodeError};
use crate::response::{ResponseRecord, Tag};
use crate::value::Value;

/// The `{:cause .. :phase ..}` part of a printed exception map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionValue {
    pub cause: String,
    pub phase: Option<String>,
}

/// Parses a printed exception map (prepl `:val` when `:exception true`).
pub fn parse_exception(text: &str) -> Result<ExceptionValue, DecodeError> {
    let value = edn::parse(&neutralize(text))?;
    let cause = match value.get("cause") {
        Some(Value::Str(cause)) => cause.clone(),
        Some(other) => other.text(),
        None => return Err(DecodeError::new(0, "exception map has no :cause")),
    };
    let phase = value.get("phase").map(Value::text);
    Ok(ExceptionValue { cause, phase })
}

/// Renders every record in arrival order, one trimmed fragment per line. Records with nothing
/// printable (e.g. a bare `done` status) contribute no line.
pub fn render(records: &[ResponseRecord]) -> String {
    records
        .iter()
        .filter_map(render_record)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_record(record: &ResponseRecord) -> Option<String> {
    if !record.statuses.is_empty() {
        return Some(render_status(record));
    }
    if record.exception {
        let text = record.value.as_deref().unwrap_or_default();
        return match parse_exception(text) {
            Ok(exception) => Some(exception.cause.trim().to_string()),
            Err(e) => {
                let reason = format!("failed to parse exception value: {}", e);
                warn!(error = %e, value = %text, "Falling back to tag rendering for exception");
                match render_tagged(record) {
                    Some(fragment) if !matches!(record.tag, Some(Tag::Other(_))) => Some(fragment),
                    _ => Some(reason),
                }
            }
        };
    }
    render_tagged(record)
}

fn render_status(record: &ResponseRecord) -> String {
    let status = record.statuses.join(", ");
    let ex = record.ex.as_deref().unwrap_or_default();
    match record.root_ex.as_deref() {
        Some(root) if root != ex => format!("{}: {} ({})", status, ex, root),
        _ => format!("{}: {}", status, ex),
    }
}

fn render_tagged(record: &ResponseRecord) -> Option<String> {
    match &record.tag {
        Some(Tag::Ret) => Some(format!(
            "{}=> {}",
            record.namespace.as_deref().unwrap_or_default(),
            record.value.as_deref().unwrap_or_default().trim()
        )),
        Some(Tag::Out) | Some(Tag::Err) => record.printed_text().map(|t| t.trim().to_string()),
        Some(Tag::Tap) => record.value.as_deref().map(|t| t.trim().to_string()),
        Some(Tag::Other(tag)) => {
            let message = format!("unhandled `{}` response: {:?}", tag, record);
            warn!(tag = %tag, "Unhandled response tag");
            Some(message)
        }
        None => record.value.as_deref().map(|t| t.trim().to_string()),
    }
}
