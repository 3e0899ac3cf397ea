//! Normalized response records and the wire-key mapping table.
//!
//! Both protocols land in the same [`ResponseRecord`]. The mapping from wire key to field is an
//! explicit table ([`FIELD_KEYS`]); its coverage of every [`Field`] is checked by a unit test.

use tracing::debug;

use crate::value::{Reply, Value};

/// Status token that marks the end of an nREPL exchange; it is not an error.
pub const STATUS_DONE: &str = "done";

/// Record tag: which kind of output this record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// Returned value of a top-level form.
    Ret,
    /// Text printed to `*out*`.
    Out,
    /// Text printed to `*err*`.
    Err,
    /// Value sent with `tap>`.
    Tap,
    Other(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name {
            "ret" => Tag::Ret,
            "out" => Tag::Out,
            "err" => Tag::Err,
            "tap" => Tag::Tap,
            other => Tag::Other(other.to_string()),
        }
    }
}

/// One normalized unit of evaluation output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRecord {
    pub tag: Option<Tag>,
    /// Namespace the evaluation happened in.
    pub namespace: Option<String>,
    /// Captured stdout (nREPL `out`).
    pub out: Option<String>,
    /// Captured stderr (nREPL `err`).
    pub err: Option<String>,
    /// Returned value or printed text (prepl `val`, nREPL `value`).
    pub value: Option<String>,
    /// prepl `:exception true`: `value` holds a printed exception map.
    pub exception: bool,
    /// nREPL exception class.
    pub ex: Option<String>,
    /// nREPL root exception class.
    pub root_ex: Option<String>,
    /// Error Status Set: every status token except [`STATUS_DONE`].
    pub statuses: Vec<String>,
    pub done: bool,
    pub ms: Option<i64>,
    pub form: Option<String>,
    pub session: Option<String>,
    pub id: Option<String>,
    pub op: Option<String>,
    pub message: Option<String>,
}

impl ResponseRecord {
    /// True if the evaluated code threw or the backend reported an error status.
    pub fn has_error(&self) -> bool {
        self.exception || !self.statuses.is_empty()
    }

    /// Printed text for `out`/`err` records, whichever field the protocol used.
    pub fn printed_text(&self) -> Option<&str> {
        self.out
            .as_deref()
            .or(self.err.as_deref())
            .or(self.value.as_deref())
    }
}

/// Record field a wire key maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Tag,
    Namespace,
    Out,
    Err,
    Value,
    Exception,
    Ex,
    RootEx,
    Status,
    Ms,
    Form,
    Session,
    Id,
    Op,
    Message,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Tag,
        Field::Namespace,
        Field::Out,
        Field::Err,
        Field::Value,
        Field::Exception,
        Field::Ex,
        Field::RootEx,
        Field::Status,
        Field::Ms,
        Field::Form,
        Field::Session,
        Field::Id,
        Field::Op,
        Field::Message,
    ];
}

/// Wire key → field, for both prepl keywords and nREPL string keys.
pub const FIELD_KEYS: &[(&str, Field)] = &[
    ("tag", Field::Tag),
    ("ns", Field::Namespace),
    ("out", Field::Out),
    ("err", Field::Err),
    ("val", Field::Value),
    ("value", Field::Value),
    ("exception", Field::Exception),
    ("ex", Field::Ex),
    ("root-ex", Field::RootEx),
    ("status", Field::Status),
    ("ms", Field::Ms),
    ("form", Field::Form),
    ("session", Field::Session),
    ("id", Field::Id),
    ("op", Field::Op),
    ("message", Field::Message),
];

pub fn field_for_key(key: &str) -> Option<Field> {
    FIELD_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, field)| *field)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Str(s) => s == "true",
        Value::Nil => false,
        _ => true,
    }
}

fn assign(record: &mut ResponseRecord, field: Field, value: &Value) {
    match field {
        Field::Tag => record.tag = Some(Tag::parse(&value.text())),
        Field::Namespace => record.namespace = Some(value.text()),
        Field::Out => record.out = Some(value.text()),
        Field::Err => record.err = Some(value.text()),
        Field::Value => record.value = Some(value.text()),
        Field::Exception => record.exception = truthy(value),
        Field::Ex => record.ex = Some(value.text()),
        Field::RootEx => record.root_ex = Some(value.text()),
        Field::Status => {
            let tokens: Vec<String> = match value {
                Value::List(items) | Value::Vector(items) | Value::Set(items) => {
                    items.iter().map(Value::text).collect()
                }
                scalar => vec![scalar.text()],
            };
            for token in tokens {
                if token == STATUS_DONE {
                    record.done = true;
                } else {
                    record.statuses.push(token);
                }
            }
        }
        Field::Ms => {
            record.ms = match value {
                Value::Int(n) => Some(*n),
                other => other.text().parse().ok(),
            }
        }
        Field::Form => record.form = Some(value.text()),
        Field::Session => record.session = Some(value.text()),
        Field::Id => record.id = Some(value.text()),
        Field::Op => record.op = Some(value.text()),
        Field::Message => record.message = Some(value.text()),
    }
}

/// Builds a record from map entries. Without an explicit tag (nREPL), the tag is inferred from
/// which output field is present.
pub fn record_from_map(entries: &[(String, Value)]) -> ResponseRecord {
    let mut record = ResponseRecord::default();
    for (key, value) in entries {
        match field_for_key(key) {
            Some(field) => assign(&mut record, field, value),
            None => debug!(key = %key, "Ignoring unmapped response key"),
        }
    }
    if record.tag.is_none() {
        record.tag = if record.value.is_some() {
            Some(Tag::Ret)
        } else if record.out.is_some() {
            Some(Tag::Out)
        } else if record.err.is_some() {
            Some(Tag::Err)
        } else {
            None
        };
    }
    record
}

/// Normalizes one decoded reply into records, preserving order. Lists are flattened element by
/// element; a bare scalar becomes an untagged record carrying its text as `value`.
pub fn normalize(reply: Reply) -> Vec<ResponseRecord> {
    match reply {
        Reply::Map(entries) => vec![record_from_map(&entries)],
        Reply::List(items) => items
            .into_iter()
            .flat_map(|item| normalize(Reply::from(item)))
            .collect(),
        Reply::Scalar(value) => vec![ResponseRecord {
            value: Some(value.text()),
            ..ResponseRecord::default()
        }],
    }
}

/// Normalizes a batch of replies in arrival order.
pub fn normalize_all(replies: Vec<Reply>) -> Vec<ResponseRecord> {
    replies.into_iter().flat_map(normalize).collect()
}
