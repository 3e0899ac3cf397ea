//! Wire-level values produced by both codecs, and the top-level reply shape.

use std::fmt;

/// A decoded wire value. Bencode only ever yields `Int`, `Str`, `List` and `Map`; the EDN
/// reader uses the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Keyword(String),
    Symbol(String),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tagged(String, Box<Value>),
}

impl Value {
    /// Returns the inner string of a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form: strings, keywords and symbols without quoting or leading colon; anything
    /// else in printed form.
    pub fn text(&self) -> String {
        match self {
            Value::Str(s) | Value::Keyword(s) | Value::Symbol(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Looks up a map entry whose key is the keyword or string `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find_map(|(k, v)| match k {
                Value::Keyword(key) | Value::Str(key) if key == name => Some(v),
                _ => None,
            }),
            _ => None,
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Value::Char(c) => match c {
                '\n' => f.write_str("\\newline"),
                ' ' => f.write_str("\\space"),
                '\t' => f.write_str("\\tab"),
                c => write!(f, "\\{}", c),
            },
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Symbol(s) => f.write_str(s),
            Value::List(items) => write_seq(f, "(", items, ")"),
            Value::Vector(items) => write_seq(f, "[", items, "]"),
            Value::Set(items) => write_seq(f, "#{", items, "}"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Tagged(tag, inner) => write!(f, "#{} {}", tag, inner),
        }
    }
}

/// Top-level shape of one decoded reply unit. Each shape is normalized by an exhaustive match in
/// [`crate::response::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Scalar(Value),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Map(entries) => Reply::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.text(), v))
                    .collect(),
            ),
            Value::List(items) | Value::Vector(items) => Reply::List(items),
            scalar => Reply::Scalar(scalar),
        }
    }
}
