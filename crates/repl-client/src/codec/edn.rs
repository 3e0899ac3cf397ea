//! Minimal EDN reader for prepl records and printed exception maps.
//!
//! Supports nil, booleans, decimal integers and floats (with ratios read as floats), strings,
//! characters, keywords, symbols, lists, vectors, maps, sets, `#_` discards, comments and generic
//! `#tag value` literals. Namespaced maps (`#:ns{..}`) and hexadecimal integers are rejected;
//! [`super::compat::neutralize`] rewrites the occurrences a Clojure backend actually emits.

use super::DecodeError;
use crate::value::Value;

/// Parses exactly one EDN value; anything but whitespace after it is an error.
pub fn parse(input: &str) -> Result<Value, DecodeError> {
    let mut reader = Reader {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = reader.value()?;
    reader.skip_whitespace();
    if reader.pos < reader.chars.len() {
        return Err(reader.error("trailing characters after value"));
    }
    Ok(value)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';')
}

impl Reader {
    fn error(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::new(self.pos, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.pos += 1;
            } else if c == ';' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Skips whitespace and any `#_` discarded forms.
    fn skip_ignorable(&mut self) -> Result<(), DecodeError> {
        loop {
            self.skip_whitespace();
            if self.peek() == Some('#') && self.peek_at(1) == Some('_') {
                self.pos += 2;
                self.value()?;
            } else {
                return Ok(());
            }
        }
    }

    fn token(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn value(&mut self) -> Result<Value, DecodeError> {
        self.skip_ignorable()?;
        let c = self.peek().ok_or_else(|| self.error("unexpected end of input"))?;
        match c {
            '(' => {
                self.pos += 1;
                Ok(Value::List(self.sequence(')')?))
            }
            '[' => {
                self.pos += 1;
                Ok(Value::Vector(self.sequence(']')?))
            }
            '{' => {
                self.pos += 1;
                self.map()
            }
            ')' | ']' | '}' => Err(self.error(format!("unexpected `{}`", c))),
            '"' => {
                self.pos += 1;
                Ok(Value::Str(self.string()?))
            }
            '\\' => {
                self.pos += 1;
                self.character()
            }
            ':' => {
                self.pos += 1;
                if self.peek() == Some(':') {
                    self.pos += 1;
                }
                let name = self.token();
                if name.is_empty() {
                    return Err(self.error("empty keyword"));
                }
                Ok(Value::Keyword(name))
            }
            '#' => self.dispatch(),
            c if c.is_ascii_digit() => self.number(),
            '+' | '-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
            _ => {
                let token = self.token();
                if token.is_empty() {
                    return Err(self.error(format!("unexpected `{}`", c)));
                }
                Ok(match token.as_str() {
                    "nil" => Value::Nil,
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::Symbol(token),
                })
            }
        }
    }

    fn sequence(&mut self, close: char) -> Result<Vec<Value>, DecodeError> {
        let mut items = Vec::new();
        loop {
            self.skip_ignorable()?;
            match self.peek() {
                None => return Err(self.error(format!("unterminated collection, expected `{}`", close))),
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.value()?),
            }
        }
    }

    fn map(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        let items = self.sequence('}')?;
        if items.len() % 2 != 0 {
            return Err(DecodeError::new(start, "map literal must contain an even number of forms"));
        }
        let mut entries = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }

    fn dispatch(&mut self) -> Result<Value, DecodeError> {
        match self.peek_at(1) {
            Some('{') => {
                self.pos += 2;
                Ok(Value::Set(self.sequence('}')?))
            }
            Some(':') => Err(self.error("namespaced map literals are not supported")),
            Some(c) if c.is_alphabetic() => {
                self.pos += 1;
                let tag = self.token();
                let inner = self.value()?;
                Ok(Value::Tagged(tag, Box::new(inner)))
            }
            _ => Err(self.error("unsupported dispatch macro")),
        }
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'u' => out.push(self.unicode_escape()?),
                        other => return Err(self.error(format!("invalid string escape `\\{}`", other))),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, DecodeError> {
        let end = self.pos + 4;
        if end > self.chars.len() {
            return Err(self.error("truncated unicode escape"));
        }
        let hex: String = self.chars[self.pos..end].iter().collect();
        let c = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode escape `{}`", hex)))?;
        self.pos = end;
        Ok(c)
    }

    fn character(&mut self) -> Result<Value, DecodeError> {
        let first = self.peek().ok_or_else(|| self.error("unexpected end of input after `\\`"))?;
        self.pos += 1;
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        let c = match name.as_str() {
            "newline" => '\n',
            "space" => ' ',
            "tab" => '\t',
            "return" => '\r',
            "formfeed" => '\u{c}',
            "backspace" => '\u{8}',
            _ if name.chars().count() == 1 => first,
            _ if name.starts_with('u') && name.len() == 5 => u32::from_str_radix(&name[1..], 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| self.error(format!("invalid character `\\{}`", name)))?,
            _ => return Err(self.error(format!("invalid character `\\{}`", name))),
        };
        Ok(Value::Char(c))
    }

    fn number(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        let token = self.token();
        let invalid = || DecodeError::new(start, format!("invalid number `{}`", token));

        if let Some((num, den)) = token.split_once('/') {
            let num: i64 = num.parse().map_err(|_| invalid())?;
            let den: i64 = den.parse().map_err(|_| invalid())?;
            if den == 0 {
                return Err(invalid());
            }
            return Ok(Value::Float(num as f64 / den as f64));
        }
        if let Some(decimal) = token.strip_suffix('M') {
            return decimal.parse().map(Value::Float).map_err(|_| invalid());
        }
        let digits = token.strip_suffix('N').unwrap_or(&token);
        if digits.contains(['.', 'e', 'E']) {
            return digits.parse().map(Value::Float).map_err(|_| invalid());
        }
        digits.parse().map(Value::Int).map_err(|_| invalid())
    }
}
