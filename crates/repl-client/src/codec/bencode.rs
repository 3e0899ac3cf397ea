//! Bencode: `i<digits>e` integers, `<len>:<bytes>` strings, `l...e` lists, `d...e` maps with
//! byte-sorted string keys.

use tracing::warn;

use super::{Codec, DecodeError, Request};
use crate::error::{ReplError, Result};
use crate::value::{Reply, Value};

/// Encodes `value` onto `out`. Values bencode has no representation for are rejected.
pub fn encode(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bool(b) => encode(&Value::Int(i64::from(*b)), out)?,
        Value::Str(s) | Value::Keyword(s) | Value::Symbol(s) => write_bytes(s.as_bytes(), out),
        Value::List(items) | Value::Vector(items) | Value::Set(items) => {
            out.push(b'l');
            for item in items {
                encode(item, out)?;
            }
            out.push(b'e');
        }
        Value::Map(entries) => {
            let mut keyed = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                match k {
                    Value::Str(s) | Value::Keyword(s) | Value::Symbol(s) => keyed.push((s.as_str(), v)),
                    other => {
                        return Err(ReplError::Encode(format!("bencode map key must be a string, got {}", other)))
                    }
                }
            }
            keyed.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            if let Some(pair) = keyed.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(ReplError::Encode(format!("duplicate map key `{}`", pair[0].0)));
            }
            out.push(b'd');
            for (k, v) in keyed {
                write_bytes(k.as_bytes(), out);
                encode(v, out)?;
            }
            out.push(b'e');
        }
        Value::Nil | Value::Float(_) | Value::Char(_) | Value::Tagged(..) => {
            return Err(ReplError::Encode(format!("bencode cannot represent {}", value)))
        }
    }
    Ok(())
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Decodes exactly one value; trailing bytes are an error.
pub fn decode(input: &[u8]) -> std::result::Result<Value, DecodeError> {
    let mut decoder = Decoder { input, pos: 0 };
    let value = decoder.value()?;
    if decoder.pos != input.len() {
        return Err(DecodeError::new(decoder.pos, "trailing bytes after value"));
    }
    Ok(value)
}

/// Decodes consecutive values until the input is exhausted or a value fails to decode. Values
/// decoded before the failure are kept.
pub fn decode_all(input: &[u8]) -> (Vec<Value>, Option<DecodeError>) {
    let mut decoder = Decoder { input, pos: 0 };
    let mut values = Vec::new();
    while decoder.pos < input.len() {
        match decoder.value() {
            Ok(value) => values.push(value),
            Err(e) => return (values, Some(e)),
        }
    }
    (values, None)
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn value(&mut self) -> std::result::Result<Value, DecodeError> {
        match self.peek() {
            None => Err(DecodeError::new(self.pos, "unexpected end of input")),
            Some(b'i') => {
                self.pos += 1;
                self.integer()
            }
            Some(b'l') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some(b'e') => {
                            self.pos += 1;
                            return Ok(Value::List(items));
                        }
                        None => return Err(DecodeError::new(self.pos, "unterminated list")),
                        Some(_) => items.push(self.value()?),
                    }
                }
            }
            Some(b'd') => {
                self.pos += 1;
                let mut entries = Vec::new();
                loop {
                    match self.peek() {
                        Some(b'e') => {
                            self.pos += 1;
                            return Ok(Value::Map(entries));
                        }
                        None => return Err(DecodeError::new(self.pos, "unterminated map")),
                        Some(c) if c.is_ascii_digit() => {
                            let key = self.string()?;
                            let value = self.value()?;
                            entries.push((Value::Str(key), value));
                        }
                        Some(c) => {
                            return Err(DecodeError::new(
                                self.pos,
                                format!("map key must be a string, found byte 0x{:02x}", c),
                            ))
                        }
                    }
                }
            }
            Some(c) if c.is_ascii_digit() => Ok(Value::Str(self.string()?)),
            Some(c) => Err(DecodeError::new(self.pos, format!("unexpected byte 0x{:02x}", c))),
        }
    }

    fn integer(&mut self) -> std::result::Result<Value, DecodeError> {
        let start = self.pos;
        let end = self.input[start..]
            .iter()
            .position(|&b| b == b'e')
            .map(|i| start + i)
            .ok_or_else(|| DecodeError::new(start, "unterminated integer"))?;
        let digits = std::str::from_utf8(&self.input[start..end])
            .map_err(|_| DecodeError::new(start, "integer is not ASCII"))?;
        let unsigned = digits.strip_prefix('-').unwrap_or(digits);
        let canonical = !unsigned.is_empty()
            && unsigned.bytes().all(|b| b.is_ascii_digit())
            && (unsigned == "0" || !unsigned.starts_with('0'))
            && digits != "-0";
        if !canonical {
            return Err(DecodeError::new(start, format!("invalid integer `{}`", digits)));
        }
        let n = digits
            .parse::<i64>()
            .map_err(|e| DecodeError::new(start, format!("integer `{}` out of range: {}", digits, e)))?;
        self.pos = end + 1;
        Ok(Value::Int(n))
    }

    fn string(&mut self) -> std::result::Result<String, DecodeError> {
        let start = self.pos;
        let colon = self.input[start..]
            .iter()
            .position(|&b| b == b':')
            .map(|i| start + i)
            .ok_or_else(|| DecodeError::new(start, "missing `:` after string length"))?;
        let len: usize = std::str::from_utf8(&self.input[start..colon])
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DecodeError::new(start, "invalid string length"))?;
        let body_start = colon + 1;
        let body_end = body_start
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| DecodeError::new(start, format!("truncated string, expected {} bytes", len)))?;
        self.pos = body_end;
        Ok(String::from_utf8_lossy(&self.input[body_start..body_end]).into_owned())
    }
}

/// nREPL codec: requests are `{"code" .., "op" ..}` maps, replies are one or more concatenated
/// bencode values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BencodeCodec;

impl Codec for BencodeCodec {
    fn name(&self) -> &'static str {
        "bencode"
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>> {
        let map = Value::Map(vec![
            (Value::Str("op".to_string()), Value::Str(request.op.clone())),
            (Value::Str("code".to_string()), Value::Str(request.code.clone())),
        ]);
        let mut out = Vec::new();
        encode(&map, &mut out)?;
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Reply>> {
        let (values, failure) = decode_all(bytes);
        if let Some(e) = failure {
            if values.is_empty() {
                return Err(e.into());
            }
            warn!(
                error = %e,
                decoded = values.len(),
                "Dropping malformed trailing bencode value"
            );
        }
        Ok(values.into_iter().map(Reply::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn test_encode_request_sorts_keys() {
        let bytes = BencodeCodec.encode(&Request::eval("(+ 1 2)")).unwrap();
        assert_eq!(bytes, b"d4:code7:(+ 1 2)2:op4:evale".to_vec());
    }

    #[test]
    fn test_encode_counts_bytes_not_chars() {
        let mut out = Vec::new();
        encode(&s("λ"), &mut out).unwrap();
        assert_eq!(out, "2:λ".as_bytes().to_vec());
    }

    #[test]
    fn test_encode_rejects_nil_and_duplicate_keys() {
        let mut out = Vec::new();
        assert!(encode(&Value::Nil, &mut out).is_err());
        let dup = Value::Map(vec![(s("a"), Value::Int(1)), (s("a"), Value::Int(2))]);
        assert!(encode(&dup, &mut out).is_err());
    }

    #[test]
    fn test_decode_scalars_lists_and_maps() {
        assert_eq!(decode(b"i-42e").unwrap(), Value::Int(-42));
        assert_eq!(decode(b"5:hello").unwrap(), s("hello"));
        assert_eq!(
            decode(b"l4:donei0ee").unwrap(),
            Value::List(vec![s("done"), Value::Int(0)])
        );
        assert_eq!(
            decode(b"d2:ns4:user5:value1:3e").unwrap(),
            Value::Map(vec![(s("ns"), s("user")), (s("value"), s("3"))])
        );
    }

    #[test]
    fn test_decode_rejects_non_canonical_integers() {
        assert!(decode(b"i03e").is_err());
        assert!(decode(b"i-0e").is_err());
        assert!(decode(b"ie").is_err());
        assert!(decode(b"i1x2e").is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        assert!(decode(b"10:short").is_err());
        assert!(decode(b"l4:done").is_err());
        assert!(decode(b"d2:ns").is_err());
        assert!(decode(b"i12").is_err());
    }

    #[test]
    fn test_decode_all_keeps_values_before_failure() {
        let (values, failure) = decode_all(b"d5:value1:1ed6:status");
        assert_eq!(values.len(), 1);
        assert!(failure.is_some());
    }

    #[test]
    fn test_codec_decodes_each_message_in_order() {
        let replies = BencodeCodec
            .decode(b"d2:ns4:user5:value1:3ed6:statusl4:doneee")
            .unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(
            replies[0],
            Reply::Map(vec![("ns".to_string(), s("user")), ("value".to_string(), s("3"))])
        );
        assert_eq!(
            replies[1],
            Reply::Map(vec![("status".to_string(), Value::List(vec![s("done")]))])
        );
    }

    #[test]
    fn test_codec_fails_when_nothing_decodes() {
        assert!(matches!(
            BencodeCodec.decode(b"x garbage"),
            Err(ReplError::Decode(_))
        ));
    }
}
