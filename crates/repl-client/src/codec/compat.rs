//! Compatibility shim for printed Clojure output the EDN reader cannot represent.
//!
//! Two cases are known: namespaced-map and `#object` markers emitted when exceptions and
//! arbitrary JVM objects are printed, and hexadecimal identity hashes such as `0x1b2c3d`.
//! Markers are removed; bare hex literals are requoted as strings. Hex inside a string literal is
//! user text and stays as is; a printed exception carried as a string is neutralized again once
//! it is unwrapped. This is a fixed list, not a parsing strategy: new malformed shapes should be
//! reported rather than appended here.

/// Markers removed before parsing.
pub const STRIPPED_MARKERS: &[&str] = &["#:clojure.error", "#:clojure.spec.alpha", "#object"];

/// Rewrites `input` so the EDN reader accepts it.
pub fn neutralize(input: &str) -> String {
    let mut stripped = input.to_string();
    for marker in STRIPPED_MARKERS {
        stripped = stripped.replace(marker, "");
    }
    requote_hex(&stripped)
}

fn requote_hex(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string && c == '\\' {
            out.push(c);
            if let Some(&next) = chars.get(i + 1) {
                if next == '"' || next == '\\' {
                    out.push(next);
                    i += 2;
                    continue;
                }
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            out.push(c);
            i += 1;
            continue;
        }
        if in_string {
            out.push(c);
            i += 1;
            continue;
        }
        let at_boundary = i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_');
        if at_boundary && c == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
            let digits = chars[i + 2..]
                .iter()
                .take_while(|d| d.is_ascii_hexdigit())
                .count();
            if digits > 0 {
                let end = i + 2 + digits;
                let literal: String = chars[i..end].iter().collect();
                out.push('"');
                out.push_str(&literal);
                out.push('"');
                i = end;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::edn;
    use crate::value::Value;

    #[test]
    fn test_neutralize_strips_markers() {
        assert_eq!(
            neutralize("#:clojure.error{:phase :execution}"),
            "{:phase :execution}"
        );
    }

    #[test]
    fn test_neutralize_requotes_bare_hex() {
        assert_eq!(neutralize("[Object 0x1f2e \"x\"]"), "[Object \"0x1f2e\" \"x\"]");
    }

    #[test]
    fn test_neutralize_keeps_hex_inside_strings() {
        let line = r#"{:tag :out, :val "addr 0xff\n"}"#;
        assert_eq!(neutralize(line), line);
        let parsed = edn::parse(&neutralize(line)).unwrap();
        assert_eq!(parsed.get("val").and_then(Value::as_str), Some("addr 0xff\n"));
    }

    #[test]
    fn test_neutralize_unwrapped_exception_requotes_hex() {
        let line = r##"{:tag :ret, :val "#object[java.lang.Object 0x5e9f23b4 \"j.l.O@5e9f23b4\"]"}"##;
        let outer = edn::parse(&neutralize(line)).unwrap();
        let inner = outer.get("val").and_then(Value::as_str).unwrap();
        assert_eq!(inner, r#"[java.lang.Object 0x5e9f23b4 "j.l.O@5e9f23b4"]"#);
        assert_eq!(
            neutralize(inner),
            r#"[java.lang.Object "0x5e9f23b4" "j.l.O@5e9f23b4"]"#
        );
        assert!(edn::parse(&neutralize(inner)).is_ok());
    }

    #[test]
    fn test_neutralize_ignores_hex_like_fragments_inside_words() {
        assert_eq!(neutralize("abc0x12"), "abc0x12");
        assert_eq!(neutralize("0x"), "0x");
    }
}
