//! Clojure forms the client and the chat layer send.

/// Refers the `clojure.repl` helpers (`doc`, `source`, ...) into the session namespace.
pub const REQUIRE_REPL: &str = "(require '[clojure.repl :refer :all])";
/// Keeps printed collections short enough for a chat message.
pub const SET_PRINT_LENGTH: &str = "(set! *print-length* 20)";
/// Lists the public vars of the current namespace.
pub const PUBLICS: &str = r#"(clojure.string/join ", " (map first (ns-publics (ns-name *ns*))))"#;
/// Unmaps every var interned in the current namespace.
pub const RESET: &str = "(map #(ns-unmap *ns* %) (keys (ns-interns *ns*)))";
/// Terminates the backend JVM.
pub const SHUTDOWN: &str = "(System/exit 0)";

/// `(load-file "<path>")` with the path escaped as a string literal.
pub fn load_file(path: &str) -> String {
    format!("(load-file {})", quote(path))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
