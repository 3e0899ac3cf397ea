//! Integration tests for [`repl_client::ReplClient`] over in-memory streams.
//!
//! A fake backend task sits on the other end of a `tokio::io::duplex` pipe. Tests run on paused
//! time so the per-read deadlines are deterministic.

use std::sync::Arc;
use std::time::Duration;

use repl_client::codec::bencode;
use repl_client::{
    render, BencodeCodec, EdnStreamCodec, ReadPolicy, ReplClient, ReplError, Tag, Value,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, Instant};

const READ_TIMEOUT: Duration = Duration::from_millis(50);

fn policy(attempts: u32) -> ReadPolicy {
    ReadPolicy {
        attempts,
        read_timeout: READ_TIMEOUT,
        chunk_size: 1024,
    }
}

/// Line-based fake prepl: answers each request line with `respond(line)` after `delay`.
/// Returns every received line once the client closes its side.
fn spawn_prepl<F>(server: DuplexStream, delay: Duration, respond: F) -> JoinHandle<Vec<String>>
where
    F: Fn(&str) -> String + Send + 'static,
{
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(server);
        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            sleep(delay).await;
            let reply = respond(&line);
            received.push(line);
            if write_half.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
        received
    })
}

fn prepl_client(stream: DuplexStream, attempts: u32) -> ReplClient<DuplexStream> {
    ReplClient::from_stream(stream, Box::new(EdnStreamCodec), policy(attempts), false)
}

/// **Test: an eval with printed output and a return value renders both, in order.**
#[tokio::test(start_paused = true)]
async fn test_eval_renders_output_then_value() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let _backend = spawn_prepl(server_io, Duration::from_millis(1), |_| {
        "{:tag :out, :val \"hello\\n\"}\n{:tag :ret, :val \"nil\", :ns \"user\", :ms 1, :form \"(println \\\"hello\\\")\"}\n".to_string()
    });
    let client = prepl_client(client_io, 3);

    let records = client.eval("(println \"hello\")").await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tag, Some(Tag::Out));
    assert_eq!(records[1].tag, Some(Tag::Ret));
    assert_eq!(records[1].ms, Some(1));
    assert_eq!(render(&records), "hello\nuser=> nil");
}

/// **Test: concurrent callers never interleave exchanges on the shared connection.**
///
/// **Setup:** Four tasks evaluate `(identity i)`; the backend echoes each form back as the value
/// after a delay.
/// **Expected:** every caller receives exactly its own echo, and total time covers four full
/// exchanges (each ends on one idle read window after its reply), which is impossible if they
/// overlap.
#[tokio::test(start_paused = true)]
async fn test_concurrent_evals_are_serialized() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let backend = spawn_prepl(server_io, Duration::from_millis(5), |code| {
        format!("{{:tag :ret, :val {:?}, :ns \"user\"}}\n", code)
    });
    let client = Arc::new(prepl_client(client_io, 3));

    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for i in 0..4 {
        let client = client.clone();
        tasks.spawn(async move {
            let code = format!("(identity {})", i);
            let records = client.eval(&code).await.unwrap();
            (code, records)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (code, records) = joined.unwrap();
        assert_eq!(records.len(), 1, "records for {}: {:?}", code, records);
        assert_eq!(records[0].value.as_deref(), Some(code.as_str()));
    }
    assert!(start.elapsed() >= READ_TIMEOUT * 4);

    client.shutdown().await;
    let received = backend.await.unwrap();
    assert_eq!(received.len(), 5);
}

/// **Test: a backend that never answers yields NothingReceived, not an empty success.**
#[tokio::test(start_paused = true)]
async fn test_silent_backend_reports_nothing_received() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let _backend = spawn_prepl(server_io, Duration::ZERO, |_| String::new());
    let client = prepl_client(client_io, 5);

    let result = client.eval("(+ 1 2)").await;

    assert!(matches!(result, Err(ReplError::NothingReceived)));
}

/// **Test: one malformed line among three is skipped; the others keep their order.**
#[tokio::test(start_paused = true)]
async fn test_malformed_line_is_skipped() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let _backend = spawn_prepl(server_io, Duration::ZERO, |_| {
        "{:tag :out, :val \"first\"}\n{:tag :ret :val\n{:tag :ret, :val \"second\", :ns \"user\"}\n"
            .to_string()
    });
    let client = prepl_client(client_io, 2);

    let records = client.eval("(do (print \"first\") \"second\")").await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(render(&records), "first\nuser=> second");
}

/// **Test: an exception record renders its cause, even with JVM object and hex noise in it.**
#[tokio::test(start_paused = true)]
async fn test_exception_renders_cause() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let _backend = spawn_prepl(server_io, Duration::ZERO, |_| {
        concat!(
            r##"{:tag :ret, :val "#:clojure.error{:phase :execution, :cause \"Divide by zero\", "##,
            r#":via [{:type java.lang.ArithmeticException, :at #object[clojure.lang.Numbers 0x1b2c3d \"n\"]}]}", "#,
            r#":ns "user", :ms 0, :form "(/ 1 0)", :exception true}"#,
            "\n"
        )
        .to_string()
    });
    let client = prepl_client(client_io, 2);

    let records = client.eval("(/ 1 0)").await.unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].exception);
    assert_eq!(render(&records), "Divide by zero");
}

/// **Test: hex-looking text inside printed output and returned strings reaches the chat intact.**
#[tokio::test(start_paused = true)]
async fn test_hex_in_strings_is_not_rewritten() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let _backend = spawn_prepl(server_io, Duration::ZERO, |_| {
        concat!(
            r#"{:tag :out, :val "addr 0xff\n"}"#,
            "\n",
            r#"{:tag :ret, :val "\"0x1f\"", :ns "user"}"#,
            "\n"
        )
        .to_string()
    });
    let client = prepl_client(client_io, 2);

    let records = client.eval("(do (println \"addr 0xff\") \"0x1f\")").await.unwrap();

    assert_eq!(render(&records), "addr 0xff\nuser=> \"0x1f\"");
}

/// **Test: load_file sends a load-file form over the same path as eval.**
#[tokio::test(start_paused = true)]
async fn test_load_file_sends_load_form() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let backend = spawn_prepl(server_io, Duration::ZERO, |_| {
        "{:tag :ret, :val \"#'user/f\", :ns \"user\"}\n".to_string()
    });
    let client = prepl_client(client_io, 2);

    let records = client.load_file("/tmp/upload.clj").await.unwrap();
    assert_eq!(render(&records), "user=> #'user/f");

    client.shutdown().await;
    let received = backend.await.unwrap();
    assert_eq!(received[0], r#"(load-file "/tmp/upload.clj")"#);
}

/// **Test: shutdown sends the exit form, closes once, and later calls fail with Closed.**
#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_exactly_once() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let backend = spawn_prepl(server_io, Duration::ZERO, |_| String::new());
    let client = prepl_client(client_io, 2);

    assert!(client.is_open().await);
    client.shutdown().await;
    assert!(!client.is_open().await);
    client.shutdown().await;

    assert!(matches!(client.eval("1").await, Err(ReplError::Closed)));
    let received = backend.await.unwrap();
    assert_eq!(received, vec!["(System/exit 0)".to_string()]);
}

/// **Test: a write to a dead peer surfaces a Write error and leaves the client open.**
#[tokio::test]
async fn test_write_failure_is_surfaced() {
    let (client_io, server_io) = tokio::io::duplex(64);
    drop(server_io);
    let client = prepl_client(client_io, 2);

    assert!(matches!(client.eval("(+ 1 2)").await, Err(ReplError::Write(_))));
    assert!(client.is_open().await);
}

/// **Test: bencode round trip: the backend sees op/code, the client recovers ns and value.**
#[tokio::test(start_paused = true)]
async fn test_bencode_exchange_round_trip() {
    let (client_io, mut server_io) = tokio::io::duplex(4096);
    let backend = tokio::spawn(async move {
        let mut buf = vec![0u8; 1024];
        let n = server_io.read(&mut buf).await.unwrap();
        let request = bencode::decode(&buf[..n]).unwrap();
        server_io
            .write_all(b"d2:ns4:user5:value1:3ed6:statusl4:doneee")
            .await
            .unwrap();
        (request, server_io)
    });
    let client = ReplClient::from_stream(client_io, Box::new(BencodeCodec), policy(3), false);

    let records = client.eval("(+ 1 2)").await.unwrap();

    let (request, _server_io) = backend.await.unwrap();
    assert_eq!(request.get("op").and_then(Value::as_str), Some("eval"));
    assert_eq!(request.get("code").and_then(Value::as_str), Some("(+ 1 2)"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].namespace.as_deref(), Some("user"));
    assert_eq!(records[0].value.as_deref(), Some("3"));
    assert!(records[1].done);
    assert_eq!(render(&records), "user=> 3");
}

/// **Test: nREPL error statuses render with the exception classes.**
#[tokio::test(start_paused = true)]
async fn test_bencode_error_status_renders() {
    let (client_io, mut server_io) = tokio::io::duplex(4096);
    let _backend = tokio::spawn(async move {
        let mut buf = vec![0u8; 1024];
        let _ = server_io.read(&mut buf).await;
        let reply = b"d2:ex35:class java.lang.ArithmeticException7:root-ex35:class java.lang.ArithmeticException6:statusl10:eval-erroree";
        let _ = server_io.write_all(reply).await;
        server_io
    });
    let client = ReplClient::from_stream(client_io, Box::new(BencodeCodec), policy(2), false);

    let records = client.eval("(/ 1 0)").await.unwrap();

    assert!(records[0].has_error());
    assert_eq!(
        render(&records),
        "eval-error: class java.lang.ArithmeticException"
    );
}
