//! Integration tests for [`handler_chain::HandlerChain`].
//!
//! Covers: before/after order, a before() refusal stopping the chain, Reply ending the handle phase
//! and reaching after(), and Ignore/Continue falling through to the next handler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use handler_chain::HandlerChain;
use replbot_core::{Chat, Handler, HandlerResponse, Message, MessageType, User};

fn create_test_message(content: &str) -> Message {
    Message {
        id: "test_message_id".to_string(),
        content: content.to_string(),
        user: User {
            id: 123,
            username: Some("test_user".to_string()),
            first_name: Some("Test".to_string()),
            last_name: None,
        },
        chat: Chat {
            id: 456,
            chat_type: "private".to_string(),
        },
        message_type: MessageType::Text,
        document: None,
        created_at: Utc::now(),
    }
}

/// Records every phase it sees into a shared log and answers `handle` with a fixed response.
struct RecordingHandler {
    name: &'static str,
    response: HandlerResponse,
    allow: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    fn new(name: &'static str, response: HandlerResponse, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            response,
            allow: true,
            log,
        }
    }

    fn refusing(mut self) -> Self {
        self.allow = false;
        self
    }
}

#[async_trait::async_trait]
impl Handler for RecordingHandler {
    async fn before(&self, _message: &Message) -> replbot_core::Result<bool> {
        self.log.lock().unwrap().push(format!("before_{}", self.name));
        Ok(self.allow)
    }

    async fn handle(&self, _message: &Message) -> replbot_core::Result<HandlerResponse> {
        self.log.lock().unwrap().push(format!("handle_{}", self.name));
        Ok(self.response.clone())
    }

    async fn after(
        &self,
        _message: &Message,
        response: &HandlerResponse,
    ) -> replbot_core::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("after_{}:{:?}", self.name, response));
        Ok(())
    }
}

/// **Test: phases run before (in order) → handle (in order) → after (reverse).**
///
/// **Setup:** Two handlers that both Continue.
/// **Action:** `chain.handle(&message)`.
/// **Expected:** before_first, before_second, handle_first, handle_second, after_second, after_first.
#[tokio::test]
async fn test_phases_execute_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::new()
        .add_handler(Arc::new(RecordingHandler::new("first", HandlerResponse::Continue, log.clone())))
        .add_handler(Arc::new(RecordingHandler::new("second", HandlerResponse::Continue, log.clone())));

    let result = chain.handle(&create_test_message("(+ 1 2)")).await.unwrap();

    assert_eq!(result, HandlerResponse::Continue);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before_first",
            "before_second",
            "handle_first",
            "handle_second",
            "after_second:Continue",
            "after_first:Continue",
        ]
    );
}

/// **Test: a before() refusal stops the chain; no handle or after runs.**
///
/// **Setup:** A refusing gate (like the allow-list) followed by an evaluating handler.
/// **Expected:** result is Stop; only the two before() calls up to the gate are logged.
#[tokio::test]
async fn test_before_refusal_stops_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::new()
        .add_handler(Arc::new(
            RecordingHandler::new("gate", HandlerResponse::Continue, log.clone()).refusing(),
        ))
        .add_handler(Arc::new(RecordingHandler::new(
            "eval",
            HandlerResponse::Reply("user=> 3".to_string()),
            log.clone(),
        )));

    let result = chain.handle(&create_test_message("(+ 1 2)")).await.unwrap();

    assert_eq!(result, HandlerResponse::Stop);
    assert_eq!(*log.lock().unwrap(), vec!["before_gate"]);
}

/// **Test: Reply ends the handle phase and is passed to every after().**
///
/// **Setup:** Logging handler (Continue), eval handler (Reply), trailing handler.
/// **Expected:** trailing handle never runs; both earlier after() calls see the reply.
#[tokio::test]
async fn test_reply_stops_handle_phase_and_reaches_after() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let chain = HandlerChain::new()
        .add_handler(Arc::new(RecordingHandler::new("logging", HandlerResponse::Continue, log.clone())))
        .add_handler(Arc::new(RecordingHandler::new(
            "eval",
            HandlerResponse::Reply("user=> 3".to_string()),
            log.clone(),
        )))
        .add_handler(Arc::new(RecordingHandler::new("trailing", HandlerResponse::Continue, log.clone())));

    let result = chain.handle(&create_test_message("(+ 1 2)")).await.unwrap();

    assert_eq!(result, HandlerResponse::Reply("user=> 3".to_string()));
    let log = log.lock().unwrap();
    assert!(!log.contains(&"handle_trailing".to_string()));
    assert!(log.contains(&r#"after_logging:Reply("user=> 3")"#.to_string()));
    assert!(log.contains(&r#"after_eval:Reply("user=> 3")"#.to_string()));
}

/// **Test: Ignore falls through to the next handler.**
#[tokio::test]
async fn test_ignore_falls_through() {
    let handled = Arc::new(AtomicUsize::new(0));

    struct Ignoring;

    #[async_trait::async_trait]
    impl Handler for Ignoring {
        async fn handle(&self, _message: &Message) -> replbot_core::Result<HandlerResponse> {
            Ok(HandlerResponse::Ignore)
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Handler for Counting {
        async fn handle(&self, _message: &Message) -> replbot_core::Result<HandlerResponse> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResponse::Stop)
        }
    }

    let chain = HandlerChain::new()
        .add_handler(Arc::new(Ignoring))
        .add_handler(Arc::new(Counting(handled.clone())));

    let result = chain.handle(&create_test_message("/publics")).await.unwrap();

    assert_eq!(result, HandlerResponse::Stop);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(chain.len(), 2);
}

/// **Test: an empty chain continues.**
#[tokio::test]
async fn test_empty_chain_continues() {
    let chain = HandlerChain::new();
    assert!(chain.is_empty());
    let result = chain.handle(&create_test_message("1")).await.unwrap();
    assert_eq!(result, HandlerResponse::Continue);
}
