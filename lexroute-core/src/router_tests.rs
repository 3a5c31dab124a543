// lexroute-core/src/router_tests.rs
#![cfg(test)]

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use crate::api::{ChatProxy, LiteLlmClient, ProxyRequest, ProxyResponse, UnconfiguredProxy};
use crate::config::{ProxyConfig, ResponseConfig};
use crate::errors::FulfillmentError;
use crate::models::lex::{DialogActionType, IntentState, LexEvent};
use crate::models::turn::{IntentEvent, TurnAction, TurnOutcome};
use crate::router::FulfillmentRouter;
use crate::async_trait;

const WELCOME: &str = "Welcome to the gym assistant! Ask me anything about the gym.";
const FAILURE: &str = "Sorry, I can't answer that right now. Please try again.";
const GYM_PROMPT: &str = "Answer only fitness and gym questions.";

// --- Mock proxy ---

#[derive(Clone)]
enum Script {
    Answer(String),
    Timeout,
    Status(u16),
    Malformed,
}

/// Records every request and replies according to its script.
#[derive(Clone)]
struct MockProxy {
    script: Script,
    calls: Arc<StdMutex<Vec<ProxyRequest>>>,
}

impl MockProxy {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    fn answering(text: &str) -> Self {
        Self::new(Script::Answer(text.to_string()))
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_call(&self) -> Option<ProxyRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatProxy for MockProxy {
    async fn complete(&self, request: ProxyRequest) -> Result<ProxyResponse, FulfillmentError> {
        self.calls.lock().unwrap().push(request);
        match &self.script {
            Script::Answer(text) => Ok(ProxyResponse {
                id: "mock-resp".to_string(),
                text: text.clone(),
                model: Some("mock-model".to_string()),
                finish_reason: Some("stop".to_string()),
                usage: None,
                latency: Duration::from_millis(1),
            }),
            Script::Timeout => Err(FulfillmentError::UpstreamTimeout(Duration::from_secs(10))),
            Script::Status(status) => Err(FulfillmentError::UpstreamError {
                status: Some(*status),
                detail: "mock failure".to_string(),
            }),
            Script::Malformed => Err(FulfillmentError::malformed("mock malformed body")),
        }
    }
}

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn gym_responses() -> ResponseConfig {
    let mut responses = ResponseConfig::default()
        .with_canned("Welcome", WELCOME, TurnAction::Fulfilled)
        .with_canned("Help", "Ask about opening hours, classes or memberships.", TurnAction::Fulfilled)
        .with_canned("Goodbye", "Thanks for chatting. Bye!", TurnAction::Closed)
        .with_forward("AskTrainer");
    responses.system_prompt = Some(GYM_PROMPT.to_string());
    responses.failure_message = FAILURE.to_string();
    responses
}

fn router_with(proxy: Arc<dyn ChatProxy>) -> FulfillmentRouter {
    FulfillmentRouter::new(gym_responses(), proxy)
}

// --- Canned responses ---

#[tokio::test]
async fn test_recognised_intents_never_call_proxy() {
    init_test_logging();
    let proxy = MockProxy::answering("should not be used");
    let router = router_with(Arc::new(proxy.clone()));

    for intent in ["Welcome", "Help", "Goodbye"] {
        for utterance in ["", "hello there", "What time is the gym open?"] {
            let outcome = router
                .handle(&IntentEvent::new(intent, "session-1", utterance))
                .await;
            assert!(!outcome.message.is_empty());
            assert_ne!(outcome.message, "should not be used");
        }
    }
    assert_eq!(proxy.call_count(), 0);
}

#[tokio::test]
async fn test_welcome_returns_configured_text() {
    let proxy = MockProxy::answering("unused");
    let router = router_with(Arc::new(proxy.clone()));

    let outcome = router.handle(&IntentEvent::new("Welcome", "s", "")).await;
    assert_eq!(outcome, TurnOutcome::fulfilled(WELCOME));
    assert_eq!(proxy.call_count(), 0);
}

#[tokio::test]
async fn test_goodbye_closes_session() {
    let router = router_with(Arc::new(MockProxy::answering("unused")));
    let outcome = router.handle(&IntentEvent::new("Goodbye", "s", "bye")).await;
    assert_eq!(outcome.action, TurnAction::Closed);
}

// --- Forwarding ---

#[tokio::test]
async fn test_fallback_intent_end_to_end() {
    init_test_logging();
    let proxy = MockProxy::answering("The gym is open 6am-10pm daily.");
    let router = router_with(Arc::new(proxy.clone()));

    let event = IntentEvent::new("FallbackIntent", "session-7", "What time is the gym open?");
    let outcome = router.handle(&event).await;

    assert_eq!(outcome.action, TurnAction::Fulfilled);
    assert_eq!(outcome.message, "The gym is open 6am-10pm daily.");
    assert_eq!(proxy.call_count(), 1);

    let request = proxy.last_call().unwrap();
    assert_eq!(request.system_prompt.as_deref(), Some(GYM_PROMPT));
    assert_eq!(request.utterance, "What time is the gym open?");
    assert_eq!(request.session_id.as_deref(), Some("session-7"));
    let messages = request.messages();
    assert_eq!(messages.last().unwrap().role, "user");
    assert_eq!(
        messages.last().unwrap().content.as_deref(),
        Some("What time is the gym open?")
    );
}

#[tokio::test]
async fn test_unknown_and_always_forward_intents_are_forwarded() {
    let proxy = MockProxy::answering("Ask at reception.");
    let router = router_with(Arc::new(proxy.clone()));

    for intent in ["AskTrainer", "SomethingNew"] {
        let outcome = router
            .handle(&IntentEvent::new(intent, "s", "Who runs the yoga class?"))
            .await;
        assert_eq!(outcome, TurnOutcome::fulfilled("Ask at reception."));
    }
    assert_eq!(proxy.call_count(), 2);
}

#[tokio::test]
async fn test_without_system_prompt_only_user_message_is_sent() {
    let proxy = MockProxy::answering("ok");
    let router = FulfillmentRouter::new(ResponseConfig::default(), Arc::new(proxy.clone()));

    router.handle(&IntentEvent::new("FallbackIntent", "s", "hi")).await;
    let request = proxy.last_call().unwrap();
    assert!(request.system_prompt.is_none());
    assert_eq!(request.messages().len(), 1);
}

#[tokio::test]
async fn test_empty_utterance_on_fallback_is_well_formed() {
    let proxy = MockProxy::answering("unused");
    let router = router_with(Arc::new(proxy.clone()));

    for utterance in ["", "   ", "\n\t"] {
        let outcome = router
            .handle(&IntentEvent::new("FallbackIntent", "s", utterance))
            .await;
        assert_eq!(outcome.action, TurnAction::Fulfilled);
        assert!(!outcome.message.trim().is_empty());
        assert_eq!(outcome.message, router.responses().empty_utterance_message);
    }
    assert_eq!(proxy.call_count(), 0);
}

// --- Failures ---

#[tokio::test]
async fn test_every_upstream_failure_degrades_to_fallback_message() {
    init_test_logging();
    for script in [
        Script::Timeout,
        Script::Status(500),
        Script::Status(429),
        Script::Malformed,
    ] {
        let proxy = MockProxy::new(script);
        let router = router_with(Arc::new(proxy.clone()));
        let outcome = router
            .handle(&IntentEvent::new("FallbackIntent", "s", "Do you have a pool?"))
            .await;
        assert_eq!(outcome, TurnOutcome::fulfilled(FAILURE));
        assert_eq!(proxy.call_count(), 1, "router must not retry");
    }
}

#[tokio::test]
async fn test_unconfigured_proxy_still_replies() {
    let router = FulfillmentRouter::new(
        ResponseConfig::default(),
        Arc::new(UnconfiguredProxy::new("proxy endpoint is not configured")),
    );
    let outcome = router
        .handle(&IntentEvent::new("FallbackIntent", "s", "Is the sauna open?"))
        .await;
    assert_eq!(outcome.action, TurnAction::Fulfilled);
    assert_eq!(outcome.message, ResponseConfig::default().failure_message);
}

// --- Independence ---

#[tokio::test]
async fn test_identical_events_are_independent() {
    let proxy = MockProxy::answering("Classes run every hour.");
    let router = Arc::new(router_with(Arc::new(proxy.clone())));
    let event = IntentEvent::new("FallbackIntent", "session-9", "When are classes?");
    let welcome = IntentEvent::new("Welcome", "session-9", "");

    let first = router.handle(&event).await;
    let interleaved = router.handle(&welcome).await;
    let second = router.handle(&event).await;

    assert_eq!(first, second);
    assert_eq!(interleaved, TurnOutcome::fulfilled(WELCOME));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            let event = event.clone();
            tokio::spawn(async move { router.handle(&event).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), first);
    }
    assert_eq!(proxy.call_count(), 10);
}

// --- Lex envelope ---

#[tokio::test]
async fn test_handle_lex_renders_close_reply() {
    let router = router_with(Arc::new(MockProxy::answering(
        "The gym is open 6am-10pm daily.",
    )));
    let event: LexEvent = serde_json::from_value(json!({
        "sessionId": "lex-session",
        "inputTranscript": "What time is the gym open?",
        "invocationSource": "FulfillmentCodeHook",
        "sessionState": {
            "sessionAttributes": {"visits": "3"},
            "intent": {"name": "FallbackIntent", "slots": {}, "state": "ReadyForFulfillment"}
        }
    }))
    .unwrap();

    let reply = router.handle_lex(event).await;
    assert_eq!(reply.session_state.dialog_action.action_type, DialogActionType::Close);
    assert_eq!(reply.session_state.intent.name, "FallbackIntent");
    assert_eq!(reply.session_state.intent.state, Some(IntentState::Fulfilled));
    assert_eq!(reply.session_state.session_attributes["visits"], "3");
    assert_eq!(reply.messages.len(), 1);
    assert_eq!(reply.messages[0].content, "The gym is open 6am-10pm daily.");
}

#[tokio::test]
async fn test_handle_lex_without_intent_name_uses_fallback() {
    let proxy = MockProxy::answering("Hello!");
    let router = router_with(Arc::new(proxy.clone()));
    let event: LexEvent =
        serde_json::from_value(json!({"sessionId": "x", "inputTranscript": "hey"})).unwrap();

    let reply = router.handle_lex(event).await;
    assert_eq!(reply.session_state.intent.name, "FallbackIntent");
    assert_eq!(reply.messages[0].content, "Hello!");
    assert_eq!(proxy.call_count(), 1);
}

#[tokio::test]
async fn test_handle_lex_null_maps_keep_intent_and_transcript() {
    let proxy = MockProxy::answering("unused");
    let router = router_with(Arc::new(proxy.clone()));
    let event: LexEvent = serde_json::from_value(json!({
        "inputTranscript": "hello",
        "sessionState": {
            "sessionAttributes": null,
            "intent": {"name": "Welcome", "slots": null}
        }
    }))
    .unwrap();

    let reply = router.handle_lex(event).await;
    assert_eq!(reply.session_state.intent.name, "Welcome");
    assert_eq!(reply.messages[0].content, WELCOME);
    assert_eq!(proxy.call_count(), 0);
}

#[tokio::test]
async fn test_delegate_returns_list_slot_unchanged() {
    let proxy = MockProxy::answering("unused");
    let responses = gym_responses().with_canned("BookClasses", "", TurnAction::Delegate);
    let router = FulfillmentRouter::new(responses, Arc::new(proxy.clone()));

    let classes = json!({
        "shape": "List",
        "value": {"originalValue": "spin and yoga", "interpretedValue": "spin and yoga"},
        "values": [
            {"shape": "Scalar", "value": {"originalValue": "spin", "interpretedValue": "spin", "resolvedValues": ["spin"]}},
            {"shape": "Scalar", "value": {"originalValue": "yoga", "interpretedValue": "yoga", "resolvedValues": ["yoga"]}}
        ]
    });
    let event: LexEvent = serde_json::from_value(json!({
        "sessionId": "lex-session",
        "inputTranscript": "book spin and yoga",
        "sessionState": {
            "intent": {"name": "BookClasses", "slots": {"Classes": classes.clone(), "Day": null}}
        }
    }))
    .unwrap();

    let reply = router.handle_lex(event).await;
    assert_eq!(reply.session_state.dialog_action.action_type, DialogActionType::Delegate);
    assert_eq!(reply.session_state.intent.state, Some(IntentState::InProgress));
    assert!(reply.messages.is_empty());

    let reply = serde_json::to_value(&reply).unwrap();
    assert_eq!(reply["sessionState"]["intent"]["slots"]["Classes"], classes);
    assert!(reply["sessionState"]["intent"]["slots"]["Day"].is_null());
    assert_eq!(proxy.call_count(), 0);
}

// --- Against a real HTTP proxy mock ---

fn http_router(server: &MockServer, timeout: Duration) -> FulfillmentRouter {
    let mut config = ProxyConfig::new(Url::parse(&server.base_url()).unwrap());
    config.timeout = timeout;
    let client = LiteLlmClient::new(&config).unwrap();
    router_with(Arc::new(client))
}

#[tokio::test]
async fn test_http_proxy_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("What time is the gym open?");
            then.status(200).json_body(json!({
                "id": "chatcmpl-gym",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "The gym is open 6am-10pm daily."}, "finish_reason": "stop"}]
            }));
        })
        .await;

    let router = http_router(&server, Duration::from_secs(2));
    let outcome = router
        .handle(&IntentEvent::new("FallbackIntent", "s", "What time is the gym open?"))
        .await;

    mock.assert_async().await;
    assert_eq!(outcome, TurnOutcome::fulfilled("The gym is open 6am-10pm daily."));
}

#[tokio::test]
async fn test_http_proxy_never_responding_hits_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).delay(Duration::from_secs(30));
        })
        .await;

    let timeout = Duration::from_millis(300);
    let router = http_router(&server, timeout);

    let started = Instant::now();
    let outcome = router
        .handle(&IntentEvent::new("FallbackIntent", "s", "Is it busy now?"))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, TurnOutcome::fulfilled(FAILURE));
    assert!(
        elapsed < timeout + Duration::from_millis(700),
        "took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_http_proxy_empty_200_body_gives_fallback() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200);
        })
        .await;

    let router = http_router(&server, Duration::from_secs(2));
    let outcome = router
        .handle(&IntentEvent::new("FallbackIntent", "s", "Do you sell protein shakes?"))
        .await;

    assert_eq!(outcome, TurnOutcome::fulfilled(FAILURE));
    assert!(!outcome.message.is_empty());
}
