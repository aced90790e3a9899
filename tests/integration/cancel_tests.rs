//! Cooperative cancellation of one-shot requests.

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use super::test_helpers::{assistant_event, config_json, result_event, Harness, StubEngine};

/// Cancelling an in-flight request stops the event pump, emits the fixed
/// abort text, and still runs the full completion tail.
#[tokio::test]
async fn cancel_aborts_in_flight_request() {
    let engine = StubEngine::new();
    let mut events: Vec<_> = std::iter::repeat_with(|| assistant_event("tick"))
        .take(50)
        .collect();
    events.push(result_event());
    engine.push_slow_turns(vec![events], Duration::from_millis(20));

    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({"type": "agent_request", "requestId": "r1", "config": config_json()}))
        .await;
    harness
        .send(json!({"type": "cancel", "requestId": "r1"}))
        .await;

    let seen = harness.recv_request("r1").await;
    let tail = &seen[seen.len() - 3..];
    assert_eq!(tail[0]["type"], "error");
    assert_eq!(tail[0]["message"], "Request aborted");
    assert_eq!(tail[1]["type"], "agent_response");
    assert_eq!(tail[1]["done"], true);
    assert_eq!(tail[2]["type"], "request_complete");

    harness.finish().await;
    assert_eq!(
        engine.closed.load(Ordering::SeqCst),
        1,
        "the conversation must be released after an abort"
    );
}

/// Cancel for an unknown request id is a silent no-op.
#[tokio::test]
async fn cancel_unknown_request_is_silent() {
    let engine = StubEngine::new();
    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({"type": "cancel", "requestId": "nobody"}))
        .await;

    // Fence: the very next outbound message is the pong, so the cancel
    // produced nothing.
    harness.send(json!({"type": "ping"})).await;
    assert_eq!(harness.recv().await["type"], "pong");
    harness.finish().await;
}

/// Cancel after a request has completed is a silent no-op: the token was
/// deregistered with the request.
#[tokio::test]
async fn cancel_after_completion_is_silent() {
    let engine = StubEngine::new();
    engine.push_turns(vec![vec![assistant_event("ok"), result_event()]]);

    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({"type": "agent_request", "requestId": "r1", "config": config_json()}))
        .await;
    harness.recv_request("r1").await;

    harness
        .send(json!({"type": "cancel", "requestId": "r1"}))
        .await;
    harness.send(json!({"type": "ping"})).await;
    assert_eq!(harness.recv().await["type"], "pong");

    harness.finish().await;
}
