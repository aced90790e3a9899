//! Shutdown drain: in-flight work is aborted, completed, and flushed
//! before the broker exits.

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;

use super::test_helpers::{assistant_event, config_json, result_event, Harness, StubEngine};

/// `shutdown` with a slow one-shot in flight: the request is aborted,
/// its full completion tail is still written, and only then does the
/// broker exit.
#[tokio::test]
async fn shutdown_aborts_and_drains_in_flight_request() {
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

    let drained = harness.finish().await;
    let r1: Vec<&serde_json::Value> =
        drained.iter().filter(|m| m["requestId"] == "r1").collect();
    assert!(
        r1.iter()
            .any(|m| m["type"] == "error" && m["message"] == "Request aborted"),
        "in-flight request must be aborted: {drained:?}"
    );
    assert_eq!(r1.last().unwrap()["type"], "request_complete");
    assert_eq!(engine.closed.load(Ordering::SeqCst), 1);
}

/// Input EOF is treated exactly like an in-band `shutdown`.
#[tokio::test]
async fn input_eof_drains_and_exits() {
    let engine = StubEngine::new();
    engine.push_turns(vec![vec![assistant_event("ok"), result_event()]]);

    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({"type": "agent_request", "requestId": "r1", "config": config_json()}))
        .await;
    harness.recv_request("r1").await;

    harness.close_input().await;
    harness.join().await;
}

/// Shutdown closes every open stream session and releases its
/// conversation before exiting.
#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let engine = StubEngine::new();
    engine.push_turns(vec![vec![assistant_event("hello"), result_event()]]);

    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({
            "type": "stream_start",
            "requestId": "r1",
            "sessionId": "s1",
            "config": config_json(),
        }))
        .await;
    harness.recv_request("r1").await;

    harness.finish().await;
    assert_eq!(
        engine.closed.load(Ordering::SeqCst),
        1,
        "open session conversations must be released on shutdown"
    );
}
