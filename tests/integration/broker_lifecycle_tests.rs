//! Broker loop liveness and handshake behaviour.

use std::time::Duration;

use serde_json::json;

use super::test_helpers::{assistant_event, config_json, result_event, Harness, StubEngine};

/// `sidecar_ready` is the first thing on the wire, before any input is
/// consumed.
#[tokio::test]
async fn sidecar_ready_is_emitted_first() {
    let engine = StubEngine::new();
    let mut harness = Harness::spawn(&engine);

    assert_eq!(harness.recv().await, json!({"type": "sidecar_ready"}));
    harness.finish().await;
}

/// `ping` followed by `shutdown` with no other traffic: ready, pong,
/// clean exit.
#[tokio::test]
async fn ping_then_shutdown_is_clean() {
    let engine = StubEngine::new();
    let mut harness = Harness::spawn(&engine);

    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness.send(json!({"type": "ping"})).await;
    assert_eq!(harness.recv().await, json!({"type": "pong"}));

    // `finish` sends shutdown and asserts the broker exits without error.
    let rest = harness.finish().await;
    assert!(rest.is_empty(), "no output expected after pong, got: {rest:?}");
}

/// Malformed and unrecognized lines are dropped; the loop keeps
/// processing subsequent lines.
#[tokio::test]
async fn malformed_lines_do_not_kill_the_loop() {
    let engine = StubEngine::new();
    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness.send_raw("not-valid-json{{{").await;
    harness.send_raw("").await;
    harness.send_raw(r#"{"type":"warp_drive"}"#).await;
    harness.send_raw(r#"{"type":"cancel"}"#).await;
    harness
        .send_raw(r#"{"type":"agent_request","requestId":"r1","config":{"prompt":"p"}}"#)
        .await;

    harness.send(json!({"type": "ping"})).await;
    assert_eq!(
        harness.recv().await,
        json!({"type": "pong"}),
        "loop must stay alive and answer the ping after garbage input"
    );

    harness.finish().await;
}

/// `ping` is answered immediately even while a request is streaming.
#[tokio::test]
async fn ping_is_answered_while_request_is_active() {
    let engine = StubEngine::new();
    let mut events = vec![assistant_event("slow")];
    events.extend(std::iter::repeat_with(|| assistant_event("more")).take(20));
    events.push(result_event());
    engine.push_slow_turns(vec![events], Duration::from_millis(20));

    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness
        .send(json!({"type": "agent_request", "requestId": "r1", "config": config_json()}))
        .await;
    harness.send(json!({"type": "ping"})).await;

    let seen = harness.recv_until(|m| m["type"] == "pong").await;
    let pong_index = seen.len() - 1;
    assert!(
        seen[..pong_index].iter().all(|m| m["type"] != "request_complete"),
        "pong must arrive while the request is still in flight"
    );

    harness.recv_request("r1").await;
    harness.finish().await;
}

/// An external termination signal ends the loop and drains cleanly.
#[tokio::test]
async fn external_signal_terminates_the_loop() {
    let engine = StubEngine::new();
    let mut harness = Harness::spawn(&engine);
    assert_eq!(harness.recv().await["type"], "sidecar_ready");

    harness.shutdown.cancel();
    harness.join().await;
}
