//! Unit tests for the engine event translator.

use serde_json::json;

use agent_sidecar::engine::translate::translate_event;

/// An assistant event with one text block yields that text as a
/// fragment and is not terminal.
#[test]
fn assistant_text_yields_fragment() {
    let event = json!({
        "type": "assistant",
        "message": { "content": [ { "type": "text", "text": "ok" } ] },
    });

    let step = translate_event(&event);
    assert_eq!(step.fragment.as_deref(), Some("ok"));
    assert!(!step.terminal);
}

/// Multiple text blocks are concatenated in order; non-text blocks in
/// between are skipped.
#[test]
fn text_blocks_are_concatenated() {
    let event = json!({
        "type": "assistant",
        "message": { "content": [
            { "type": "text", "text": "hello " },
            { "type": "tool_use", "name": "bash" },
            { "type": "text", "text": "world" },
        ] },
    });

    let step = translate_event(&event);
    assert_eq!(step.fragment.as_deref(), Some("hello world"));
}

/// An assistant event with no extractable text produces no fragment.
#[test]
fn assistant_without_text_yields_no_fragment() {
    let event = json!({
        "type": "assistant",
        "message": { "content": [ { "type": "tool_use", "name": "bash" } ] },
    });
    assert_eq!(translate_event(&event).fragment, None);

    let event = json!({
        "type": "assistant",
        "message": { "content": [ { "type": "text", "text": "" } ] },
    });
    assert_eq!(
        translate_event(&event).fragment,
        None,
        "empty text must not produce a fragment"
    );
}

/// Tool, planning, and other intermediate events yield neither a
/// fragment nor a terminal classification.
#[test]
fn intermediate_events_are_passthrough_only() {
    for event in [
        json!({"type": "tool_use", "name": "bash"}),
        json!({"type": "plan", "steps": []}),
        json!({"type": "system", "subtype": "init"}),
        json!({"no_type_at_all": true}),
    ] {
        let step = translate_event(&event);
        assert_eq!(step.fragment, None, "no fragment for {event}");
        assert!(!step.terminal, "not terminal: {event}");
    }
}

/// `result` and `error` events are terminal, with no fragment.
#[test]
fn result_and_error_are_terminal() {
    let step = translate_event(&json!({"type": "result", "subtype": "success"}));
    assert!(step.terminal);
    assert_eq!(step.fragment, None);

    let step = translate_event(&json!({"type": "error", "message": "boom"}));
    assert!(step.terminal);
    assert_eq!(step.fragment, None);
}

/// A malformed assistant event (content not an array) degrades to no
/// fragment rather than failing.
#[test]
fn malformed_assistant_event_degrades_gracefully() {
    let event = json!({"type": "assistant", "message": { "content": "not-an-array" }});
    let step = translate_event(&event);
    assert_eq!(step.fragment, None);
    assert!(!step.terminal);
}
