//! Event translation: engine events → protocol vocabulary.
//!
//! Engine events are opaque JSON values; only a small declared field set
//! is inspected (`type`, nested text blocks under `message.content`).
//! Everything else passes through verbatim as `agent_event` — the caller
//! always forwards the raw event **before** any derived fragment.

use serde_json::Value;

/// Result of translating one engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Incremental assistant text extracted from the event, if any.
    pub fragment: Option<String>,
    /// Whether the event ends the current turn (final result or error).
    pub terminal: bool,
}

/// Translate one opaque engine event.
///
/// Only events explicitly tagged as assistant-authored content
/// (`type == "assistant"`) with extractable, non-empty text blocks
/// contribute a fragment. Events of kind `result` or `error` are
/// classified as terminal. All other kinds (tool calls, planning,
/// intermediate metadata) produce neither.
#[must_use]
pub fn translate_event(event: &Value) -> Translation {
    let kind = event.get("type").and_then(Value::as_str).unwrap_or("");

    Translation {
        fragment: if kind == "assistant" {
            extract_text(event)
        } else {
            None
        },
        terminal: matches!(kind, "result" | "error"),
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Concatenate the text blocks of an assistant event's `message.content`
/// array. Returns `None` when no non-empty text results.
fn extract_text(event: &Value) -> Option<String> {
    let blocks = event.get("message")?.get("content")?.as_array()?;

    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
