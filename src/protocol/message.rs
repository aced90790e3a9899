//! Control message types and tolerant inbound parsing.
//!
//! Inbound and outbound messages form closed tagged unions discriminated
//! by a `type` field. Inbound parsing never panics or surfaces an error:
//! anything that is not a complete, recognized message yields `None`, and
//! the caller logs the line to stderr and moves on — the protocol has no
//! way to NACK an unparseable line because it lacks a correlation id.
//!
//! # Known inbound types
//!
//! | `type`           | Maps to                      |
//! |------------------|------------------------------|
//! | `ping`           | [`Inbound::Ping`]            |
//! | `shutdown`       | [`Inbound::Shutdown`]        |
//! | `cancel`         | [`Inbound::Cancel`]          |
//! | `agent_request`  | [`Inbound::AgentRequest`]    |
//! | `stream_start`   | [`Inbound::StreamStart`]     |
//! | `stream_message` | [`Inbound::StreamMessage`]   |
//! | `stream_end`     | [`Inbound::StreamEnd`]       |
//! | *(any other)*    | Dropped; logged at `WARN`    |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::RequestConfig;

// ── Inbound messages (host → sidecar) ────────────────────────────────────────

/// Control message received from the host process.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Liveness probe; answered immediately with [`Outbound::Pong`].
    Ping,
    /// Orderly shutdown request; the broker drains outstanding work.
    Shutdown,
    /// Cancel an outstanding one-shot request.
    #[serde(rename_all = "camelCase")]
    Cancel {
        /// Identifier of the request to cancel.
        request_id: String,
    },
    /// One-shot agent request: runs a single composed prompt to completion.
    #[serde(rename_all = "camelCase")]
    AgentRequest {
        /// Caller-supplied request identifier.
        request_id: String,
        /// Request configuration; values are validated by the handler.
        config: RequestConfig,
    },
    /// Open a stream session and run its first turn.
    #[serde(rename_all = "camelCase")]
    StreamStart {
        /// Request identifier for the opening turn.
        request_id: String,
        /// Caller-supplied session identifier, unique while open.
        session_id: String,
        /// Request configuration for the session.
        config: RequestConfig,
    },
    /// Send a follow-up turn on an open stream session.
    #[serde(rename_all = "camelCase")]
    StreamMessage {
        /// Request identifier for this turn.
        request_id: String,
        /// Target session identifier.
        session_id: String,
        /// Turn text to send to the conversation.
        user_message: String,
    },
    /// Close a stream session. Absence of the session is not an error.
    #[serde(rename_all = "camelCase")]
    StreamEnd {
        /// Session identifier to close.
        session_id: String,
    },
}

// ── Outbound messages (sidecar → host) ───────────────────────────────────────

/// Control message emitted to the host process.
///
/// `Eq` is not derivable: the opaque event payload is a
/// [`serde_json::Value`], which is only `PartialEq`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Emitted once at startup, before any input is consumed.
    SidecarReady,
    /// Response to [`Inbound::Ping`].
    Pong,
    /// Lifecycle marker for a request (`init_start`, `sdk_ready`).
    #[serde(rename_all = "camelCase")]
    System {
        /// Request this marker belongs to.
        request_id: String,
        /// Marker kind.
        subtype: String,
        /// Unix epoch milliseconds at emission time.
        timestamp: i64,
    },
    /// Raw agent-engine event, forwarded verbatim.
    #[serde(rename_all = "camelCase")]
    AgentEvent {
        /// Request this event belongs to.
        request_id: String,
        /// Opaque engine event.
        event: Value,
    },
    /// Incremental assistant text, or the final empty `done` marker.
    #[serde(rename_all = "camelCase")]
    AgentResponse {
        /// Request this fragment belongs to.
        request_id: String,
        /// Assistant text fragment; empty on the final marker.
        content: String,
        /// `true` only on the final marker for the request.
        done: bool,
    },
    /// Terminal failure (or cancellation) for a request.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Request the failure belongs to.
        request_id: String,
        /// Failure text; exactly `Request aborted` for cancellation.
        message: String,
    },
    /// Final message for a request; nothing for its `requestId` follows.
    #[serde(rename_all = "camelCase")]
    RequestComplete {
        /// Request that finished.
        request_id: String,
    },
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Parse one line of the control stream into an [`Inbound`] message.
///
/// Returns `None` — never an error — for:
/// - empty or whitespace-only input,
/// - invalid JSON,
/// - a missing or unrecognized `type` discriminator,
/// - a recognized type missing required fields (including the required
///   fields of an embedded [`RequestConfig`]).
///
/// Dropped lines are logged at `WARN` with the parse failure; the broker
/// keeps reading subsequent lines.
#[must_use]
pub fn parse_line(line: &str) -> Option<Inbound> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Inbound>(trimmed) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(%err, raw_line = trimmed, "dropping undecodable control line");
            None
        }
    }
}
