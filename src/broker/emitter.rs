//! Outbound emission channel and NDJSON writer task.
//!
//! All handlers share a cloneable [`Emitter`] that feeds a single tokio
//! [`mpsc`] channel; the writer task serialises each [`Outbound`] message
//! to a single-line JSON string and writes the NDJSON line to the shared
//! output stream. Messages for one `requestId` are emitted in the order
//! the handler produces them; there is no reordering buffer.

use chrono::Utc;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::Outbound;
use crate::{AppError, Result};

/// Bound of the outbound channel; applies backpressure to handlers when
/// the host reads slowly.
const OUTBOUND_CAPACITY: usize = 256;

/// Cloneable sender side of the outbound message channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<Outbound>,
}

impl Emitter {
    /// Create an emitter and the receiver to hand to [`run_writer`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue one outbound message.
    ///
    /// A closed channel (writer already gone during shutdown) is not an
    /// error; the message is dropped with a debug diagnostic.
    pub async fn emit(&self, message: Outbound) {
        if self.tx.send(message).await.is_err() {
            debug!("output channel closed, dropping outbound message");
        }
    }

    /// Emit `sidecar_ready`.
    pub async fn ready(&self) {
        self.emit(Outbound::SidecarReady).await;
    }

    /// Emit `pong`.
    pub async fn pong(&self) {
        self.emit(Outbound::Pong).await;
    }

    /// Emit a `system` lifecycle marker stamped with the current time.
    pub async fn system(&self, request_id: &str, subtype: &str) {
        self.emit(Outbound::System {
            request_id: request_id.to_owned(),
            subtype: subtype.to_owned(),
            timestamp: Utc::now().timestamp_millis(),
        })
        .await;
    }

    /// Forward a raw engine event as `agent_event`.
    pub async fn agent_event(&self, request_id: &str, event: Value) {
        self.emit(Outbound::AgentEvent {
            request_id: request_id.to_owned(),
            event,
        })
        .await;
    }

    /// Emit an `agent_response` fragment or the final `done` marker.
    pub async fn agent_response(&self, request_id: &str, content: &str, done: bool) {
        self.emit(Outbound::AgentResponse {
            request_id: request_id.to_owned(),
            content: content.to_owned(),
            done,
        })
        .await;
    }

    /// Emit a terminal `error` for a request.
    pub async fn error(&self, request_id: &str, message: &str) {
        self.emit(Outbound::Error {
            request_id: request_id.to_owned(),
            message: message.to_owned(),
        })
        .await;
    }

    /// Emit `request_complete`.
    pub async fn request_complete(&self, request_id: &str) {
        self.emit(Outbound::RequestComplete {
            request_id: request_id.to_owned(),
        })
        .await;
    }
}

/// Writer task — serialises outbound messages and writes NDJSON lines.
///
/// Receives [`Outbound`] messages from `rx`, serialises each to a compact
/// single-line JSON string, appends `\n`, writes the bytes to `output`,
/// and flushes so the host sees each message promptly. Exits cleanly when
/// all senders are dropped.
///
/// # Errors
///
/// - [`AppError::Protocol`] if serialisation fails (should not occur for
///   internally constructed messages).
/// - [`AppError::Io`] if the write to the output stream fails (e.g. the
///   host process has exited).
pub async fn run_writer<W>(mut output: W, mut rx: mpsc::Receiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(message) = rx.recv().await {
        let mut bytes = serde_json::to_vec(&message).map_err(|err| {
            AppError::Protocol(format!("failed to serialise outbound message: {err}"))
        })?;

        // NDJSON: append the newline delimiter.
        bytes.push(b'\n');

        output.write_all(&bytes).await.map_err(|err| {
            warn!(%err, "write to output stream failed");
            AppError::Io(err.to_string())
        })?;
        output.flush().await.map_err(|err| AppError::Io(err.to_string()))?;
    }

    Ok(())
}
