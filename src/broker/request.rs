//! One-shot request lifecycle.
//!
//! Each accepted `agent_request` runs as its own task with its own
//! [`CancellationToken`], independent of all other requests. The emit
//! sequence is: `system{init_start}` → create conversation → send the
//! composed prompt → `system{sdk_ready}` → translate-and-forward events
//! until terminal → final empty `agent_response{done:true}` →
//! `request_complete`. The conversation is closed and the token
//! deregistered on every exit path.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broker::emitter::Emitter;
use crate::config::RequestConfig;
use crate::engine::translate::translate_event;
use crate::engine::{Conversation, Engine, SessionOptions};
use crate::{AppError, Result};

/// Outstanding one-shot cancellation tokens, keyed by `requestId`.
///
/// Shared between the broker loop (which inserts on `agent_request` and
/// signals on `cancel`) and the request tasks (which remove their own
/// entry on completion). Cancellation racing completion is expected and
/// resolves silently in favor of completion.
pub type CancellationMap = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Run one one-shot request to completion, abortion, or failure.
///
/// Never returns an error: every failure inside the unit of work is
/// converted to the paired `error`/`request_complete` emission.
pub async fn run_one_shot(
    engine: Arc<dyn Engine>,
    emitter: Emitter,
    cancellations: CancellationMap,
    request_id: String,
    config: RequestConfig,
    cancel: CancellationToken,
) {
    let outcome = drive_request(engine.as_ref(), &emitter, &request_id, &config, &cancel).await;

    if let Err(err) = outcome {
        emitter.error(&request_id, &err.to_string()).await;
    }
    emitter.agent_response(&request_id, "", true).await;
    emitter.request_complete(&request_id).await;

    cancellations.lock().await.remove(&request_id);
    debug!(request_id, "one-shot request finished");
}

/// Establish the conversation and run the single turn.
///
/// The conversation is closed before returning regardless of the turn's
/// outcome (guaranteed-release discipline); close failures are logged,
/// not propagated.
async fn drive_request(
    engine: &dyn Engine,
    emitter: &Emitter,
    request_id: &str,
    config: &RequestConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    emitter.system(request_id, "init_start").await;

    let options = SessionOptions::build(config);
    let initial_prompt = options.initial_prompt.clone();
    let mut conversation = engine.create_conversation(options).await?;

    let outcome = drive_turn(
        conversation.as_mut(),
        emitter,
        request_id,
        &initial_prompt,
        Some(cancel),
    )
    .await;

    if let Err(err) = conversation.close().await {
        warn!(request_id, %err, "failed to close conversation");
    }

    outcome
}

/// Send one turn and pump its events to the host.
///
/// Shared by one-shot requests and stream-session turns; the caller has
/// already emitted `system{init_start}` and established the
/// conversation.
///
/// # Errors
///
/// - [`AppError::Engine`] on send or stream failure.
/// - [`AppError::Aborted`] when `cancel` is signaled between events.
pub(crate) async fn drive_turn(
    conversation: &mut dyn Conversation,
    emitter: &Emitter,
    request_id: &str,
    text: &str,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    conversation.send(text).await?;
    emitter.system(request_id, "sdk_ready").await;
    pump_events(conversation, emitter, request_id, cancel).await
}

/// Forward conversation events until a terminal event, end of stream,
/// failure, or cancellation.
///
/// Each raw event is forwarded as `agent_event` before any derived
/// `agent_response` fragment. Cancellation is cooperative: the token is
/// checked once per iteration and cannot interrupt a call already
/// awaiting the engine.
async fn pump_events(
    conversation: &mut dyn Conversation,
    emitter: &Emitter,
    request_id: &str,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            debug!(request_id, "cancellation observed, stopping event pump");
            return Err(AppError::Aborted);
        }

        let Some(event) = conversation.next_event().await? else {
            // Engine closed the stream without a terminal event.
            return Ok(());
        };

        let step = translate_event(&event);

        // Raw event first, derived fragment second.
        emitter.agent_event(request_id, event).await;
        if let Some(fragment) = step.fragment {
            emitter.agent_response(request_id, &fragment, false).await;
        }

        if step.terminal {
            return Ok(());
        }
    }
}
