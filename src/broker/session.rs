//! Stream sessions: resumable, multi-turn conversations with strictly
//! serialized turns.
//!
//! Each session is one task consuming an explicit FIFO command queue. A
//! turn is only processed after the previous turn's full emission —
//! including its `request_complete` — has finished, so at most one turn
//! is ever streaming per session and per-session turn ordering is
//! preserved even when the caller submits turns back-to-back. The session
//! task exclusively owns its conversation handle.
//!
//! Turns within a session do not support mid-turn cancellation; a turn
//! runs to completion or error. Cancellation targets one-shot requests.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broker::emitter::Emitter;
use crate::broker::request::drive_turn;
use crate::config::RequestConfig;
use crate::engine::{Engine, SessionOptions};
use crate::{AppError, Result};

/// Fixed error text for turns that arrive at or behind a session close.
const SESSION_CLOSED: &str = "session is closed";

// ── Command queue ────────────────────────────────────────────────────────────

/// One entry of a session's serialized turn queue.
#[derive(Debug)]
enum TurnCmd {
    /// Opening turn: establish the conversation (resume or create) and
    /// send the composed initial prompt.
    Start {
        request_id: String,
        config: RequestConfig,
    },
    /// Follow-up turn on the established conversation.
    Turn { request_id: String, text: String },
    /// Close the session; anything still queued behind this fails fast.
    Close,
}

/// Broker-side handle to an open stream session.
///
/// Enqueue operations return `false` when the session task has already
/// exited (the queue is gone); the broker reports this as a closed
/// session.
#[derive(Debug)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<TurnCmd>,
}

impl SessionHandle {
    /// Enqueue the opening turn.
    #[must_use]
    pub fn start(&self, request_id: String, config: RequestConfig) -> bool {
        self.tx.send(TurnCmd::Start { request_id, config }).is_ok()
    }

    /// Enqueue a follow-up turn.
    #[must_use]
    pub fn turn(&self, request_id: String, text: String) -> bool {
        self.tx.send(TurnCmd::Turn { request_id, text }).is_ok()
    }

    /// Enqueue the close command. Idempotent from the caller's view.
    pub fn close(&self) {
        let _ = self.tx.send(TurnCmd::Close);
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// One open stream session: conversation handle, serialized turn queue,
/// closed flag.
pub struct StreamSession {
    session_id: String,
    engine: Arc<dyn Engine>,
    emitter: Emitter,
    conversation: Option<Box<dyn crate::engine::Conversation>>,
    closed: bool,
}

impl StreamSession {
    /// Open a session, returning the broker-side handle and the task
    /// future the broker spawns into its in-flight set.
    #[must_use]
    pub fn open(
        session_id: String,
        engine: Arc<dyn Engine>,
        emitter: Emitter,
    ) -> (SessionHandle, impl std::future::Future<Output = ()> + Send) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            session_id,
            engine,
            emitter,
            conversation: None,
            closed: false,
        };
        (SessionHandle { tx }, session.run(rx))
    }

    /// Consume the turn queue until close or shutdown.
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<TurnCmd>) {
        while let Some(cmd) = queue.recv().await {
            match cmd {
                TurnCmd::Start { request_id, config } => {
                    if self.closed {
                        self.reject_closed(&request_id).await;
                        continue;
                    }
                    let outcome = self.start_turn(&request_id, &config).await;
                    self.finish_turn(&request_id, outcome).await;
                }
                TurnCmd::Turn { request_id, text } => {
                    if self.closed {
                        self.reject_closed(&request_id).await;
                        continue;
                    }
                    let outcome = self.run_turn(&request_id, &text).await;
                    self.finish_turn(&request_id, outcome).await;
                }
                TurnCmd::Close => {
                    self.close().await;
                    self.drain_queue(&mut queue).await;
                    break;
                }
            }
        }

        // Queue dropped without an explicit close (broker shutdown path).
        if !self.closed {
            self.close().await;
        }
    }

    /// Opening turn: resume or create the conversation, then run the
    /// composed initial prompt as the first turn.
    async fn start_turn(&mut self, request_id: &str, config: &RequestConfig) -> Result<()> {
        let emitter = self.emitter.clone();
        emitter.system(request_id, "init_start").await;

        let options = SessionOptions::build(config);
        let initial_prompt = options.initial_prompt.clone();

        let conversation = match config.resume_session_id.as_deref() {
            Some(prior) => self.engine.resume_conversation(prior, options).await?,
            None => self.engine.create_conversation(options).await?,
        };
        let conversation = self.conversation.insert(conversation);

        drive_turn(
            conversation.as_mut(),
            &emitter,
            request_id,
            &initial_prompt,
            None,
        )
        .await
    }

    /// Follow-up turn on the established conversation.
    async fn run_turn(&mut self, request_id: &str, text: &str) -> Result<()> {
        let emitter = self.emitter.clone();
        emitter.system(request_id, "init_start").await;

        let Some(conversation) = self.conversation.as_mut() else {
            // The opening turn failed to establish a conversation.
            return Err(AppError::Engine(
                "no active conversation for session".into(),
            ));
        };

        drive_turn(conversation.as_mut(), &emitter, request_id, text, None).await
    }

    /// Emit the tail of a turn: optional `error`, final empty
    /// `agent_response{done:true}`, then `request_complete`.
    async fn finish_turn(&self, request_id: &str, outcome: Result<()>) {
        if let Err(err) = outcome {
            self.emitter.error(request_id, &err.to_string()).await;
        }
        self.emitter.agent_response(request_id, "", true).await;
        self.emitter.request_complete(request_id).await;
    }

    /// Fail a turn that reached a closed session.
    async fn reject_closed(&self, request_id: &str) {
        self.emitter.error(request_id, SESSION_CLOSED).await;
        self.emitter.request_complete(request_id).await;
    }

    /// Set the closed flag and release the conversation handle.
    async fn close(&mut self) {
        self.closed = true;
        if let Some(mut conversation) = self.conversation.take() {
            if let Err(err) = conversation.close().await {
                warn!(session_id = %self.session_id, %err, "failed to close session conversation");
            }
        }
        debug!(session_id = %self.session_id, "stream session closed");
    }

    /// Fail fast everything still queued behind a close.
    async fn drain_queue(&self, queue: &mut mpsc::UnboundedReceiver<TurnCmd>) {
        while let Ok(cmd) = queue.try_recv() {
            match cmd {
                TurnCmd::Start { request_id, .. } | TurnCmd::Turn { request_id, .. } => {
                    self.reject_closed(&request_id).await;
                }
                TurnCmd::Close => {}
            }
        }
    }
}
