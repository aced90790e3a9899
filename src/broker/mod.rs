//! Broker loop: read, dispatch, drain.
//!
//! The broker is the only component that reads the control input stream.
//! It decodes one line at a time and dispatches to handlers that run as
//! spawned tasks, so many requests and sessions can be in flight while
//! the loop keeps reading. All handlers write through the shared
//! [`Emitter`]; outbound ordering is guaranteed per `requestId` only.
//!
//! Shutdown (explicit `shutdown` message, input EOF, or an external
//! termination signal) stops reading, closes every open session, signals
//! every outstanding one-shot cancellation token, awaits all in-flight
//! work, and flushes the writer before returning.

pub mod emitter;
pub mod registry;
pub mod request;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RequestConfig;
use crate::engine::Engine;
use crate::protocol::{parse_line, Inbound, LineCodec};
use crate::{AppError, Result};

pub use emitter::Emitter;
pub use registry::SessionRegistry;

/// NDJSON control broker over a pair of byte streams.
pub struct Broker {
    engine: Arc<dyn Engine>,
}

impl Broker {
    /// Create a broker for the given agent engine.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Run the broker until shutdown, then drain.
    ///
    /// Emits `sidecar_ready` before consuming any input. `shutdown` is an
    /// external termination signal (e.g. SIGTERM wired up by `main`); the
    /// in-band `shutdown` message and input EOF end the loop the same
    /// way.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures of the transport itself; all
    /// per-request failures are converted to protocol `error` messages.
    pub async fn run<R, W>(self, input: R, output: W, shutdown: CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (emitter, outbound_rx) = Emitter::channel();
        let writer = tokio::spawn(emitter::run_writer(output, outbound_rx));

        // Ready marker precedes any input consumption.
        emitter.ready().await;

        let mut dispatcher = Dispatcher {
            engine: self.engine,
            emitter: emitter.clone(),
            cancellations: Arc::new(Mutex::new(HashMap::new())),
            registry: SessionRegistry::new(),
            tasks: JoinSet::new(),
        };

        let mut lines = FramedRead::new(input, LineCodec::new());

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("termination signal received, draining");
                    break;
                }

                item = lines.next() => match item {
                    None => {
                        info!("control stream closed, draining");
                        break;
                    }
                    Some(Err(AppError::Protocol(msg))) => {
                        // Framing error (e.g. line too long) — skip the line.
                        warn!(error = %msg, "control framing error, skipping line");
                    }
                    Some(Err(err)) => {
                        warn!(%err, "control stream error, draining");
                        break;
                    }
                    Some(Ok(line)) => match parse_line(&line) {
                        // Undecodable lines are logged by `parse_line`.
                        None => {}
                        Some(Inbound::Shutdown) => {
                            info!("shutdown requested");
                            break;
                        }
                        Some(message) => dispatcher.dispatch(message).await,
                    },
                }
            }
        }

        dispatcher.drain().await;
        drop(dispatcher);
        drop(emitter);

        // All emitter clones are gone; the writer drains its queue and exits.
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "writer task failed"),
            Err(err) => warn!(%err, "writer task panicked"),
        }

        Ok(())
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Mutable broker state: the session registry, the outstanding
/// cancellation tokens, and the in-flight task set. Owned by the loop;
/// only the cancellation map is shared with request tasks.
struct Dispatcher {
    engine: Arc<dyn Engine>,
    emitter: Emitter,
    cancellations: request::CancellationMap,
    registry: SessionRegistry,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    /// Dispatch one decoded control message.
    async fn dispatch(&mut self, message: Inbound) {
        match message {
            Inbound::Ping => self.emitter.pong().await,
            // Handled by the read loop before dispatch.
            Inbound::Shutdown => {}
            Inbound::Cancel { request_id } => self.handle_cancel(&request_id).await,
            Inbound::AgentRequest { request_id, config } => {
                self.handle_agent_request(request_id, config).await;
            }
            Inbound::StreamStart {
                request_id,
                session_id,
                config,
            } => self.handle_stream_start(request_id, session_id, config).await,
            Inbound::StreamMessage {
                request_id,
                session_id,
                user_message,
            } => {
                self.handle_stream_message(request_id, &session_id, user_message)
                    .await;
            }
            Inbound::StreamEnd { session_id } => self.handle_stream_end(&session_id).await,
        }
    }

    /// Signal a one-shot request's cancellation token.
    ///
    /// Unknown or already-finished requests are a silent no-op —
    /// cancellation races with completion are expected.
    async fn handle_cancel(&self, request_id: &str) {
        let token = self.cancellations.lock().await.get(request_id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                debug!(request_id, "cancellation signaled");
            }
            None => debug!(request_id, "cancel for unknown or finished request, ignoring"),
        }
    }

    /// Validate and launch a one-shot request task.
    async fn handle_agent_request(&mut self, request_id: String, config: RequestConfig) {
        if let Err(err) = config.validate() {
            self.fail_request(&request_id, &err.to_string()).await;
            return;
        }

        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .await
            .insert(request_id.clone(), token.clone());

        self.tasks.spawn(request::run_one_shot(
            Arc::clone(&self.engine),
            self.emitter.clone(),
            Arc::clone(&self.cancellations),
            request_id,
            config,
            token,
        ));
    }

    /// Open a stream session and enqueue its opening turn.
    ///
    /// A duplicate session identifier is rejected without touching the
    /// existing session.
    async fn handle_stream_start(
        &mut self,
        request_id: String,
        session_id: String,
        config: RequestConfig,
    ) {
        if self.registry.contains(&session_id) {
            let msg = format!("stream session '{session_id}' already exists");
            self.fail_request(&request_id, &msg).await;
            return;
        }

        if let Err(err) = config.validate() {
            self.fail_request(&request_id, &err.to_string()).await;
            return;
        }

        let (handle, task) = session::StreamSession::open(
            session_id.clone(),
            Arc::clone(&self.engine),
            self.emitter.clone(),
        );
        if !handle.start(request_id.clone(), config) {
            // Unreachable for a just-opened session; fail like a closed one.
            self.fail_request(&request_id, "session is closed").await;
            return;
        }
        self.tasks.spawn(task);
        self.registry.insert(session_id, handle);
    }

    /// Route a turn to its session's serialized queue.
    async fn handle_stream_message(
        &mut self,
        request_id: String,
        session_id: &str,
        user_message: String,
    ) {
        let Some(handle) = self.registry.get(session_id) else {
            let msg = format!("no stream session found for '{session_id}'");
            self.fail_request(&request_id, &msg).await;
            return;
        };

        if !handle.turn(request_id.clone(), user_message) {
            // Session task already exited; treat like a closed session.
            self.fail_request(&request_id, "session is closed").await;
        }
    }

    /// Close and remove a session. Absence is not an error.
    async fn handle_stream_end(&mut self, session_id: &str) {
        match self.registry.remove(session_id) {
            Some(handle) => {
                handle.close();
                debug!(session_id, "stream session end requested");
            }
            None => debug!(session_id, "stream_end for unknown session, ignoring"),
        }
    }

    /// Emit the `error` + `request_complete` pair for a request that
    /// never started work.
    async fn fail_request(&self, request_id: &str, message: &str) {
        self.emitter.error(request_id, message).await;
        self.emitter.request_complete(request_id).await;
    }

    /// Shutdown drain: close sessions, cancel one-shots, await all work.
    async fn drain(&mut self) {
        for (_, handle) in self.registry.drain() {
            handle.close();
        }

        let tokens: Vec<CancellationToken> =
            self.cancellations.lock().await.values().cloned().collect();
        for token in tokens {
            token.cancel();
        }

        while self.tasks.join_next().await.is_some() {}
        info!("all in-flight work drained");
    }
}
