//! Host-CLI engine implementation.
//!
//! Spawns one headless host-CLI subprocess per conversation with:
//! - `kill_on_drop(true)` so processes are cleaned up automatically.
//! - `env_clear()` + a safe variable allowlist, so nothing from the
//!   sidecar's environment leaks into the child beyond the allowlist and
//!   the engine-facing view built by the options builder.
//! - NDJSON stdio: turns are written to the child's stdin as user
//!   messages; structured events are read line-by-line from its stdout.
//!
//! Malformed event lines from the child are logged and skipped — they do
//! not terminate the conversation.

use std::process::Stdio;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::engine::{Conversation, Engine, SessionOptions};
use crate::protocol::LineCodec;
use crate::{AppError, Result};

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by the spawned engine process.
///
/// Every other variable from the sidecar's environment is stripped via
/// `env_clear()` before the child is launched; the credential is injected
/// explicitly from [`SessionOptions::env`].
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Grace period given to the child between stdin close and force-kill.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for the host-CLI engine.
#[derive(Debug, Clone)]
pub struct CliEngineConfig {
    /// Host CLI binary (e.g., `claude`).
    pub binary: String,
    /// Default arguments passed to the host CLI before per-conversation
    /// flags.
    pub args: Vec<String>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// [`Engine`] implementation backed by a host CLI subprocess per
/// conversation.
#[derive(Debug, Clone)]
pub struct CliEngine {
    config: CliEngineConfig,
}

impl CliEngine {
    /// Create a new `CliEngine`.
    #[must_use]
    pub fn new(config: CliEngineConfig) -> Self {
        Self { config }
    }

    /// Spawn the host CLI for one conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`] on OS spawn failure or when the
    /// child's stdio handles cannot be captured.
    fn spawn(&self, options: &SessionOptions, resume: Option<&str>) -> Result<CliConversation> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&self.config.args);
        cmd.arg("--model").arg(&options.model);
        cmd.arg("--permission-mode").arg(options.settings_profile);
        if let Some(conversation_id) = resume {
            cmd.arg("--resume").arg(conversation_id);
        }

        // Strip inherited environment, then inject only the safe
        // allowlist plus the engine-facing view (credential included).
        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        for (key, val) in &options.env {
            cmd.env(key, val);
        }

        cmd.current_dir(&options.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Child diagnostics join the sidecar's own stderr stream.
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Engine(format!("failed to spawn engine process: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture engine stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture engine stdout".into()))?;

        info!(binary = %self.config.binary, "engine process spawned");

        Ok(CliConversation {
            child,
            stdin: Some(stdin),
            events: FramedRead::new(stdout, LineCodec::new()),
        })
    }
}

impl Engine for CliEngine {
    fn create_conversation(
        &self,
        options: SessionOptions,
    ) -> BoxFuture<'_, Result<Box<dyn Conversation>>> {
        Box::pin(async move {
            let conversation = self.spawn(&options, None)?;
            Ok(Box::new(conversation) as Box<dyn Conversation>)
        })
    }

    fn resume_conversation<'a>(
        &'a self,
        conversation_id: &'a str,
        options: SessionOptions,
    ) -> BoxFuture<'a, Result<Box<dyn Conversation>>> {
        Box::pin(async move {
            let conversation = self.spawn(&options, Some(conversation_id))?;
            Ok(Box::new(conversation) as Box<dyn Conversation>)
        })
    }
}

// ── Conversation ─────────────────────────────────────────────────────────────

/// Active stdio connection to one spawned engine process.
struct CliConversation {
    /// Child process handle — kept alive so `kill_on_drop` works.
    child: Child,
    /// Child stdin; taken on close so teardown is idempotent.
    stdin: Option<ChildStdin>,
    /// Framed NDJSON reader over the child's stdout.
    events: FramedRead<ChildStdout, LineCodec>,
}

impl Conversation for CliConversation {
    fn send<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(stdin) = self.stdin.as_mut() else {
                return Err(AppError::Engine("conversation already closed".into()));
            };

            let message = json!({
                "type": "user",
                "message": { "role": "user", "content": text },
            });
            let mut bytes = serde_json::to_vec(&message)
                .map_err(|err| AppError::Engine(format!("failed to serialise turn: {err}")))?;
            bytes.push(b'\n');

            stdin
                .write_all(&bytes)
                .await
                .map_err(|err| AppError::Engine(format!("write to engine failed: {err}")))?;
            stdin
                .flush()
                .await
                .map_err(|err| AppError::Engine(format!("flush to engine failed: {err}")))
        })
    }

    fn next_event(&mut self) -> BoxFuture<'_, Result<Option<Value>>> {
        Box::pin(async move {
            loop {
                match self.events.next().await {
                    None => return Ok(None),
                    Some(Err(AppError::Protocol(msg))) => {
                        // Framing error (e.g. line too long) — skip the line.
                        warn!(error = %msg, "engine event framing error, skipping");
                    }
                    Some(Err(err)) => {
                        return Err(AppError::Engine(format!("engine stream failed: {err}")));
                    }
                    Some(Ok(line)) => match serde_json::from_str::<Value>(&line) {
                        Ok(event) => return Ok(Some(event)),
                        Err(err) => {
                            warn!(%err, raw_line = %line, "malformed engine event, skipping");
                        }
                    },
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Closing stdin signals EOF; most host CLIs exit on their own.
            if let Some(mut stdin) = self.stdin.take() {
                if let Err(err) = stdin.shutdown().await {
                    debug!(%err, "engine stdin shutdown failed");
                }
            } else {
                return Ok(());
            }

            match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(?status, "engine process exited");
                    Ok(())
                }
                Ok(Err(err)) => Err(AppError::Engine(format!(
                    "error waiting for engine process: {err}"
                ))),
                Err(_elapsed) => {
                    warn!("engine process did not exit within grace period, forcing kill");
                    self.child
                        .kill()
                        .await
                        .map_err(|err| AppError::Engine(format!("failed to kill engine: {err}")))
                }
            }
        })
    }
}
