//! Agent-engine abstraction.
//!
//! The engine that actually produces responses is an external
//! collaborator; the broker consumes it through the object-safe
//! [`Engine`] and [`Conversation`] traits. Engine events are opaque
//! [`serde_json::Value`]s — only the small field set inspected by
//! [`translate::translate_event`] is interpreted, everything else passes
//! through verbatim.
//!
//! Submodules:
//! - `options`: derives the [`SessionOptions`] bundle from validated
//!   request configuration.
//! - `translate`: maps engine events onto the protocol's outbound
//!   vocabulary.
//! - `cli`: [`CliEngine`](cli::CliEngine), which spawns a host CLI
//!   subprocess per conversation.

pub mod cli;
pub mod options;
pub mod translate;

use futures_util::future::BoxFuture;
use serde_json::Value;

pub use options::SessionOptions;

use crate::Result;

/// Environment key under which the credential is handed to the engine.
///
/// The [`options::SessionOptions`] builder is the only place the
/// credential reaches an environment-shaped structure.
pub const API_KEY_ENV: &str = "AGENT_API_KEY";

/// One exchange with the agent engine.
///
/// A conversation accepts turns via [`Conversation::send`] and yields a
/// lazy sequence of structured events via [`Conversation::next_event`]
/// until a terminal event arrives. Each conversation is exclusively
/// owned by the request or stream session that created it — no other
/// component may call into it concurrently.
pub trait Conversation: Send + Sync {
    /// Send one turn of user text to the conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the
    /// engine rejects or fails the send.
    fn send<'a>(&'a mut self, text: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Await the next structured event.
    ///
    /// Returns `Ok(None)` when the event sequence ends without a further
    /// event (e.g. the engine closed the stream).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) on stream
    /// failures.
    fn next_event(&mut self) -> BoxFuture<'_, Result<Option<Value>>>;

    /// Release the conversation and any resources behind it.
    ///
    /// Called on every exit path (success, failure, cancellation);
    /// implementations must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if teardown
    /// fails; callers log and continue.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Factory capability for conversations.
pub trait Engine: Send + Sync {
    /// Create a fresh conversation from the given options.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the
    /// conversation cannot be established.
    fn create_conversation(
        &self,
        options: SessionOptions,
    ) -> BoxFuture<'_, Result<Box<dyn Conversation>>>;

    /// Resume a prior conversation by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the
    /// conversation cannot be resumed.
    fn resume_conversation<'a>(
        &'a self,
        conversation_id: &'a str,
        options: SessionOptions,
    ) -> BoxFuture<'a, Result<Box<dyn Conversation>>>;
}
