//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Request configuration failed validation.
    Config(String),
    /// Control-protocol framing or encoding failure.
    Protocol(String),
    /// Agent-engine failure while creating, sending, or streaming.
    Engine(String),
    /// Requested entity (session, request) does not exist.
    NotFound(String),
    /// Protocol-state conflict, e.g. a duplicate session identifier.
    Conflict(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// The request's cancellation token was signaled.
    ///
    /// Displays as the exact text `Request aborted` — callers distinguish
    /// cancellation from engine failure only by this message text.
    Aborted,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Engine(msg) => write!(f, "engine: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Aborted => write!(f, "Request aborted"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
