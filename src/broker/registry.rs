//! Session registry.
//!
//! Maps session identifiers to open stream-session handles. The registry
//! is owned exclusively by the broker loop — insertion and removal are
//! the only mutations, both performed while dispatching a control
//! message, so no locking is needed.

use std::collections::HashMap;

use crate::broker::session::SessionHandle;

/// Mapping from session identifier to open stream session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session with the given identifier is open.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Register an open session.
    ///
    /// The broker checks [`SessionRegistry::contains`] before opening a
    /// session, so an identifier is never silently replaced.
    pub fn insert(&mut self, session_id: String, handle: SessionHandle) {
        self.sessions.insert(session_id, handle);
    }

    /// Look up an open session's handle.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<&SessionHandle> {
        self.sessions.get(session_id)
    }

    /// Remove a session, returning its handle if it was open.
    pub fn remove(&mut self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(session_id)
    }

    /// Remove and return all open sessions (shutdown drain).
    pub fn drain(&mut self) -> Vec<(String, SessionHandle)> {
        self.sessions.drain().collect()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
