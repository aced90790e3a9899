//! Per-request configuration parsing and validation.
//!
//! A [`RequestConfig`] arrives embedded in `agent_request` and
//! `stream_start` control messages. Structural completeness (the required
//! keys being present) is enforced by serde during decoding; value-level
//! validation happens in [`RequestConfig::validate`] before any
//! agent-engine call is made.

use serde::Deserialize;

use crate::{AppError, Result};

/// Configuration payload for one agent request or stream session.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// User prompt text.
    pub prompt: String,
    /// Credential handed to the agent engine. Travels in-band; it never
    /// reaches the process environment at the protocol boundary.
    pub api_key: String,
    /// Working directory for the conversation.
    pub cwd: String,
    /// Optional model identifier; a fixed default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Optional system prompt, prepended to the user prompt once per
    /// request/session.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Optional prior conversation identifier to resume (stream sessions
    /// only).
    #[serde(default)]
    pub resume_session_id: Option<String>,
}

impl RequestConfig {
    /// Validate field values in fixed order: prompt, credential, working
    /// directory. The first missing/invalid field wins.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::Config("prompt must not be empty".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config("apiKey must not be empty".into()));
        }
        if self.cwd.trim().is_empty() {
            return Err(AppError::Config("cwd must not be empty".into()));
        }
        Ok(())
    }
}
