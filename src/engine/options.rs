//! Session options builder.
//!
//! Derives the opaque options bundle handed to the agent engine from a
//! validated [`RequestConfig`]: fixed settings profile, default model
//! fallback, credential injection into the engine-facing environment
//! view, working directory, and the initial composed prompt.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::RequestConfig;
use crate::engine::API_KEY_ENV;

/// Model used when the request configuration does not name one.
pub const DEFAULT_MODEL: &str = "default-model";

/// Fixed safety/settings profile applied to every conversation.
pub const SETTINGS_PROFILE: &str = "workspace-write";

/// Options bundle passed to the agent engine when establishing a
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Model identifier, defaulted to [`DEFAULT_MODEL`] when absent.
    pub model: String,
    /// Constant safety/settings profile; see [`SETTINGS_PROFILE`].
    pub settings_profile: &'static str,
    /// Working directory for the conversation.
    pub cwd: PathBuf,
    /// Engine-facing environment view; carries the credential under
    /// [`API_KEY_ENV`].
    pub env: HashMap<String, String>,
    /// Initial composed prompt: system prompt + blank line + user prompt
    /// when a system prompt is present, else the user prompt verbatim.
    /// Composed once per request/session, not per turn.
    pub initial_prompt: String,
}

impl SessionOptions {
    /// Build the options bundle from a validated configuration.
    #[must_use]
    pub fn build(config: &RequestConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());

        let mut env = HashMap::new();
        env.insert(API_KEY_ENV.to_owned(), config.api_key.clone());

        let initial_prompt = compose_prompt(config.system_prompt.as_deref(), &config.prompt);

        Self {
            model,
            settings_profile: SETTINGS_PROFILE,
            cwd: PathBuf::from(&config.cwd),
            env,
            initial_prompt,
        }
    }
}

/// Compose the initial prompt from an optional system prompt and the
/// user prompt, separated by a blank line.
fn compose_prompt(system_prompt: Option<&str>, prompt: &str) -> String {
    match system_prompt {
        Some(system) => format!("{system}\n\n{prompt}"),
        None => prompt.to_owned(),
    }
}
