#![forbid(unsafe_code)]

//! `agent-sidecar` — NDJSON stdio broker for agent conversations.
//!
//! Reads newline-delimited JSON control messages from stdin, multiplexes
//! one-shot agent requests and multi-turn stream sessions against an
//! [`engine::Engine`], and writes protocol events to stdout. Diagnostics
//! go to stderr.

pub mod broker;
pub mod config;
pub mod engine;
pub mod errors;
pub mod protocol;

pub use errors::{AppError, Result};
