//! Control-protocol wire handling.
//!
//! The sidecar speaks newline-delimited JSON over stdin/stdout. Each line
//! is one complete control message.
//!
//! Submodules:
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing
//!   with a maximum line length.
//! - `message`: the closed sets of inbound and outbound message types,
//!   plus tolerant line parsing.

pub mod codec;
pub mod message;

pub use codec::{LineCodec, MAX_LINE_BYTES};
pub use message::{parse_line, Inbound, Outbound};
