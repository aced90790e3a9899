//! Unit tests for the NDJSON control-stream codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use agent_sidecar::protocol::{LineCodec, MAX_LINE_BYTES};
use agent_sidecar::AppError;

// ── Decoding ─────────────────────────────────────────────────────────────────

/// A complete JSON object on a single newline-terminated line is decoded
/// without error and returned as the line content (without the `\n`).
#[test]
fn single_line_decodes() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"type\":\"ping\"}\n");

    let result = codec
        .decode(&mut buf)
        .expect("decode must succeed for a valid NDJSON line");

    assert_eq!(
        result,
        Some("{\"type\":\"ping\"}".to_owned()),
        "codec must return the line content without the trailing newline"
    );
}

/// Two messages delivered in a single buffer are decoded as two separate
/// items by successive `decode` calls.
#[test]
fn batched_lines_decode_separately() {
    let mut codec = LineCodec::new();
    let raw = concat!("{\"type\":\"ping\"}\n", "{\"type\":\"shutdown\"}\n");
    let mut buf = BytesMut::from(raw);

    let first = codec.decode(&mut buf).expect("first decode must succeed");
    assert_eq!(first.as_deref(), Some("{\"type\":\"ping\"}"));

    let second = codec.decode(&mut buf).expect("second decode must succeed");
    assert_eq!(second.as_deref(), Some("{\"type\":\"shutdown\"}"));

    let third = codec.decode(&mut buf).expect("empty buffer must not error");
    assert!(third.is_none(), "no further lines must be present");
}

/// A line that arrives without its terminating `\n` is buffered; once the
/// newline arrives the complete line is yielded.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = LineCodec::new();

    let mut buf = BytesMut::from("{\"type\":\"pi");
    let result = codec.decode(&mut buf).expect("partial decode must not error");
    assert!(
        result.is_none(),
        "partial line must not be emitted before the newline arrives"
    );

    buf.extend_from_slice(b"ng\"}\n");
    let result = codec.decode(&mut buf).expect("decode must succeed after newline");
    assert_eq!(result.as_deref(), Some("{\"type\":\"ping\"}"));
}

/// A line exceeding `MAX_LINE_BYTES` yields `AppError::Protocol`
/// containing `"line too long"` instead of allocating unbounded memory.
#[test]
fn oversized_line_is_rejected() {
    let mut codec = LineCodec::new();

    let big_line = "a".repeat(MAX_LINE_BYTES + 1) + "\n";
    let mut buf = BytesMut::from(big_line.as_str());

    match codec.decode(&mut buf) {
        Err(AppError::Protocol(msg)) => assert!(
            msg.contains("line too long"),
            "error must mention 'line too long', got: {msg}"
        ),
        other => panic!("expected Err(AppError::Protocol), got: {other:?}"),
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Encoding appends the `\n` delimiter and nothing else.
#[test]
fn encoding_appends_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();

    codec
        .encode("{\"type\":\"pong\"}".to_owned(), &mut buf)
        .expect("encode must succeed");

    assert_eq!(&buf[..], b"{\"type\":\"pong\"}\n");
}
