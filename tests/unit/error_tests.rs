//! Unit tests for the application error type.

use agent_sidecar::AppError;

/// Each variant's Display is prefixed with its domain.
#[test]
fn display_prefixes_domain() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Protocol("bad".into()).to_string(), "protocol: bad");
    assert_eq!(AppError::Engine("bad".into()).to_string(), "engine: bad");
    assert_eq!(AppError::NotFound("bad".into()).to_string(), "not found: bad");
    assert_eq!(AppError::Conflict("bad".into()).to_string(), "conflict: bad");
    assert_eq!(AppError::Io("bad".into()).to_string(), "io: bad");
}

/// Cancellation displays as the exact text `Request aborted` — the wire
/// contract callers rely on to distinguish it from engine failures.
#[test]
fn aborted_displays_exact_wire_text() {
    assert_eq!(AppError::Aborted.to_string(), "Request aborted");
}

/// I/O errors convert into the `Io` variant.
#[test]
fn io_error_converts() {
    let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
    let err: AppError = io_err.into();
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().contains("pipe gone"));
}
