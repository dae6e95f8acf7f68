//! Crate-wide error type.
//!
//! One enum covers every error kind surfaced at the public edge. Internal
//! layers stay more granular through the variant payloads; the propagation
//! policy is:
//!
//! - caller input errors (`BadPath`, `BadConfig`, `UnknownMessageType` on
//!   send) surface synchronously;
//! - behavior failures are recovered through supervision and never reach
//!   the sender;
//! - I/O and protocol errors are recovered at the connection/pool layer
//!   through reconnect;
//! - delivery failure is never reported to the sender (at-most-once).

// Layer 1: Standard library
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
// (none)

/// Result alias used throughout the runtime.
pub type RtResult<T> = std::result::Result<T, RuntimeError>;

/// Errors produced by the runtime.
///
/// Clonable so one failure can complete several observers of the same
/// future; the `Io` payload sits behind an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// Malformed address, URI or actor path.
    #[error("bad path: {0}")]
    BadPath(String),

    /// Malformed or untypeable configuration value.
    #[error("bad config: {0}")]
    BadConfig(String),

    /// Message tag absent from the message registry.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Inbound frame exceeds the configured maximum.
    #[error("frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Stream ended in the middle of a frame.
    #[error("truncated frame at end of stream")]
    TruncatedFrame,

    /// Peer violated the wire protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// User lane of a mailbox was full; the message was dropped.
    #[error("mailbox overflow")]
    MailboxOverflow,

    /// An ask did not receive its reply in time.
    #[error("ask timed out after {0:?}")]
    AskTimeout(Duration),

    /// An ask failed for a reason other than a timeout.
    #[error("ask failed: {0}")]
    AskFailed(String),

    /// A behavior returned an error while processing a message.
    #[error("actor failure: {0}")]
    ActorFailure(String),

    /// The system is terminating; pending work is abandoned.
    #[error("system shutdown")]
    Shutdown,

    /// Underlying socket or file error.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl RuntimeError {
    /// Shorthand for an [`RuntimeError::ActorFailure`] with a formatted reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::ActorFailure(reason.into())
    }

    /// Errors that close the connection they occurred on.
    ///
    /// The pool reacts by scheduling a reconnect with backoff. Everything
    /// else is recoverable at the frame level (the offending frame is
    /// dropped, the connection survives).
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. }
                | Self::TruncatedFrame
                | Self::ProtocolViolation(_)
                | Self::Io(_)
        )
    }

    /// Errors caused by caller input rather than runtime state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::BadPath(_) | Self::BadConfig(_) | Self::UnknownMessageType(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_bad_path() {
        let err = RuntimeError::BadPath("empty system name".to_string());
        assert!(err.to_string().contains("bad path"));
        assert!(err.to_string().contains("empty system name"));
    }

    #[test]
    fn test_display_frame_too_large() {
        let err = RuntimeError::FrameTooLarge {
            size: 20_000_000,
            max: 16_777_216,
        };
        let msg = err.to_string();
        assert!(msg.contains("20000000"));
        assert!(msg.contains("16777216"));
    }

    #[test]
    fn test_connection_fatal_classification() {
        assert!(RuntimeError::TruncatedFrame.is_connection_fatal());
        assert!(RuntimeError::ProtocolViolation("junk".into()).is_connection_fatal());
        assert!(!RuntimeError::MailboxOverflow.is_connection_fatal());
        assert!(!RuntimeError::UnknownMessageType("x".into()).is_connection_fatal());
    }

    #[test]
    fn test_caller_error_classification() {
        assert!(RuntimeError::BadPath("x".into()).is_caller_error());
        assert!(RuntimeError::BadConfig("x".into()).is_caller_error());
        assert!(!RuntimeError::Shutdown.is_caller_error());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: RuntimeError = io.into();
        assert!(err.is_connection_fatal());
    }
}
