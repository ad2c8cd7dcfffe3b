//! Error taxonomy for the relay.
//!
//! Only `Transport` ever affects registry state. Everything else is logged
//! where it happens and swallowed; the protocol has no error frame.

use std::str::Utf8Error;

use crate::registry::ConnectionId;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("frame is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    Validation(&'static str),

    #[error("unsupported message type: {0}")]
    Unsupported(String),

    #[error("delivery to {id} failed: {reason}")]
    Delivery { id: ConnectionId, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Recoverable errors discard one frame and leave the connection open.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RelayError::Transport(_) | RelayError::Config(_))
    }
}
