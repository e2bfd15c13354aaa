//! Link error types.

use std::time::Duration;
use thiserror::Error;

/// Link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] commpack_protocol::ProtocolError),

    #[error("link closed")]
    Closed,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl LinkError {
    /// Returns whether the next `recv` may still succeed on the same link.
    ///
    /// A frame that failed validation has already been dropped from the
    /// receive buffer, so reading can continue with the next one.
    pub fn is_recoverable(&self) -> bool {
        match self {
            LinkError::Protocol(e) => e.is_transmission_error(),
            LinkError::Timeout(_) => true,
            LinkError::Io(_) | LinkError::Closed => false,
        }
    }
}
