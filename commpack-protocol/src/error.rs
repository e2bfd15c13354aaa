//! Protocol error types.

use crate::builder::BuilderState;
use thiserror::Error;

/// Protocol-level errors that can occur while building, checksumming or
/// decoding frames.
///
/// A frame produced or received alongside any of these errors must not be
/// transmitted or acted upon.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid state: cannot {op} while builder is {state}")]
    InvalidState {
        op: &'static str,
        state: BuilderState,
    },

    #[error("range out of bounds: offset {offset} + length {length} exceeds buffer of {len} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("frame header declares {size} payload bytes (limit {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("incomplete frame: need {needed} more bytes")]
    Incomplete { needed: usize },

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("unsupported version: main {main:#04x}, data {data:#04x}")]
    UnsupportedVersion { main: u8, data: u8 },
}

impl ProtocolError {
    /// Returns whether the error indicates corrupted or truncated data on the
    /// wire, as opposed to a caller bug.
    pub fn is_transmission_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::FrameTooLarge { .. }
                | ProtocolError::Incomplete { .. }
                | ProtocolError::TrailingBytes(_)
                | ProtocolError::UnsupportedVersion { .. }
        )
    }
}
