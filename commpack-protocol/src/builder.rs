//! Frame builder.
//!
//! A builder moves through four states:
//!
//! ```text
//!  set_versions        init_frame          add_buffer          build_comm_pack
//! Uninitialized ----> Initialized ------> Accumulating ------> Finalized
//!                         ^                                        |
//!                         +------------------ init_frame ----------+
//! ```
//!
//! Calls made out of order fail with [`ProtocolError::InvalidState`]; a
//! partial frame is never handed out. Once finalized, the payload is frozen:
//! `add_buffer` fails until `init_frame` starts the next frame, while
//! repeated `build_comm_pack` calls return the same frame.

use crate::error::ProtocolError;
use crate::frame::{Frame, LengthField, Versions};
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Lifecycle state of a [`FrameBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderState {
    /// Versions may be set; no payload buffer exists yet.
    Uninitialized,
    /// Payload buffer is empty and ready for appends.
    Initialized,
    /// At least one byte has been appended.
    Accumulating,
    /// A frame has been produced from the current payload.
    Finalized,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderState::Uninitialized => write!(f, "uninitialized"),
            BuilderState::Initialized => write!(f, "initialized"),
            BuilderState::Accumulating => write!(f, "accumulating"),
            BuilderState::Finalized => write!(f, "finalized"),
        }
    }
}

/// Accumulates a payload and finalizes it into a versioned, checksummed
/// [`Frame`].
///
/// The builder is a plain owned accumulator; share the finished `Frame`,
/// not the builder.
#[derive(Debug)]
pub struct FrameBuilder {
    state: BuilderState,
    versions: Option<Versions>,
    length_field: LengthField,
    payload: BytesMut,
    finalized: Option<Frame>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::with_length_field(LengthField::default())
    }

    pub fn with_length_field(length_field: LengthField) -> Self {
        Self {
            state: BuilderState::Uninitialized,
            versions: None,
            length_field,
            payload: BytesMut::new(),
            finalized: None,
        }
    }

    /// Sets the protocol and payload schema versions.
    ///
    /// Only allowed before the first `init_frame`.
    pub fn set_versions(&mut self, main_version: u8, data_version: u8) -> Result<(), ProtocolError> {
        if self.state != BuilderState::Uninitialized {
            return Err(self.invalid("set versions"));
        }
        self.versions = Some(Versions::new(main_version, data_version));
        Ok(())
    }

    /// Starts a new frame with an empty payload.
    ///
    /// Requires versions to be set. Any payload accumulated so far is
    /// discarded.
    pub fn init_frame(&mut self) -> Result<(), ProtocolError> {
        if self.versions.is_none() {
            return Err(self.invalid("init frame without versions"));
        }
        self.payload.clear();
        self.finalized = None;
        self.state = BuilderState::Initialized;
        Ok(())
    }

    /// Appends one payload byte.
    pub fn add_buffer(&mut self, byte: u8) -> Result<(), ProtocolError> {
        self.extend_buffer(&[byte])
    }

    /// Appends several payload bytes. Either all bytes are appended or none.
    pub fn extend_buffer(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        match self.state {
            BuilderState::Initialized | BuilderState::Accumulating => {}
            BuilderState::Uninitialized | BuilderState::Finalized => {
                return Err(self.invalid("add to buffer"));
            }
        }

        self.length_field.check(self.payload.len() + bytes.len())?;
        self.payload.extend_from_slice(bytes);
        self.state = BuilderState::Accumulating;
        Ok(())
    }

    /// Finalizes the current payload into a frame.
    ///
    /// Calling this again without starting a new frame returns an identical
    /// frame.
    pub fn build_comm_pack(&mut self) -> Result<Frame, ProtocolError> {
        match self.state {
            BuilderState::Uninitialized => return Err(self.invalid("build frame")),
            BuilderState::Finalized => {
                if let Some(frame) = &self.finalized {
                    return Ok(frame.clone());
                }
            }
            BuilderState::Initialized | BuilderState::Accumulating => {}
        }

        let versions = self
            .versions
            .ok_or_else(|| self.invalid("build frame without versions"))?;
        let payload = Bytes::copy_from_slice(&self.payload);
        let frame = Frame::new(versions, self.length_field, payload)?;

        tracing::trace!(
            versions = %versions,
            length = frame.length(),
            crc = frame.crc(),
            "Finalized frame"
        );

        self.finalized = Some(frame.clone());
        self.state = BuilderState::Finalized;
        Ok(frame)
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn versions(&self) -> Option<Versions> {
        self.versions
    }

    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    /// Payload accumulated for the current frame.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn invalid(&self, op: &'static str) -> ProtocolError {
        ProtocolError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
