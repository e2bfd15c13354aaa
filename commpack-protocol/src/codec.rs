//! Encoder and streaming decoder for frames.

use crate::error::ProtocolError;
use crate::frame::{declared_payload_len, Frame, LengthField, Versions};
use bytes::{Buf, Bytes, BytesMut};

/// Builds frames in one call, without the builder state machine.
pub struct Encoder;

impl Encoder {
    /// Encodes a payload into wire bytes.
    pub fn encode(
        versions: Versions,
        length_field: LengthField,
        payload: &[u8],
    ) -> Result<Bytes, ProtocolError> {
        let frame = Frame::new(versions, length_field, Bytes::copy_from_slice(payload))?;
        Ok(frame.into_bytes())
    }
}

/// Reassembles frames from a byte stream that arrives in arbitrary chunks.
pub struct Decoder {
    buffer: BytesMut,
    length_field: LengthField,
    max_payload: usize,
    expected_versions: Option<Versions>,
}

impl Decoder {
    pub fn new(length_field: LengthField) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            length_field,
            max_payload: length_field.max_payload(),
            expected_versions: None,
        }
    }

    /// Treats headers declaring more than `max` payload bytes as corrupt.
    ///
    /// Without a limit a damaged length field makes the decoder buffer every
    /// following byte as payload.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max.min(self.length_field.max_payload());
        self
    }

    /// Rejects frames whose versions differ from `versions`.
    pub fn with_expected_versions(mut self, versions: Versions) -> Self {
        self.expected_versions = Some(versions);
        self
    }

    /// Appends received data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    ///
    /// A frame that fails validation is dropped from the buffer before the
    /// error is returned, so the caller may keep decoding.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if let Some(e) = self.resync() {
            tracing::warn!(error = %e, buffered = self.buffer.len(), "Skipped corrupt frame header");
            return Err(e);
        }

        let frame = match Frame::decode(&mut self.buffer, self.length_field) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, buffered = self.buffer.len(), "Dropped invalid frame");
                return Err(e);
            }
        };

        if let Some(expected) = self.expected_versions {
            if frame.versions() != expected {
                return Err(ProtocolError::UnsupportedVersion {
                    main: frame.main_version(),
                    data: frame.data_version(),
                });
            }
        }

        Ok(Some(frame))
    }

    /// Drops bytes from the front of the buffer while the header there declares
    /// an oversized payload.
    fn resync(&mut self) -> Option<ProtocolError> {
        let mut error = None;
        while let Some(size) = declared_payload_len(&self.buffer, self.length_field) {
            if size <= self.max_payload {
                break;
            }
            error.get_or_insert(ProtocolError::FrameTooLarge {
                size,
                max: self.max_payload,
            });
            self.buffer.advance(1);
        }
        error
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(LengthField::default())
    }
}
