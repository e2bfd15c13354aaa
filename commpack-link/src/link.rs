//! Frame link over an async byte stream.

use crate::error::LinkError;
use commpack_protocol::{Decoder, Frame, LengthField, Versions};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default read buffer size. Frames on serial links are small.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 256;

/// Minimum read buffer size.
pub const MIN_READ_BUFFER_SIZE: usize = 16;

/// Maximum read buffer size (64 KiB).
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long `recv` waits for a complete frame.
    pub read_timeout: Duration,
    /// How long `send` waits for the frame to be written and flushed.
    pub write_timeout: Duration,
    /// Read buffer size for stream reads.
    pub read_buffer_size: usize,
    /// Length field width used by both ends.
    pub length_field: LengthField,
    /// Reject received frames with other versions (optional).
    pub expected_versions: Option<Versions>,
    /// Largest payload a received header may declare (optional; defaults to
    /// the length field's capacity).
    pub max_payload: Option<usize>,
}

impl LinkConfig {
    pub fn new(length_field: LengthField) -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            length_field,
            expected_versions: None,
            max_payload: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_expected_versions(mut self, versions: Versions) -> Self {
        self.expected_versions = Some(versions);
        self
    }

    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = Some(max);
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(LengthField::default())
    }
}

/// Sends and receives frames over a stream.
///
/// Timeouts apply per call; bytes already received when a `recv` times out
/// stay buffered for the next call.
pub struct FrameLink<S> {
    stream: S,
    decoder: Decoder,
    read_buf: Vec<u8>,
    config: LinkConfig,
}

impl<S> FrameLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: LinkConfig) -> Self {
        let mut decoder = Decoder::new(config.length_field);
        if let Some(versions) = config.expected_versions {
            decoder = decoder.with_expected_versions(versions);
        }
        if let Some(max) = config.max_payload {
            decoder = decoder.with_max_payload(max);
        }
        Self {
            stream,
            decoder,
            read_buf: vec![0u8; config.read_buffer_size],
            config,
        }
    }

    /// Writes a frame and flushes the stream.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let timeout = self.config.write_timeout;
        tokio::time::timeout(timeout, self.write_frame(frame))
            .await
            .map_err(|_| LinkError::Timeout(timeout))?
    }

    /// Waits for the next complete frame.
    ///
    /// A frame with a bad checksum or unexpected versions is returned as an
    /// error; the link stays usable afterwards.
    pub async fn recv(&mut self) -> Result<Frame, LinkError> {
        let timeout = self.config.read_timeout;
        tokio::time::timeout(timeout, self.read_frame())
            .await
            .map_err(|_| LinkError::Timeout(timeout))?
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let bytes = frame.frame_bytes();
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;

        tracing::debug!(
            length = frame.length(),
            crc = frame.crc(),
            "Sent frame ({} bytes)",
            bytes.len()
        );
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, LinkError> {
        loop {
            if let Some(frame) = self.decoder.decode_frame()? {
                tracing::debug!(
                    versions = %frame.versions(),
                    length = frame.length(),
                    "Received frame"
                );
                return Ok(frame);
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                tracing::debug!(
                    buffered = self.decoder.buffered(),
                    "Link closed while waiting for frame"
                );
                return Err(LinkError::Closed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    /// Sends a frame and waits for one reply frame.
    pub async fn exchange(&mut self, frame: &Frame) -> Result<Frame, LinkError> {
        self.send(frame).await?;
        self.recv().await
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
