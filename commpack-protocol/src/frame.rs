//! Binary frame format.
//!
//! Frame layout (2 bytes versions + 1 or 2 bytes length + payload + 1 byte CRC):
//!
//! ```text
//! +--------------+--------------+-------------+-----------------+--------+
//! | main_version | data_version | length      | payload         | crc8   |
//! | 1 byte       | 1 byte       | 1 or 2 bytes| length bytes    | 1 byte |
//! +--------------+--------------+-------------+-----------------+--------+
//! ```
//!
//! `length` counts payload bytes only and is big-endian when two bytes wide.
//! `crc8` covers the payload bytes only.

use crate::crc8::crc8;
use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of the version prefix (main + data).
pub const VERSION_HEADER_SIZE: usize = 2;

/// Size of the CRC trailer.
pub const CRC_SIZE: usize = 1;

/// Protocol and payload schema versions stamped on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Versions {
    /// Protocol major version.
    pub main: u8,
    /// Payload schema version.
    pub data: u8,
}

impl Versions {
    pub const fn new(main: u8, data: u8) -> Self {
        Self { main, data }
    }
}

impl Default for Versions {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAIN_VERSION, crate::DEFAULT_DATA_VERSION)
    }
}

impl fmt::Display for Versions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}/{:#04x}", self.main, self.data)
    }
}

/// Width of the wire length field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthField {
    /// One byte; payloads up to 255 bytes.
    U8,
    /// Two bytes, big-endian; payloads up to 65535 bytes.
    #[default]
    U16,
}

impl LengthField {
    /// Number of bytes the length occupies on the wire.
    pub const fn size(self) -> usize {
        match self {
            LengthField::U8 => 1,
            LengthField::U16 => 2,
        }
    }

    /// Largest payload this width can describe.
    pub const fn max_payload(self) -> usize {
        match self {
            LengthField::U8 => u8::MAX as usize,
            LengthField::U16 => u16::MAX as usize,
        }
    }

    /// Size of everything before the payload.
    pub const fn header_size(self) -> usize {
        VERSION_HEADER_SIZE + self.size()
    }

    /// Smallest possible frame (empty payload).
    pub const fn min_frame_size(self) -> usize {
        self.header_size() + CRC_SIZE
    }

    pub(crate) fn check(self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_payload() {
            return Err(ProtocolError::PayloadTooLarge {
                size,
                max: self.max_payload(),
            });
        }
        Ok(())
    }

    fn put(self, buf: &mut BytesMut, size: usize) -> Result<(), ProtocolError> {
        let too_large = |_| ProtocolError::PayloadTooLarge {
            size,
            max: self.max_payload(),
        };
        match self {
            LengthField::U8 => buf.put_u8(u8::try_from(size).map_err(too_large)?),
            LengthField::U16 => buf.put_u16(u16::try_from(size).map_err(too_large)?),
        }
        Ok(())
    }

    /// Reads the length field; `bytes` must hold at least `size()` bytes.
    fn read(self, bytes: &[u8]) -> usize {
        match self {
            LengthField::U8 => bytes[0] as usize,
            LengthField::U16 => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
        }
    }
}

impl fmt::Display for LengthField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthField::U8 => write!(f, "u8"),
            LengthField::U16 => write!(f, "u16"),
        }
    }
}

impl FromStr for LengthField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u8" | "1" => Ok(LengthField::U8),
            "u16" | "2" => Ok(LengthField::U16),
            other => Err(format!("invalid length field '{}': expected u8 or u16", other)),
        }
    }
}

/// A finalized frame.
///
/// Frames are immutable: the CRC and the serialized bytes always describe
/// the payload they were built from. Cloning is cheap and frames can be
/// shared across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    versions: Versions,
    length_field: LengthField,
    payload: Bytes,
    crc: u8,
    frame_bytes: Bytes,
}

impl Frame {
    /// Builds a frame from a complete payload.
    pub fn new(
        versions: Versions,
        length_field: LengthField,
        payload: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        length_field.check(payload.len())?;

        let crc = crc8(&payload);
        let mut buf = BytesMut::with_capacity(length_field.min_frame_size() + payload.len());

        // Versions (2 bytes)
        buf.put_u8(versions.main);
        buf.put_u8(versions.data);

        // Payload length (1 or 2 bytes)
        length_field.put(&mut buf, payload.len())?;

        // Payload
        buf.put_slice(&payload);

        // CRC8 of payload (1 byte)
        buf.put_u8(crc);

        Ok(Self {
            versions,
            length_field,
            payload,
            crc,
            frame_bytes: buf.freeze(),
        })
    }

    pub fn versions(&self) -> Versions {
        self.versions
    }

    pub fn main_version(&self) -> u8 {
        self.versions.main
    }

    pub fn data_version(&self) -> u8 {
        self.versions.data
    }

    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload byte count, as written in the length field.
    pub fn length(&self) -> usize {
        self.payload.len()
    }

    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// The serialized wire representation.
    pub fn frame_bytes(&self) -> &Bytes {
        &self.frame_bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.frame_bytes
    }

    /// Parses exactly one frame from `bytes`.
    ///
    /// Fails if the input is shorter than the frame it describes, has bytes
    /// left over, or carries a bad CRC.
    pub fn parse(bytes: &[u8], length_field: LengthField) -> Result<Self, ProtocolError> {
        let total = match encoded_len(bytes, length_field) {
            Some(total) => total,
            None => {
                return Err(ProtocolError::Incomplete {
                    needed: length_field.min_frame_size() - bytes.len(),
                })
            }
        };

        if bytes.len() < total {
            return Err(ProtocolError::Incomplete {
                needed: total - bytes.len(),
            });
        }
        if bytes.len() > total {
            return Err(ProtocolError::TrailingBytes(bytes.len() - total));
        }

        Self::from_wire(Bytes::copy_from_slice(bytes), length_field)
    }

    /// Decodes a frame from the front of a receive buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on a bad frame. The bytes
    /// of a bad frame are consumed so decoding can continue after it.
    pub fn decode(
        buf: &mut BytesMut,
        length_field: LengthField,
    ) -> Result<Option<Self>, ProtocolError> {
        let total = match encoded_len(buf, length_field) {
            Some(total) if buf.len() >= total => total,
            _ => return Ok(None),
        };

        let wire = buf.split_to(total).freeze();
        Self::from_wire(wire, length_field).map(Some)
    }

    /// Builds a frame from bytes holding exactly one encoded frame.
    fn from_wire(wire: Bytes, length_field: LengthField) -> Result<Self, ProtocolError> {
        let versions = Versions::new(wire[0], wire[1]);
        let payload = wire.slice(length_field.header_size()..wire.len() - CRC_SIZE);
        let expected = wire[wire.len() - 1];

        let actual = crc8(&payload);
        if actual != expected {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            versions,
            length_field,
            payload,
            crc: expected,
            frame_bytes: wire,
        })
    }
}

/// Payload length declared by the header at the start of `bytes`, once the
/// header is available.
pub(crate) fn declared_payload_len(bytes: &[u8], length_field: LengthField) -> Option<usize> {
    let header = length_field.header_size();
    if bytes.len() < header {
        return None;
    }
    Some(length_field.read(&bytes[VERSION_HEADER_SIZE..header]))
}

/// Total encoded size of the frame at the start of `bytes`.
fn encoded_len(bytes: &[u8], length_field: LengthField) -> Option<usize> {
    declared_payload_len(bytes, length_field)
        .map(|payload_len| length_field.header_size() + payload_len + CRC_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc8::crc8_from_bytes;
    use crate::fixtures;
    use proptest::prelude::*;

    #[test]
    fn test_golden_frame_u16() {
        let frame = Frame::new(fixtures::versions(), LengthField::U16, fixtures::payload_1()).unwrap();
        assert_eq!(frame.frame_bytes().as_ref(), fixtures::golden_frame_1());
        assert_eq!(frame.length(), 2);
        assert_eq!(frame.crc(), 0x0B);
    }

    #[test]
    fn test_golden_frame_u8() {
        let frame = Frame::new(fixtures::versions(), LengthField::U8, fixtures::payload_1()).unwrap();
        assert_eq!(frame.frame_bytes().as_ref(), fixtures::golden_frame_1_u8());
    }

    #[test]
    fn test_trailer_matches_payload_crc() {
        let payload = fixtures::payload_1();
        let frame = Frame::new(fixtures::versions(), LengthField::U16, payload.clone()).unwrap();
        let recomputed = crc8_from_bytes(&payload, 0, payload.len()).unwrap();
        assert_eq!(frame.frame_bytes().last(), Some(&recomputed));
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new(Versions::new(1, 2), LengthField::U16, Vec::new()).unwrap();
        assert_eq!(frame.frame_bytes().as_ref(), &[0x01, 0x02, 0x00, 0x00, 0x00]);

        let parsed = Frame::parse(frame.frame_bytes(), LengthField::U16).unwrap();
        assert!(parsed.payload().is_empty());
    }

    #[test]
    fn test_payload_too_large() {
        let result = Frame::new(Versions::default(), LengthField::U8, vec![0u8; 256]);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLarge { size: 256, max: 255 })
        ));

        // Exactly at the limit is fine
        let frame = Frame::new(Versions::default(), LengthField::U8, vec![0u8; 255]).unwrap();
        assert_eq!(frame.frame_bytes()[2], 0xFF);
    }

    #[test]
    fn test_payload_too_large_u16() {
        let frame = Frame::new(Versions::default(), LengthField::U16, vec![0u8; 65535]).unwrap();
        assert_eq!(&frame.frame_bytes()[2..4], &[0xFF, 0xFF]);
        assert_eq!(frame.frame_bytes().len(), 65535 + LengthField::U16.min_frame_size());

        let result = Frame::new(Versions::default(), LengthField::U16, vec![0u8; 65536]);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLarge {
                size: 65536,
                max: 65535
            })
        ));
    }

    #[test]
    fn test_declared_payload_len() {
        let wire = fixtures::golden_frame_1();
        assert_eq!(declared_payload_len(&wire[..3], LengthField::U16), None);
        assert_eq!(declared_payload_len(wire, LengthField::U16), Some(2));
        assert_eq!(declared_payload_len(&[0x10, 0x10, 0x01, 0x02], LengthField::U16), Some(0x0102));
    }

    #[test]
    fn test_parse_golden() {
        let frame = Frame::parse(fixtures::golden_frame_1(), LengthField::U16).unwrap();
        assert_eq!(frame.versions(), fixtures::versions());
        assert_eq!(frame.payload().as_ref(), fixtures::payload_1().as_slice());
        assert_eq!(frame.crc(), 0x0B);
        assert_eq!(frame.crc(), crc8(frame.payload()));
    }

    #[test]
    fn test_parse_checksum_mismatch() {
        let mut wire = fixtures::golden_frame_1().to_vec();
        wire[4] ^= 0xFF;

        let result = Frame::parse(&wire, LengthField::U16);
        assert!(matches!(
            result,
            Err(ProtocolError::ChecksumMismatch { expected: 0x0B, .. })
        ));
    }

    #[test]
    fn test_parse_truncated() {
        let wire = fixtures::golden_frame_1();

        let result = Frame::parse(&wire[..5], LengthField::U16);
        assert!(matches!(result, Err(ProtocolError::Incomplete { needed: 2 })));

        let result = Frame::parse(&wire[..1], LengthField::U16);
        assert!(matches!(result, Err(ProtocolError::Incomplete { needed: 4 })));
    }

    #[test]
    fn test_parse_trailing_bytes() {
        let mut wire = fixtures::golden_frame_1().to_vec();
        wire.push(0x00);
        let result = Frame::parse(&wire, LengthField::U16);
        assert!(matches!(result, Err(ProtocolError::TrailingBytes(1))));
    }

    #[test]
    fn test_decode_incomplete_then_complete() {
        let wire = fixtures::golden_frame_1();
        let mut buf = BytesMut::from(&wire[..3]);
        assert!(Frame::decode(&mut buf, LengthField::U16).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&wire[3..]);
        let frame = Frame::decode(&mut buf, LengthField::U16).unwrap().unwrap();
        assert_eq!(frame.payload().as_ref(), &[0x03, 0x01]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_skips_corrupt_frame() {
        let good = Frame::new(Versions::default(), LengthField::U8, vec![0xAA, 0xBB]).unwrap();
        let mut corrupt = good.frame_bytes().to_vec();
        corrupt[3] ^= 0x01;

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&corrupt);
        buf.extend_from_slice(good.frame_bytes());

        let result = Frame::decode(&mut buf, LengthField::U8);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));

        let frame = Frame::decode(&mut buf, LengthField::U8).unwrap().unwrap();
        assert_eq!(frame, good);
    }

    #[test]
    fn test_length_field_from_str() {
        assert_eq!("u8".parse::<LengthField>().unwrap(), LengthField::U8);
        assert_eq!("U16".parse::<LengthField>().unwrap(), LengthField::U16);
        assert!("u32".parse::<LengthField>().is_err());
    }

    #[test]
    fn test_versions_display() {
        assert_eq!(Versions::new(0x10, 0x01).to_string(), "0x10/0x01");
    }

    #[test]
    fn test_frame_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Frame>();
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_new(
            main in any::<u8>(),
            data in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..300),
        ) {
            let frame = Frame::new(Versions::new(main, data), LengthField::U16, payload.clone()).unwrap();
            let parsed = Frame::parse(frame.frame_bytes(), LengthField::U16).unwrap();
            prop_assert_eq!(parsed.payload().as_ref(), payload.as_slice());
            prop_assert_eq!(parsed.versions(), Versions::new(main, data));
        }
    }
}
