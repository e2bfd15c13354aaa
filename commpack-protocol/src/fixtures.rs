//! Golden vectors for protocol version 0x10.

use crate::frame::Versions;

pub fn versions() -> Versions {
    Versions::new(0x10, 0x10)
}

pub fn payload_1() -> Vec<u8> {
    vec![0x03, 0x01]
}

/// `payload_1` framed with a two-byte length.
pub fn golden_frame_1() -> &'static [u8] {
    &[0x10, 0x10, 0x00, 0x02, 0x03, 0x01, 0x0B]
}

/// `payload_1` framed with a one-byte length.
pub fn golden_frame_1_u8() -> &'static [u8] {
    &[0x10, 0x10, 0x02, 0x03, 0x01, 0x0B]
}
