//! # commpack-protocol
//!
//! Wire protocol implementation for commpack, a framed point-to-point serial
//! protocol.
//!
//! This crate provides:
//! - CRC-8 (Dallas/Maxim) checksums, incremental and bulk
//! - A state-machine frame builder (`init_frame` / `add_buffer` / `build_comm_pack`)
//! - Strict and streaming frame decoding with checksum validation
//! - Error types shared by the link and CLI layers

pub mod builder;
pub mod codec;
pub mod crc8;
pub mod error;
pub mod frame;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::{BuilderState, FrameBuilder};
pub use codec::{Decoder, Encoder};
pub use crc8::{crc8, crc8_from_byte, crc8_from_bytes, Crc8, CRC8_INIT};
pub use error::ProtocolError;
pub use frame::{Frame, LengthField, Versions, CRC_SIZE, VERSION_HEADER_SIZE};

/// Protocol major version observed on deployed links.
pub const DEFAULT_MAIN_VERSION: u8 = 0x10;

/// Payload schema version observed on deployed links.
pub const DEFAULT_DATA_VERSION: u8 = 0x10;
