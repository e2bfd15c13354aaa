//! CRC-8 checksum used for the frame trailer.
//!
//! The algorithm is CRC-8/MAXIM (Dallas 1-Wire):
//!
//! ```text
//! width=8  poly=0x31 (reflected 0x8C)  init=0x00  refin=true  refout=true  xorout=0x00
//! check("123456789") = 0xA1
//! ```
//!
//! Both the byte-at-a-time form and the bulk form run on the `crc` crate's
//! catalogued `CRC_8_MAXIM_DOW` and produce identical results for every input.

use crate::error::ProtocolError;
use crc::{Crc, Digest, CRC_8_MAXIM_DOW};
use std::fmt;

/// Initial accumulator value; also the CRC of an empty input.
pub const CRC8_INIT: u8 = 0x00;

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Starts a digest that continues from a previously finalized CRC.
fn resume(running_crc: u8) -> Digest<'static, u8> {
    // The crate reflects custom initial values; a finalized value is already
    // in reflected form.
    CRC8.digest_with_initial(running_crc.reverse_bits())
}

/// Folds one byte into a running CRC.
///
/// Start with [`CRC8_INIT`] and feed the result back in for each following
/// byte.
#[inline]
pub fn crc8_from_byte(byte: u8, running_crc: u8) -> u8 {
    let mut digest = resume(running_crc);
    digest.update(&[byte]);
    digest.finalize()
}

/// Computes the CRC of `length` bytes of `buffer` starting at `start_offset`.
///
/// Returns [`ProtocolError::OutOfRange`] if the range does not lie within the
/// buffer.
pub fn crc8_from_bytes(
    buffer: &[u8],
    start_offset: usize,
    length: usize,
) -> Result<u8, ProtocolError> {
    let range = start_offset
        .checked_add(length)
        .filter(|&end| end <= buffer.len())
        .map(|end| &buffer[start_offset..end])
        .ok_or(ProtocolError::OutOfRange {
            offset: start_offset,
            length,
            len: buffer.len(),
        })?;

    Ok(crc8(range))
}

/// Computes the CRC of a whole slice.
pub fn crc8(buffer: &[u8]) -> u8 {
    CRC8.checksum(buffer)
}

/// Running CRC accumulator for data that arrives in pieces.
#[derive(Clone)]
pub struct Crc8 {
    digest: Digest<'static, u8>,
}

impl Crc8 {
    pub fn new() -> Self {
        Self {
            digest: CRC8.digest(),
        }
    }

    pub fn update_byte(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn value(&self) -> u8 {
        self.digest.clone().finalize()
    }

    pub fn reset(&mut self) {
        self.digest = CRC8.digest();
    }
}

impl Default for Crc8 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Crc8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc8")
            .field("value", &format_args!("{:#04x}", self.value()))
            .finish()
    }
}
