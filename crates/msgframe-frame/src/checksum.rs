//! CRC-8 used to guard frame payloads.
//!
//! The variant is CRC-8/SMBUS: polynomial 0x07, initial value 0x00, no bit
//! reflection, no final XOR. It is a protocol constant; both peers must agree.

use crc::{Crc, CRC_8_SMBUS};

/// CRC-8/SMBUS engine. Each call starts from a fresh digest.
pub const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum of an empty payload (the CRC initial value).
pub const EMPTY_CHECKSUM: u8 = 0x00;

/// Compute the frame checksum over `payload`.
pub fn crc8(payload: &[u8]) -> u8 {
    CRC8.checksum(payload)
}
