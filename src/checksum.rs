//! # CRC-16/ARC Checksum Engine
//!
//! Integrity codes for checksummed GeoCom framing (the VivaTPS dialect
//! carries a checksum field in its replies). The algorithm is CRC-16/ARC:
//! polynomial 0x8005 reflected in and out, zero initial value, zero final
//! XOR. Check value for `"123456789"` is `0xBB3D`.
//!
//! Two implementations live here on purpose. [`checksum`] is the
//! table-driven engine used on the hot path; [`checksum_bitwise`] is a
//! bit-at-a-time reference kept alongside it so the table can be verified
//! against first principles in tests.

use crc::{Crc, CRC_16_ARC};

/// Table-driven CRC-16/ARC instance
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Compute the CRC-16/ARC checksum of a byte slice
///
/// # Example
///
/// ```rust
/// use geocom::checksum::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0xBB3D);
/// assert_eq!(checksum(b""), 0x0000);
/// ```
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Compute the CRC-16/ARC checksum over the bytes of a string
pub fn checksum_str(text: &str) -> u16 {
    checksum(text.as_bytes())
}

/// Bit-at-a-time reference implementation of CRC-16/ARC
///
/// Processes one input bit per iteration using the reflected polynomial
/// 0xA001. Slower than [`checksum`] but independent of the lookup table.
pub fn checksum_bitwise(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}
