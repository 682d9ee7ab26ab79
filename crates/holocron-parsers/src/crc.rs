// holocron-parsers/src/crc.rs
//! Engine CRC used to key file paths
//!
//! The engine hashes paths with a non-reflected CRC-32 (polynomial
//! 0x04C11DB7, initial value and final xor 0xFFFFFFFF). Those are the
//! CRC-32/BZIP2 parameters, which is *not* the reflected zlib CRC.

use crc::{Crc, CRC_32_BZIP2};

const ENGINE_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// CRC of a path or name exactly as spelled
pub fn engine_crc(text: &str) -> u32 {
    engine_crc_bytes(text.as_bytes())
}

/// CRC of raw bytes
pub fn engine_crc_bytes(data: &[u8]) -> u32 {
    ENGINE_CRC.checksum(data)
}
