//! CRC32 helpers
//!
//! The checksum is the zlib/IEEE CRC32 used by U-Boot. It is exposed as a
//! running accumulator so a checksum can be threaded through several copies.

use crc32fast::Hasher;

/// Continue a CRC32 over `data`, starting from a previously finalized `crc`
///
/// `crc32(crc32(0, a), b) == crc32(0, a ++ b)`.
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

/// CRC32 of a single buffer
pub fn calculate_crc32(data: &[u8]) -> u32 {
    crc32(0, data)
}
