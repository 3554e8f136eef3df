//! Little-endian codec primitives shared by the header and entry layers:
//! CRC-32 and sector/byte-offset arithmetic.

use crc::Crc;

use crate::error::{GptError, Result};

const CRC_32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Standard CRC-32 (IEEE 802.3 polynomial, zlib-compatible).
pub fn crc32_le(data: &[u8]) -> u32 {
    let mut digest = CRC_32.digest();
    digest.update(data);
    digest.finalize()
}

/// Number of bytes in a logical sector, given its log2.
pub const fn sector_size_bytes(log2: u8) -> u64 {
    1u64 << log2
}

/// Convert a sector index to a byte offset, checked against overflow.
pub fn sector_to_byte(sector: u64, log_sector_size: u8) -> Result<u64> {
    sector
        .checked_mul(sector_size_bytes(log_sector_size))
        .ok_or_else(|| GptError::OutOfRange("sector offset overflows u64".to_string()))
}

/// Ceiling-divide a byte size into a sector count.
pub fn size_to_sectors(size: u64, log_sector_size: u8) -> Result<u64> {
    let sector_size = sector_size_bytes(log_sector_size);
    size.checked_add(sector_size - 1)
        .map(|padded| padded / sector_size)
        .ok_or_else(|| GptError::OutOfRange("size in sectors overflows u64".to_string()))
}

/// `true` if `n` is a power of two (including `1`).
pub const fn is_pow2(n: u32) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
