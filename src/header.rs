//! GPT header: on-disk layout, codec, and the single-header validator.

use crate::codec::{crc32_le, is_pow2, sector_size_bytes};
use crate::error::{GptError, Result};
use crate::guid::{decode_guid, encode_guid, GptGuid, NIL};

/// Size of the fixed GPT header struct on disk.
pub const NATIVE_HEADER_SIZE: u32 = 92;

/// Required header signature.
pub const MAGIC: &[u8; 8] = b"EFI PART";

/// Required header version (1.0).
pub const VERSION: u32 = 0x0001_0000;

/// The GPT spec's minimum size, in bytes, of an entries table.
pub const MIN_ENTRIES_TABLE_BYTES: u32 = 16384;

/// A decoded GPT header. Parsing (`decode`) is infallible given enough
/// bytes; whether the result is *trustworthy* is a question for
/// [`header_check`], kept as a separate layer so entries can still be
/// accepted even when the owning header fails a layout check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GptHeader {
    /// Header signature, expected to equal [`MAGIC`].
    pub magic: [u8; 8],
    /// Header revision, expected to equal [`VERSION`].
    pub version: u32,
    /// Declared size of this header, in bytes.
    pub header_size: u32,
    /// CRC-32 of the header with this field zeroed during computation.
    pub crc32: u32,
    reserved: u32,
    /// LBA of the sector this header was read from (or will be written to).
    pub header_lba: u64,
    /// LBA of this header's counterpart.
    pub alternate_lba: u64,
    /// First LBA usable for partitions.
    pub first_usable: u64,
    /// Last LBA usable for partitions.
    pub last_usable: u64,
    /// GUID identifying the disk.
    pub disk_guid: GptGuid,
    /// LBA where the partition entries array starts.
    pub entries_lba: u64,
    /// Number of entries in the partition entries array.
    pub max_entries: u32,
    /// Size, in bytes, of a single partition entry.
    pub entry_size: u32,
    /// CRC-32 of the partition entries array.
    pub entries_crc32: u32,
}

impl Default for GptHeader {
    fn default() -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            header_size: NATIVE_HEADER_SIZE,
            crc32: 0,
            reserved: 0,
            header_lba: 0,
            alternate_lba: 0,
            first_usable: 0,
            last_usable: 0,
            disk_guid: NIL,
            entries_lba: 0,
            max_entries: 0,
            entry_size: 128,
            entries_crc32: 0,
        }
    }
}

macro_rules! take {
    ($buf:expr, $pos:expr, $n:expr) => {{
        let slice: [u8; $n] = $buf[$pos..$pos + $n].try_into().unwrap();
        $pos += $n;
        slice
    }};
}

impl GptHeader {
    /// Decode the 92-byte fixed struct from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < NATIVE_HEADER_SIZE as usize {
            return Err(GptError::BadPartitionTable(
                "header buffer shorter than 92 bytes".to_string(),
            ));
        }

        let mut pos = 0usize;
        let magic = take!(buf, pos, 8);
        let version = u32::from_le_bytes(take!(buf, pos, 4));
        let header_size = u32::from_le_bytes(take!(buf, pos, 4));
        let crc32 = u32::from_le_bytes(take!(buf, pos, 4));
        let reserved = u32::from_le_bytes(take!(buf, pos, 4));
        let header_lba = u64::from_le_bytes(take!(buf, pos, 8));
        let alternate_lba = u64::from_le_bytes(take!(buf, pos, 8));
        let first_usable = u64::from_le_bytes(take!(buf, pos, 8));
        let last_usable = u64::from_le_bytes(take!(buf, pos, 8));
        let disk_guid = decode_guid(&buf[pos..pos + 16])?;
        pos += 16;
        let entries_lba = u64::from_le_bytes(take!(buf, pos, 8));
        let max_entries = u32::from_le_bytes(take!(buf, pos, 4));
        let entry_size = u32::from_le_bytes(take!(buf, pos, 4));
        let entries_crc32 = u32::from_le_bytes(take!(buf, pos, 4));
        debug_assert_eq!(pos, NATIVE_HEADER_SIZE as usize);

        Ok(Self {
            magic,
            version,
            header_size,
            crc32,
            reserved,
            header_lba,
            alternate_lba,
            first_usable,
            last_usable,
            disk_guid,
            entries_lba,
            max_entries,
            entry_size,
            entries_crc32,
        })
    }

    /// Encode this header's 92-byte fixed struct, using `self.crc32` as the
    /// CRC field verbatim (callers recomputing a fresh CRC go through
    /// [`Self::crc32_with_field_zeroed`], which encodes its own scratch copy
    /// with the field zeroed).
    pub fn encode(&self) -> [u8; NATIVE_HEADER_SIZE as usize] {
        let mut out = [0u8; NATIVE_HEADER_SIZE as usize];
        let mut pos = 0usize;

        macro_rules! put {
            ($bytes:expr) => {{
                let bytes = $bytes;
                out[pos..pos + bytes.len()].copy_from_slice(&bytes);
                pos += bytes.len();
            }};
        }

        put!(self.magic);
        put!(self.version.to_le_bytes());
        put!(self.header_size.to_le_bytes());
        put!(self.crc32.to_le_bytes());
        put!(self.reserved.to_le_bytes());
        put!(self.header_lba.to_le_bytes());
        put!(self.alternate_lba.to_le_bytes());
        put!(self.first_usable.to_le_bytes());
        put!(self.last_usable.to_le_bytes());
        put!(encode_guid(&self.disk_guid));
        put!(self.entries_lba.to_le_bytes());
        put!(self.max_entries.to_le_bytes());
        put!(self.entry_size.to_le_bytes());
        put!(self.entries_crc32.to_le_bytes());
        debug_assert_eq!(pos, NATIVE_HEADER_SIZE as usize);

        out
    }

    /// Recompute this header's own CRC-32, as if the `crc32` field were
    /// zeroed and any padding out to `header_size` were left as zero (the
    /// GPT spec requires padding bytes beyond the 92-byte struct to be
    /// reserved-as-zero, so omitting them from the buffer is equivalent to
    /// including them).
    pub fn crc32_with_field_zeroed(&self) -> u32 {
        let mut tmp = self.clone();
        tmp.crc32 = 0;
        let encoded = tmp.encode();
        let header_size = (self.header_size as usize).max(NATIVE_HEADER_SIZE as usize);
        let mut padded = vec![0u8; header_size];
        padded[..encoded.len()].copy_from_slice(&encoded);
        crc32_le(&padded)
    }

    /// Number of sectors the entries table occupies, given this header's
    /// `max_entries` and `entry_size`.
    pub fn entries_sector_count(&self, log_sector_size: u8) -> Result<u64> {
        let table_bytes = u64::from(self.max_entries)
            .checked_mul(u64::from(self.entry_size))
            .ok_or_else(|| GptError::OutOfRange("entries table size overflows u64".to_string()))?;
        crate::codec::size_to_sectors(table_bytes, log_sector_size)
    }
}

/// Stateless checks on a single header: magic, version, CRC, header-size
/// bounds, entry-size well-formedness, entry-table minimum size, and
/// usable-range ordering. Layout checks tying a header to its role
/// (primary/backup) and to its counterpart are *not* performed here — see
/// the reconciler.
pub fn header_check(header: &GptHeader, log_sector_size: u8) -> Result<()> {
    if header.magic != *MAGIC {
        return Err(GptError::BadPartitionTable(
            "invalid GPT signature".to_string(),
        ));
    }
    if header.version != VERSION {
        return Err(GptError::BadPartitionTable(
            "unknown GPT header version".to_string(),
        ));
    }
    if header.crc32_with_field_zeroed() != header.crc32 {
        return Err(GptError::BadPartitionTable(
            "invalid header CRC32".to_string(),
        ));
    }

    let sector_bytes = sector_size_bytes(log_sector_size);
    let header_size = u64::from(header.header_size);
    if header_size < u64::from(NATIVE_HEADER_SIZE) || header_size > sector_bytes {
        return Err(GptError::BadPartitionTable(
            "invalid header size".to_string(),
        ));
    }

    if header.entry_size < 128 || header.entry_size % 128 != 0 || !is_pow2(header.entry_size / 128)
    {
        return Err(GptError::BadPartitionTable(
            "invalid partition entry size".to_string(),
        ));
    }

    let table_bytes = u64::from(header.max_entries)
        .checked_mul(u64::from(header.entry_size))
        .ok_or_else(|| GptError::BadPartitionTable("entries table size overflows".to_string()))?;
    if table_bytes < u64::from(MIN_ENTRIES_TABLE_BYTES) {
        return Err(GptError::BadPartitionTable(
            "invalid entries table size".to_string(),
        ));
    }

    if header.first_usable > header.last_usable {
        return Err(GptError::BadPartitionTable(
            "invalid usable LBA range".to_string(),
        ));
    }

    Ok(())
}
