//! GPT partition entry: on-disk layout and UTF-16LE name codec.

use crate::error::{GptError, Result};
use crate::guid::{decode_guid, encode_guid, GptGuid, NIL};

/// Number of UTF-16 code units reserved for a partition name (72 bytes).
pub const NAME_CODE_UNITS: usize = 36;

/// Fixed portion of a partition entry that precedes the name field:
/// two 16-byte GUIDs, two LBAs, and an attribute bitfield.
const FIXED_PREFIX_BYTES: usize = 16 + 16 + 8 + 8 + 8;

/// A decoded GPT partition entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GptEntry {
    /// GUID identifying the partition's type/usage.
    pub type_guid: GptGuid,
    /// GUID uniquely identifying this partition.
    pub unique_guid: GptGuid,
    /// First LBA of the partition.
    pub first_lba: u64,
    /// Last LBA of the partition (inclusive).
    pub last_lba: u64,
    /// Partition attribute flags.
    pub attributes: u64,
    /// Partition name, decoded from UTF-16LE.
    pub name: String,
}

impl Default for GptEntry {
    fn default() -> Self {
        Self {
            type_guid: NIL,
            unique_guid: NIL,
            first_lba: 0,
            last_lba: 0,
            attributes: 0,
            name: String::new(),
        }
    }
}

impl GptEntry {
    /// `true` if this entry describes an unused slot (nil type GUID).
    pub fn is_unused(&self) -> bool {
        self.type_guid == NIL
    }

    /// Decode one entry from the first `entry_size` bytes of `buf`.
    pub fn decode(buf: &[u8], entry_size: u32) -> Result<Self> {
        let entry_size = entry_size as usize;
        if buf.len() < entry_size || entry_size < FIXED_PREFIX_BYTES {
            return Err(GptError::BadPartitionTable(
                "entry buffer shorter than entry_size".to_string(),
            ));
        }

        let mut pos = 0usize;
        let type_guid = decode_guid(&buf[pos..pos + 16])?;
        pos += 16;
        let unique_guid = decode_guid(&buf[pos..pos + 16])?;
        pos += 16;
        let first_lba = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let last_lba = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let attributes = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        debug_assert_eq!(pos, FIXED_PREFIX_BYTES);

        let name_bytes = entry_size - FIXED_PREFIX_BYTES;
        let name_units = (name_bytes / 2).min(NAME_CODE_UNITS);
        let mut units = Vec::with_capacity(name_units);
        for i in 0..name_units {
            let off = pos + i * 2;
            units.push(u16::from_le_bytes(buf[off..off + 2].try_into().unwrap()));
        }
        // Trim the trailing NUL run the on-disk name is padded with.
        while units.last() == Some(&0) {
            units.pop();
        }
        let name = String::from_utf16_lossy(&units);

        Ok(Self {
            type_guid,
            unique_guid,
            first_lba,
            last_lba,
            attributes,
            name,
        })
    }

    /// Encode this entry to exactly `entry_size` bytes.
    pub fn encode(&self, entry_size: u32) -> Result<Vec<u8>> {
        let entry_size = entry_size as usize;
        if entry_size < FIXED_PREFIX_BYTES {
            return Err(GptError::BadPartitionTable(
                "entry_size too small to hold fixed fields".to_string(),
            ));
        }

        let name_bytes = entry_size - FIXED_PREFIX_BYTES;
        let name_units = (name_bytes / 2).min(NAME_CODE_UNITS);
        let encoded: Vec<u16> = self.name.encode_utf16().collect();
        if encoded.len() > name_units {
            return Err(GptError::BadArgument(
                "partition name does not fit in 36 UTF-16 code units".to_string(),
            ));
        }

        let mut out = vec![0u8; entry_size];
        let mut pos = 0usize;
        out[pos..pos + 16].copy_from_slice(&encode_guid(&self.type_guid));
        pos += 16;
        out[pos..pos + 16].copy_from_slice(&encode_guid(&self.unique_guid));
        pos += 16;
        out[pos..pos + 8].copy_from_slice(&self.first_lba.to_le_bytes());
        pos += 8;
        out[pos..pos + 8].copy_from_slice(&self.last_lba.to_le_bytes());
        pos += 8;
        out[pos..pos + 8].copy_from_slice(&self.attributes.to_le_bytes());
        pos += 8;
        debug_assert_eq!(pos, FIXED_PREFIX_BYTES);

        for (i, unit) in encoded.iter().enumerate() {
            let off = pos + i * 2;
            out[off..off + 2].copy_from_slice(&unit.to_le_bytes());
        }

        Ok(out)
    }
}
