//! GUID parsing, encoding and rendering.
//!
//! GPT GUIDs are stored mixed-endian on disk: the first three fields are
//! little-endian integers, the last two are raw byte strings. This is the
//! same layout `uuid::Uuid::from_fields`/`as_fields` already expects, so we
//! reuse that crate instead of hand-rolling a GUID type.

use uuid::Uuid;

use crate::error::{GptError, Result};

/// A GPT GUID. An alias rather than a newtype: the mixed-endian wire format
/// is exactly what `uuid::Uuid` already models.
pub type GptGuid = Uuid;

/// The all-zero GUID, used for the unused-entry sentinel and as a default.
pub const NIL: GptGuid = Uuid::nil();

/// Decode a GUID from its 16-byte mixed-endian on-disk form.
pub fn decode_guid(buf: &[u8]) -> Result<GptGuid> {
    if buf.len() < 16 {
        return Err(GptError::BadPartitionTable(
            "guid needs 16 bytes".to_string(),
        ));
    }

    let d1 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let d2 = u16::from_le_bytes(buf[4..6].try_into().unwrap());
    let d3 = u16::from_le_bytes(buf[6..8].try_into().unwrap());
    let d4: [u8; 8] = buf[8..16].try_into().unwrap();

    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

/// Encode a GUID to its 16-byte mixed-endian on-disk form.
pub fn encode_guid(guid: &GptGuid) -> [u8; 16] {
    let (d1, d2, d3, d4) = guid.as_fields();
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&d1.to_le_bytes());
    out[4..6].copy_from_slice(&d2.to_le_bytes());
    out[6..8].copy_from_slice(&d3.to_le_bytes());
    out[8..16].copy_from_slice(d4);
    out
}

/// Render a GUID as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
///
/// This is just `uuid::Uuid`'s hyphenated form, but named to match the
/// engine's own vocabulary for callers that only know "GUID", not "UUID".
pub fn guid_to_str(guid: &GptGuid) -> String {
    guid.hyphenated().to_string()
}
