//! `GptState`: the reconciler's working object, produced by [`crate::load`]
//! and consumed by [`crate::repair`] and [`crate::write`].

use crate::entry::GptEntry;
use crate::header::GptHeader;
use crate::mbr::Mbr;
use crate::status::Status;

/// The in-memory view of a disk's GPT metadata: both header copies, the
/// winning entries buffer, and a bitmask recording which of the four
/// on-disk artifacts are currently trustworthy.
///
/// `entries` is owned exclusively by this struct and is never shared; it is
/// freed when the state is dropped.
#[derive(Debug, Clone)]
pub struct GptState {
    /// log2 of the logical sector size this state was loaded with.
    pub logical_sector_size_log2: u8,
    /// The disk's protective MBR, if one was decoded.
    pub pmbr: Mbr,
    /// The primary (near-start) header, valid or not per `status`.
    pub primary_header: GptHeader,
    /// The backup (near-end) header, valid or not per `status`.
    pub backup_header: GptHeader,
    /// The partition entries buffer, taken from whichever side is
    /// preferred. Length equals `entries_size`.
    pub entries: Vec<u8>,
    /// Declared length of `entries`, in bytes (`max_entries * entry_size`
    /// of the header it was read against).
    pub entries_size: usize,
    /// Which of the four redundant artifacts are currently valid.
    pub status: Status,
}

impl GptState {
    /// The header currently preferred for reads: primary if valid, else
    /// backup.
    pub fn preferred_header(&self) -> &GptHeader {
        if self.status.contains(Status::PRIMARY_HEADER_VALID) {
            &self.primary_header
        } else {
            &self.backup_header
        }
    }

    /// Both sides (header and entries, primary and backup) are valid.
    pub fn both_valid(&self) -> bool {
        self.status.both_valid()
    }

    /// Decode the `n`th partition entry from the preferred header's table.
    /// Returns `None` if `n` is out of bounds for `max_entries`.
    pub fn get_partentry(&self, n: u32) -> Option<GptEntry> {
        let header = self.preferred_header();
        if n >= header.max_entries {
            return None;
        }
        let offset = (n as usize) * (header.entry_size as usize);
        let end = offset + header.entry_size as usize;
        let raw = self.entries.get(offset..end)?;
        GptEntry::decode(raw, header.entry_size).ok()
    }
}
