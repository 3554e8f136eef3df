//! The reconciler's validity bitmask.

use bitflags::bitflags;

bitflags! {
    /// Which of the four on-disk artifacts (primary header, primary entries,
    /// backup header, backup entries), plus the protective MBR, the
    /// reconciler currently considers trustworthy.
    ///
    /// Kept as a bitmask rather than a `{OnlyPrimary, OnlyBackup, Both,
    /// Neither}` enum because entries can parse and checksum correctly even
    /// when the header that claims to own them fails its layout checks; an
    /// enum collapsing header and entries into one axis would lose that
    /// distinction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// Sector 0 held a protective MBR (signature `0xAA55`, a primary
        /// entry of type `0xEE`).
        const PROTECTIVE_MBR      = 1 << 0;
        /// The primary header passed `header_check` and its primary-specific
        /// layout checks.
        const PRIMARY_HEADER_VALID  = 1 << 1;
        /// The primary entries buffer matches `primary_header.entries_crc32`.
        const PRIMARY_ENTRIES_VALID = 1 << 2;
        /// The backup header passed `header_check` and its backup-specific
        /// layout checks.
        const BACKUP_HEADER_VALID   = 1 << 3;
        /// The backup entries buffer matches `backup_header.entries_crc32`.
        const BACKUP_ENTRIES_VALID  = 1 << 4;
    }
}

impl Status {
    /// Both headers and both entries buffers are valid.
    pub fn both_valid(self) -> bool {
        self.contains(
            Status::PRIMARY_HEADER_VALID
                | Status::PRIMARY_ENTRIES_VALID
                | Status::BACKUP_HEADER_VALID
                | Status::BACKUP_ENTRIES_VALID,
        )
    }

    /// The primary side (header + entries) is usable.
    pub fn primary_usable(self) -> bool {
        self.contains(Status::PRIMARY_HEADER_VALID | Status::PRIMARY_ENTRIES_VALID)
    }

    /// The backup side (header + entries) is usable.
    pub fn backup_usable(self) -> bool {
        self.contains(Status::BACKUP_HEADER_VALID | Status::BACKUP_ENTRIES_VALID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_valid_requires_all_four_bits() {
        let s = Status::PRIMARY_HEADER_VALID
            | Status::PRIMARY_ENTRIES_VALID
            | Status::BACKUP_HEADER_VALID;
        assert!(!s.both_valid());
        assert!(s.primary_usable());
        assert!(!s.backup_usable());
    }
}
