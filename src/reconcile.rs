//! The reconciler: loads both copies of the GPT, cross-checks them, and
//! decides which bits of [`Status`] to set.

use crate::codec::crc32_le;
use crate::disk::{sane_total_sectors, DiskAccess};
use crate::error::{GptError, Result};
use crate::header::{header_check, GptHeader, NATIVE_HEADER_SIZE};
use crate::mbr::{pmbr_check, Mbr};
use crate::state::GptState;
use crate::status::Status;

/// Two validated headers are equivalent iff they describe the same
/// geometry: same `header_size`, mutually-pointing `header_lba`/
/// `alternate_lba`, same usable range, same entries layout, and same disk
/// GUID.
pub fn headers_equivalent(primary: &GptHeader, backup: &GptHeader) -> bool {
    primary.header_size == backup.header_size
        && primary.header_lba == backup.alternate_lba
        && primary.alternate_lba == backup.header_lba
        && primary.first_usable == backup.first_usable
        && primary.last_usable == backup.last_usable
        && primary.max_entries == backup.max_entries
        && primary.entry_size == backup.entry_size
        && primary.entries_crc32 == backup.entries_crc32
        && primary.disk_guid == backup.disk_guid
}

pub(crate) fn check_primary_layout(header: &GptHeader, log_sector_size: u8) -> Result<()> {
    if header.header_lba != 1 {
        return Err(GptError::BadPartitionTable(
            "primary header_lba must be 1".to_string(),
        ));
    }
    if header.entries_lba <= 1 {
        return Err(GptError::BadPartitionTable(
            "primary entries_lba must be > 1".to_string(),
        ));
    }
    let entries_sectors = header.entries_sector_count(log_sector_size)?;
    let entries_end = header
        .entries_lba
        .checked_add(entries_sectors)
        .ok_or_else(|| GptError::OutOfRange("primary entries range overflows".to_string()))?;
    if entries_end > header.first_usable {
        return Err(GptError::BadPartitionTable(
            "primary entries overlap usable range".to_string(),
        ));
    }
    if header.alternate_lba <= header.last_usable {
        return Err(GptError::BadPartitionTable(
            "primary alternate_lba must be past last_usable".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_backup_layout(header: &GptHeader, log_sector_size: u8) -> Result<()> {
    if header.alternate_lba != 1 {
        return Err(GptError::BadPartitionTable(
            "backup alternate_lba must be 1".to_string(),
        ));
    }
    if header.entries_lba <= header.last_usable {
        return Err(GptError::BadPartitionTable(
            "backup entries_lba must be past last_usable".to_string(),
        ));
    }
    let entries_sectors = header.entries_sector_count(log_sector_size)?;
    let entries_end = header
        .entries_lba
        .checked_add(entries_sectors)
        .ok_or_else(|| GptError::OutOfRange("backup entries range overflows".to_string()))?;
    if entries_end > header.header_lba {
        return Err(GptError::BadPartitionTable(
            "backup entries overlap backup header".to_string(),
        ));
    }
    if header.header_lba <= header.last_usable {
        return Err(GptError::BadPartitionTable(
            "backup header_lba must be past last_usable".to_string(),
        ));
    }
    Ok(())
}

fn read_header<D: DiskAccess + ?Sized>(disk: &mut D, lba: u64) -> Result<GptHeader> {
    let off = disk.sector_to_byte(lba)?;
    let raw = disk.read(off, NATIVE_HEADER_SIZE as usize)?;
    GptHeader::decode(&raw)
}

fn read_entries<D: DiskAccess + ?Sized>(disk: &mut D, header: &GptHeader) -> Result<Vec<u8>> {
    let off = disk.sector_to_byte(header.entries_lba)?;
    let len = (header.max_entries as usize)
        .checked_mul(header.entry_size as usize)
        .ok_or_else(|| GptError::OutOfMemory("entries table size overflows usize".to_string()))?;
    let buf = disk.read(off, len)?;
    if crc32_le(&buf) != header.entries_crc32 {
        return Err(GptError::BadPartitionTable(
            "entries CRC32 mismatch".to_string(),
        ));
    }
    Ok(buf)
}

/// Load both copies of the GPT from `disk`, cross-validate them, and build
/// the resulting [`GptState`]. Succeeds if at least one side (header +
/// entries) is valid; fails with the primary's error if both sides fail.
pub fn load<D: DiskAccess + ?Sized>(disk: &mut D) -> Result<GptState> {
    let log_sector_size = disk.logical_sector_size_log2();

    let pmbr = Mbr::read(disk)?;
    let mut status = Status::empty();
    if pmbr_check(&pmbr).is_ok() {
        status |= Status::PROTECTIVE_MBR;
    } else {
        crate::warn!("sector 0 is not a protective MBR; continuing GPT load anyway");
    }

    let mut first_error: Option<GptError> = None;
    let mut primary_header = GptHeader::default();
    let mut primary_entries: Option<Vec<u8>> = None;

    match read_header(disk, 1).and_then(|h| {
        header_check(&h, log_sector_size)?;
        check_primary_layout(&h, log_sector_size)?;
        Ok(h)
    }) {
        Ok(h) => {
            status |= Status::PRIMARY_HEADER_VALID;
            match read_entries(disk, &h) {
                Ok(buf) => {
                    status |= Status::PRIMARY_ENTRIES_VALID;
                    primary_entries = Some(buf);
                }
                Err(e) => {
                    crate::debug!("primary entries invalid: {e}");
                    first_error.get_or_insert(e);
                }
            }
            primary_header = h;
        }
        Err(e) => {
            crate::debug!("primary header invalid: {e}");
            first_error.get_or_insert(e);
        }
    }

    let known_total = sane_total_sectors(disk);
    let backup_lba = if status.contains(Status::PRIMARY_HEADER_VALID) {
        primary_header.alternate_lba
    } else if let Some(total) = known_total {
        total.saturating_sub(1)
    } else {
        return Err(first_error.unwrap_or_else(|| {
            GptError::OutOfRange("cannot locate backup GPT: disk size unknown".to_string())
        }));
    };

    if let Some(total) = known_total {
        if backup_lba > total - 1 {
            return Err(GptError::OutOfRange(
                "backup header location exceeds disk size".to_string(),
            ));
        }
    }

    let mut backup_header = GptHeader::default();
    let mut backup_entries: Option<Vec<u8>> = None;

    match read_header(disk, backup_lba).and_then(|h| {
        header_check(&h, log_sector_size)?;
        check_backup_layout(&h, log_sector_size)?;
        if h.header_lba != backup_lba {
            return Err(GptError::BadPartitionTable(
                "backup header_lba does not match the sector it was read from".to_string(),
            ));
        }
        if status.contains(Status::PRIMARY_HEADER_VALID)
            && !headers_equivalent(&primary_header, &h)
        {
            return Err(GptError::BadPartitionTable(
                "backup GPT out of sync".to_string(),
            ));
        }
        Ok(h)
    }) {
        Ok(h) => {
            status |= Status::BACKUP_HEADER_VALID;
            match read_entries(disk, &h) {
                Ok(buf) => {
                    if let Some(primary_buf) = &primary_entries {
                        if primary_buf != &buf {
                            return Err(GptError::BadPartitionTable(
                                "primary and backup entries tables disagree".to_string(),
                            ));
                        }
                    }
                    status |= Status::BACKUP_ENTRIES_VALID;
                    backup_entries = Some(buf);
                }
                Err(e) => {
                    crate::debug!("backup entries invalid: {e}");
                    first_error.get_or_insert(e);
                }
            }
            backup_header = h;
        }
        Err(e) => {
            crate::debug!("backup header invalid: {e}");
            first_error.get_or_insert(e);
        }
    }

    if !status.primary_usable() && !status.backup_usable() {
        return Err(first_error.unwrap_or_else(|| {
            GptError::BadPartitionTable("no valid GPT header found on either side".to_string())
        }));
    }

    let entries = primary_entries.or(backup_entries).unwrap_or_default();
    let entries_size = entries.len();

    Ok(GptState {
        logical_sector_size_log2: log_sector_size,
        pmbr,
        primary_header,
        backup_header,
        entries,
        entries_size,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;
    use crate::entry::GptEntry;
    use crate::guid::GptGuid;

    const SECTOR_LOG2: u8 = 9;

    fn build_disk(total_sectors: u64) -> (MemDisk, GptGuid) {
        let total_bytes = (total_sectors << SECTOR_LOG2) as usize;
        let mut disk = MemDisk::zeroed(total_bytes, SECTOR_LOG2);

        let mbr = Mbr::protective(u32::try_from(total_sectors - 1).ok());
        disk.write(0, &mbr.encode()).unwrap();

        let disk_guid = uuid::Uuid::parse_str("1B6A2BFA-E92B-184C-A8A7-ED0610D54821").unwrap();
        let entries_sectors = 32u64; // 128 * 128 bytes = 16384 bytes = 32 sectors
        let max_entries = 128u32;
        let entry_size = 128u32;

        let mut primary = GptHeader {
            header_lba: 1,
            alternate_lba: total_sectors - 1,
            first_usable: 2 + entries_sectors,
            last_usable: total_sectors - 2 - entries_sectors,
            disk_guid,
            entries_lba: 2,
            max_entries,
            entry_size,
            ..GptHeader::default()
        };

        let mut entry = GptEntry::default();
        entry.type_guid = uuid::Uuid::parse_str("0FC63DAF-8483-4772-8E79-3D69D8477DE4").unwrap();
        entry.unique_guid = uuid::Uuid::new_v4();
        entry.first_lba = primary.first_usable;
        entry.last_lba = primary.last_usable;
        entry.name = "root".to_string();

        let mut entries_buf = vec![0u8; (max_entries as usize) * (entry_size as usize)];
        entries_buf[0..entry_size as usize].copy_from_slice(&entry.encode(entry_size).unwrap());
        let entries_crc = crc32_le(&entries_buf);
        primary.entries_crc32 = entries_crc;
        primary.crc32 = primary.crc32_with_field_zeroed();

        let mut backup = primary.clone();
        backup.header_lba = total_sectors - 1;
        backup.alternate_lba = 1;
        backup.entries_lba = total_sectors - 1 - entries_sectors;
        backup.crc32 = backup.crc32_with_field_zeroed();

        disk.write(disk.sector_to_byte(1).unwrap(), &primary.encode())
            .unwrap();
        disk.write(disk.sector_to_byte(2).unwrap(), &entries_buf)
            .unwrap();
        disk.write(disk.sector_to_byte(backup.header_lba).unwrap(), &backup.encode())
            .unwrap();
        disk.write(
            disk.sector_to_byte(backup.entries_lba).unwrap(),
            &entries_buf,
        )
        .unwrap();

        (disk, disk_guid)
    }

    #[test]
    fn happy_load_sets_all_four_bits() {
        let (mut disk, disk_guid) = build_disk(4096);
        let state = load(&mut disk).unwrap();
        assert!(state.status.contains(Status::PROTECTIVE_MBR));
        assert!(state.both_valid());
        assert_eq!(state.preferred_header().disk_guid, disk_guid);
    }

    #[test]
    fn corrupt_primary_header_falls_back_to_backup() {
        let (mut disk, _) = build_disk(4096);
        // Flip a byte in the primary header's reserved field (offset 20).
        let off = disk.sector_to_byte(1).unwrap();
        let mut raw = disk.read(off, 92).unwrap();
        raw[20] ^= 0xFF;
        disk.write(off, &raw).unwrap();

        let state = load(&mut disk).unwrap();
        assert!(!state.status.contains(Status::PRIMARY_HEADER_VALID));
        assert!(state.status.contains(Status::BACKUP_HEADER_VALID));
        assert!(state.status.contains(Status::BACKUP_ENTRIES_VALID));
    }

    #[test]
    fn disagreeing_headers_report_out_of_sync() {
        let (mut disk, _) = build_disk(4096);
        let off = disk.sector_to_byte(1).unwrap();
        let raw = disk.read(off, 92).unwrap();
        let mut primary = GptHeader::decode(&raw).unwrap();
        primary.disk_guid = uuid::Uuid::new_v4();
        primary.crc32 = primary.crc32_with_field_zeroed();
        disk.write(off, &primary.encode()).unwrap();

        let err = load(&mut disk).unwrap_err();
        assert!(matches!(err, GptError::BadPartitionTable(_)));
    }

    #[test]
    fn non_protective_mbr_does_not_block_load() {
        let (mut disk, _) = build_disk(4096);
        let mut sector0 = disk.read(0, 512).unwrap();
        sector0[450] = 0x83; // first partition's type byte
        disk.write(0, &sector0).unwrap();

        let state = load(&mut disk).unwrap();
        assert!(!state.status.contains(Status::PROTECTIVE_MBR));
        assert!(state.both_valid());
    }
}
