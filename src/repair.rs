//! Repair: reconstructing a missing or invalid side of the GPT from its
//! surviving counterpart.

use crate::codec::crc32_le;
use crate::disk::{sane_total_sectors, DiskAccess};
use crate::error::{GptError, Result};
use crate::header::NATIVE_HEADER_SIZE;
use crate::mbr::pmbr_check;
use crate::reconcile::{check_backup_layout, check_primary_layout, headers_equivalent};
use crate::state::GptState;
use crate::status::Status;

/// Reconstruct whichever side of `state` is missing or invalid from its
/// surviving counterpart, then recompute CRCs and re-validate both sides.
///
/// A no-op if both sides are already fully valid.
pub fn repair<D: DiskAccess + ?Sized>(disk: &mut D, state: &mut GptState) -> Result<()> {
    if state.both_valid() {
        return Ok(());
    }

    if state.logical_sector_size_log2 != disk.logical_sector_size_log2() {
        return Err(GptError::NotImplemented(
            "state and disk disagree on logical sector size".to_string(),
        ));
    }

    let log_sector_size = state.logical_sector_size_log2;
    let known_total = sane_total_sectors(disk);

    if state.status.primary_usable() {
        crate::debug!("repair: reconstructing backup from primary");
        let mut backup = state.primary_header.clone();
        backup.header_lba = state.primary_header.alternate_lba;
        backup.alternate_lba = state.primary_header.header_lba;

        if let Some(total) = known_total {
            if total > state.primary_header.alternate_lba + 1 {
                let entries_sectors = backup.entries_sector_count(log_sector_size)?;
                let new_backup_lba = total - 1;
                backup.header_lba = new_backup_lba;
                state.primary_header.alternate_lba = new_backup_lba;
                backup.entries_lba = new_backup_lba
                    .checked_sub(entries_sectors)
                    .ok_or_else(|| GptError::OutOfRange("disk too small to relocate backup".to_string()))?;
            }
        }
        state.backup_header = backup;
    } else if state.status.backup_usable() {
        crate::debug!("repair: reconstructing primary from backup");
        let mut primary = state.backup_header.clone();
        primary.header_lba = state.backup_header.alternate_lba;
        primary.alternate_lba = state.backup_header.header_lba;
        primary.entries_lba = 2;
        state.primary_header = primary;
    } else {
        return Err(GptError::Bug(
            "repair called with neither side usable".to_string(),
        ));
    }

    recompute(state)
}

/// Clear all four validity bits, normalize both headers' `header_size` to
/// the engine's native struct size, recompute the shared entries CRC and
/// each header's own CRC, then re-run the layout checks to reinstate
/// validity bits.
pub fn recompute(state: &mut GptState) -> Result<()> {
    state.status.remove(
        Status::PRIMARY_HEADER_VALID
            | Status::PRIMARY_ENTRIES_VALID
            | Status::BACKUP_HEADER_VALID
            | Status::BACKUP_ENTRIES_VALID,
    );

    state.primary_header.header_size = NATIVE_HEADER_SIZE;
    state.backup_header.header_size = NATIVE_HEADER_SIZE;

    let entries_crc = crc32_le(&state.entries);
    state.primary_header.entries_crc32 = entries_crc;
    state.backup_header.entries_crc32 = entries_crc;

    state.primary_header.crc32 = state.primary_header.crc32_with_field_zeroed();
    state.backup_header.crc32 = state.backup_header.crc32_with_field_zeroed();

    let log_sector_size = state.logical_sector_size_log2;

    crate::header::header_check(&state.primary_header, log_sector_size)
        .map_err(|e| GptError::Bug(format!("recomputed primary header failed validation: {e}")))?;
    check_primary_layout(&state.primary_header, log_sector_size)
        .map_err(|e| GptError::Bug(format!("recomputed primary header failed layout check: {e}")))?;
    crate::header::header_check(&state.backup_header, log_sector_size)
        .map_err(|e| GptError::Bug(format!("recomputed backup header failed validation: {e}")))?;
    check_backup_layout(&state.backup_header, log_sector_size)
        .map_err(|e| GptError::Bug(format!("recomputed backup header failed layout check: {e}")))?;

    if !headers_equivalent(&state.primary_header, &state.backup_header) {
        return Err(GptError::Bug(
            "recomputed primary and backup headers are not equivalent".to_string(),
        ));
    }

    if crc32_le(&state.entries) != state.primary_header.entries_crc32 {
        return Err(GptError::Bug(
            "recomputed entries CRC does not match stored value".to_string(),
        ));
    }

    state.status |= Status::PRIMARY_HEADER_VALID
        | Status::PRIMARY_ENTRIES_VALID
        | Status::BACKUP_HEADER_VALID
        | Status::BACKUP_ENTRIES_VALID;
    if pmbr_check(&state.pmbr).is_ok() {
        state.status |= Status::PROTECTIVE_MBR;
    }

    Ok(())
}
