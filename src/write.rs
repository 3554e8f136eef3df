//! Write path: commit a fully-reconciled [`GptState`] to disk.

use crate::disk::{sane_total_sectors, DiskAccess};
use crate::error::{GptError, Result};
use crate::header::{GptHeader, NATIVE_HEADER_SIZE};
use crate::state::GptState;
use crate::status::Status;

/// Write both copies of the GPT described by `state` to `disk`.
///
/// Preconditions: all four validity bits must be set (run [`crate::repair`]
/// first, or have loaded a state where both sides already agreed).
///
/// Writes the backup copy first, then the primary: if the write is
/// interrupted, the primary remains the last-known-good source, and a
/// subsequent `load`/`repair` can still recover. The protective MBR is
/// never rewritten here.
pub fn write<D: DiskAccess + ?Sized>(disk: &mut D, state: &GptState) -> Result<()> {
    if !state.both_valid() {
        return Err(GptError::Bug(
            "write requires both copies to be valid; call repair first".to_string(),
        ));
    }

    let known_total = sane_total_sectors(disk);
    let backup_beyond_disk = known_total
        .map(|total| state.backup_header.header_lba >= total)
        .unwrap_or(false);

    if backup_beyond_disk {
        crate::warn!(
            "backup header at LBA {} lies beyond the known disk size; skipping backup write",
            state.backup_header.header_lba
        );
    } else {
        write_side(disk, &state.backup_header, &state.entries)?;
    }

    write_side(disk, &state.primary_header, &state.entries)?;

    Ok(())
}

fn write_side<D: DiskAccess + ?Sized>(disk: &mut D, header: &GptHeader, entries: &[u8]) -> Result<()> {
    if header.header_size != NATIVE_HEADER_SIZE {
        return Err(GptError::NotImplemented(
            "writing a header whose declared size differs from the engine's native struct size"
                .to_string(),
        ));
    }

    if header.header_lba == 0 {
        return Err(GptError::Bug(
            "refusing to write a GPT header to sector 0".to_string(),
        ));
    }
    let header_off = disk.sector_to_byte(header.header_lba)?;
    disk.write(header_off, &header.encode())?;

    if header.entries_lba < 2 {
        return Err(GptError::Bug(
            "refusing to write entries before sector 2".to_string(),
        ));
    }
    let entries_off = disk.sector_to_byte(header.entries_lba)?;
    disk.write(entries_off, entries)?;

    Ok(())
}

/// `true` if `state` satisfies `write`'s preconditions.
pub fn writable(state: &GptState) -> bool {
    state.status.contains(
        Status::PRIMARY_HEADER_VALID
            | Status::PRIMARY_ENTRIES_VALID
            | Status::BACKUP_HEADER_VALID
            | Status::BACKUP_ENTRIES_VALID,
    )
}
