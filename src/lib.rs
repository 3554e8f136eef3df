//! A pure-Rust engine for reading, validating, repairing, and writing GUID
//! Partition Tables (GPT).
//!
//! GPT stores its metadata redundantly: a primary header and partition
//! entry array near the start of the disk, and a backup pair near the
//! end, fronted by a protective legacy MBR at sector 0. This crate
//! implements the read path (load both copies, cross-validate, tolerate a
//! single surviving copy), the repair path (reconstruct a missing or
//! invalid copy from its surviving counterpart, relocating the backup if
//! the disk has grown), and the write path (commit backup-then-primary).
//!
//! ```
//! use gptrecon::disk::{DiskAccess, MemDisk};
//!
//! /// Inspect a real block device's GPT, repairing it in place if only one
//! /// copy survives.
//! fn inspect_disk(disk: &mut MemDisk) -> gptrecon::error::Result<()> {
//!     let mut state = gptrecon::load(disk)?;
//!     println!("disk guid: {}", gptrecon::disk_uuid_of(&state));
//!     if !state.both_valid() {
//!         gptrecon::repair(disk, &mut state)?;
//!         gptrecon::write(disk, &state)?;
//!     }
//!     Ok(())
//! }
//!
//! /// Demonstrates the read path against a synthetic in-memory image.
//! fn inspect_in_ram() -> gptrecon::error::Result<()> {
//!     const TOTAL_SECTORS: u64 = 2048;
//!     let mut disk = MemDisk::zeroed((TOTAL_SECTORS << 9) as usize, 9);
//!
//!     let mbr = gptrecon::mbr::Mbr::protective(u32::try_from(TOTAL_SECTORS - 1).ok());
//!     disk.write(0, &mbr.encode())?;
//!
//!     // A disk with no GPT headers written yet still has a protective MBR;
//!     // `load` reports that much even though both header copies are absent.
//!     let err = gptrecon::load(&mut disk).unwrap_err();
//!     println!("no GPT present yet: {err}");
//!     let _ = inspect_disk;
//!     Ok(())
//! }
//!
//! inspect_in_ram().unwrap();
//! ```

#![deny(missing_docs)]

#[macro_use]
mod macros;
#[macro_use]
mod logging;

pub mod codec;
pub mod disk;
pub mod entry;
pub mod error;
pub mod guid;
pub mod header;
pub mod mbr;
pub mod partition;
mod reconcile;
mod repair;
mod state;
pub mod status;
mod write;

use disk::DiskAccess;
use error::Result;

pub use entry::GptEntry;
pub use guid::{guid_to_str, GptGuid};
pub use header::{header_check, GptHeader};
pub use mbr::{pmbr_check, Mbr};
pub use partition::{device_partentry, disk_uuid, part_label, part_uuid};
pub use reconcile::load;
pub use repair::{recompute, repair};
pub use state::GptState;
pub use status::Status;
pub use write::write;

/// Render a loaded state's preferred disk GUID as a string, the
/// whole-disk analogue of [`disk_uuid`] for callers that already hold a
/// [`GptState`] rather than a [`disk::PartitionOf`] view.
pub fn disk_uuid_of(state: &GptState) -> String {
    guid_to_str(&state.preferred_header().disk_guid)
}

/// Ambient configuration wrapper around [`load`], mirroring the shape of
/// a conventional builder: the engine itself has exactly one load-time
/// knob worth exposing, so this stays intentionally small rather than
/// growing into a high-level partition-editing API.
#[derive(Debug, Clone, Copy, Default)]
pub struct GptConfig {
    only_valid_headers: bool,
}

impl GptConfig {
    /// A default configuration: tolerate a single valid side.
    pub fn new() -> Self {
        Self::default()
    }

    /// If `true`, `open` fails unless both the primary and backup copies
    /// validate, rather than accepting a lone survivor.
    pub fn only_valid_headers(mut self, only_valid_headers: bool) -> Self {
        self.only_valid_headers = only_valid_headers;
        self
    }

    /// Load the GPT from `disk` under this configuration.
    pub fn open<D: DiskAccess + ?Sized>(&self, disk: &mut D) -> Result<GptState> {
        let state = load(disk)?;
        if self.only_valid_headers && !state.both_valid() {
            return Err(error::GptError::BadPartitionTable(
                "only_valid_headers requested but one side failed to validate".to_string(),
            ));
        }
        Ok(state)
    }
}
