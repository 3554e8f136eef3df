//! The `DiskAccess` capability the engine reads and writes through, plus the
//! small set of adapters this crate ships so callers are not forced to
//! implement the trait themselves for the common cases (an in-memory image,
//! or a plain file/block device).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::{fmt, io, path};

use crate::codec::{sector_to_byte, size_to_sectors};
use crate::error::{GptError, Result};

/// Default logical sector size log2 (512 = 2^9).
pub const DEFAULT_SECTOR_SIZE_LOG2: u8 = 9;

/// A block-addressable storage device the engine reads and writes through.
///
/// This is deliberately narrower than `Read + Write + Seek`: GPT metadata
/// operations are a handful of (offset, length) reads and writes, and the
/// engine never needs a cursor, so implementors only have to support
/// positioned I/O.
pub trait DiskAccess {
    /// Read exactly `len` bytes starting at `byte_offset`.
    fn read(&mut self, byte_offset: u64, len: usize) -> io::Result<Vec<u8>>;

    /// Write `data` starting at `byte_offset`.
    fn write(&mut self, byte_offset: u64, data: &[u8]) -> io::Result<()>;

    /// log2 of the logical sector size, e.g. `9` for 512-byte sectors.
    fn logical_sector_size_log2(&self) -> u8;

    /// Total number of logical sectors, if the device can report one.
    fn total_sectors(&self) -> Option<u64>;

    /// Convert a sector index to a byte offset using this device's sector size.
    fn sector_to_byte(&self, sector: u64) -> Result<u64> {
        sector_to_byte(sector, self.logical_sector_size_log2())
    }

    /// Ceiling-divide a byte size into a sector count using this device's
    /// sector size.
    fn size_to_sectors(&self, size: u64) -> Result<u64> {
        size_to_sectors(size, self.logical_sector_size_log2())
    }
}

/// A disk whose total sector count, normalized to 512-byte blocks, is
/// implausibly large (some drivers report a placeholder maximum rather than
/// an unknown size). Such a count is treated as "size unknown" for the
/// purposes of bounds-checking the backup header location.
const MAX_PLAUSIBLE_512_SECTORS: u64 = 1u64 << 51;

/// Returns the device's `total_sectors`, filtered through the disk-size
/// sanity check of §4.4: counts that normalize past 2^51 512-byte sectors
/// are reported as unknown.
pub fn sane_total_sectors<D: DiskAccess + ?Sized>(disk: &D) -> Option<u64> {
    let total = disk.total_sectors()?;
    let log2 = disk.logical_sector_size_log2();
    let normalized = total.checked_shl((log2 as u32).saturating_sub(9))?;
    if normalized > MAX_PLAUSIBLE_512_SECTORS {
        None
    } else {
        Some(total)
    }
}

/// Describes how a `DiskAccess` implementor relates to a parent whole-disk
/// device, when the device handed to the engine is itself a single
/// partition rather than a whole disk.
///
/// Generic rather than a trait object: the engine only ever needs this at a
/// call site that already knows the parent's concrete type, and keeping it
/// generic avoids forcing `DiskAccess` itself to be object-safe.
pub trait PartitionOf {
    /// Concrete type of the parent (whole-disk) device.
    type Parent: DiskAccess;

    /// Borrow the parent whole-disk device.
    fn parent(&mut self) -> &mut Self::Parent;

    /// This partition's first sector on the parent disk.
    fn partition_sector_offset(&self) -> u64;

    /// This partition's index within the parent's GPT entry array.
    fn partition_index(&self) -> u32;

    /// Name of the partition map in use on the parent disk (e.g. `"gpt"`).
    fn partmap(&self) -> &str;
}

/// An in-memory disk image, useful for tests and for building images before
/// they are ever written to real storage.
#[derive(Clone)]
pub struct MemDisk {
    bytes: Vec<u8>,
    log_sector_size: u8,
}

impl fmt::Debug for MemDisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemDisk")
            .field("len", &self.bytes.len())
            .field("log_sector_size", &self.log_sector_size)
            .finish()
    }
}

impl MemDisk {
    /// Create a zero-filled in-memory disk of `total_bytes`, using the given
    /// logical sector size.
    pub fn zeroed(total_bytes: usize, log_sector_size: u8) -> Self {
        Self {
            bytes: vec![0u8; total_bytes],
            log_sector_size,
        }
    }

    /// Wrap an existing byte buffer as an in-memory disk.
    pub fn from_bytes(bytes: Vec<u8>, log_sector_size: u8) -> Self {
        Self {
            bytes,
            log_sector_size,
        }
    }

    /// Borrow the backing buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the backing buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl DiskAccess for MemDisk {
    fn read(&mut self, byte_offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let start = usize::try_from(byte_offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset overflows usize"))?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read overflows usize"))?;
        self.bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of disk"))
    }

    fn write(&mut self, byte_offset: u64, data: &[u8]) -> io::Result<()> {
        let start = usize::try_from(byte_offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset overflows usize"))?;
        let end = start.checked_add(data.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "write overflows usize")
        })?;
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn logical_sector_size_log2(&self) -> u8 {
        self.log_sector_size
    }

    fn total_sectors(&self) -> Option<u64> {
        Some(self.bytes.len() as u64 >> self.log_sector_size)
    }
}

/// A real file or block device, accessed with positioned reads/writes.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    log_sector_size: u8,
    total_sectors: Option<u64>,
}

impl FileDisk {
    /// Open an existing file or block device for GPT I/O.
    pub fn open(
        path: impl AsRef<path::Path>,
        writable: bool,
        log_sector_size: u8,
    ) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(GptError::from)?;
        let total_sectors = file.metadata().ok().map(|m| m.len() >> log_sector_size);
        Ok(Self {
            file,
            log_sector_size,
            total_sectors,
        })
    }
}

impl DiskAccess for FileDisk {
    fn read(&mut self, byte_offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(byte_offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write(&mut self, byte_offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(byte_offset))?;
        self.file.write_all(data)?;
        self.file.flush()
    }

    fn logical_sector_size_log2(&self) -> u8 {
        self.log_sector_size
    }

    fn total_sectors(&self) -> Option<u64> {
        self.total_sectors
    }
}
