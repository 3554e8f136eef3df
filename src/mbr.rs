//! The protective MBR (PMBR) at sector 0, also known as LBA0.
//!
//! A GPT disk still carries a legacy MBR so tools that only understand
//! MBR partitioning don't mistake the disk for unpartitioned space. This
//! module decodes that structure and checks whether it qualifies as
//! "protective"; it does not rewrite it (updating the PMBR on write is an
//! explicit non-goal, see the write path).

use crate::disk::DiskAccess;
use crate::error::{GptError, Result};

/// MBR signature, at offset 510 of sector 0.
pub const SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Partition type byte a protective MBR's entry must carry.
pub const PROTECTIVE_OS_TYPE: u8 = 0xEE;

/// The legacy MBR occupying sector 0 of a GPT disk.
#[derive(Clone)]
pub struct Mbr {
    bootcode: [u8; 440],
    disk_signature: [u8; 4],
    unknown: u16,
    partitions: [PartRecord; 4],
    signature: [u8; 2],
}

impl std::fmt::Debug for Mbr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mbr")
            .field("partitions", &self.partitions)
            .field("signature", &self.signature)
            .finish()
    }
}

impl Default for Mbr {
    fn default() -> Self {
        Self {
            bootcode: [0x00; 440],
            disk_signature: [0x00; 4],
            unknown: 0,
            partitions: [
                PartRecord::zero(),
                PartRecord::zero(),
                PartRecord::zero(),
                PartRecord::zero(),
            ],
            signature: SIGNATURE,
        }
    }
}

impl Mbr {
    /// Build a protective MBR covering a disk of `lb_size` logical blocks
    /// (or the whole addressable range, per the classic `0xFFFFFFFF`
    /// convention, if the size is unknown or doesn't fit in 32 bits).
    pub fn protective(lb_size: Option<u32>) -> Self {
        Self {
            partitions: [
                PartRecord::new_protective(lb_size),
                PartRecord::zero(),
                PartRecord::zero(),
                PartRecord::zero(),
            ],
            ..Self::default()
        }
    }

    /// Decode the 512-byte sector-0 image.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 512 {
            return Err(GptError::BadPartitionTable(
                "MBR sector shorter than 512 bytes".to_string(),
            ));
        }

        let bootcode: [u8; 440] = buf[0..440].try_into().unwrap();
        let disk_signature: [u8; 4] = buf[440..444].try_into().unwrap();
        let unknown = u16::from_le_bytes(buf[444..446].try_into().unwrap());

        let mut partitions = [
            PartRecord::zero(),
            PartRecord::zero(),
            PartRecord::zero(),
            PartRecord::zero(),
        ];
        for (i, slot) in partitions.iter_mut().enumerate() {
            let off = 446 + i * 16;
            *slot = PartRecord::decode(&buf[off..off + 16]);
        }

        let signature: [u8; 2] = buf[510..512].try_into().unwrap();

        Ok(Self {
            bootcode,
            disk_signature,
            unknown,
            partitions,
            signature,
        })
    }

    /// Encode this MBR to its 512-byte on-disk form.
    pub fn encode(&self) -> [u8; 512] {
        let mut out = [0u8; 512];
        out[0..440].copy_from_slice(&self.bootcode);
        out[440..444].copy_from_slice(&self.disk_signature);
        out[444..446].copy_from_slice(&self.unknown.to_le_bytes());
        for (i, p) in self.partitions.iter().enumerate() {
            let off = 446 + i * 16;
            out[off..off + 16].copy_from_slice(&p.encode());
        }
        out[510..512].copy_from_slice(&self.signature);
        out
    }

    /// The four primary partition records.
    pub fn partitions(&self) -> &[PartRecord; 4] {
        &self.partitions
    }

    /// Read sector 0 from `disk` and decode it.
    pub fn read<D: DiskAccess + ?Sized>(disk: &mut D) -> Result<Self> {
        let sector_bytes = disk.sector_to_byte(1)?;
        let raw = disk.read(0, sector_bytes as usize)?;
        Self::decode(&raw)
    }
}

/// One of the four 16-byte entries in the classic MBR partition table.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PartRecord {
    boot_indicator: u8,
    start_head: u8,
    start_sector: u8,
    start_track: u8,
    os_type: u8,
    end_head: u8,
    end_sector: u8,
    end_track: u8,
    lb_start: u32,
    lb_size: u32,
}

impl PartRecord {
    /// Build a protective entry: type `0xEE`, spanning from LBA 1 for
    /// `lb_size` logical blocks (or the whole disk if unknown).
    pub fn new_protective(lb_size: Option<u32>) -> Self {
        Self {
            boot_indicator: 0x00,
            start_head: 0x00,
            start_sector: 0x02,
            start_track: 0x00,
            os_type: PROTECTIVE_OS_TYPE,
            end_head: 0xFF,
            end_sector: 0xFF,
            end_track: 0xFF,
            lb_start: 1,
            lb_size: lb_size.unwrap_or(0xFF_FF_FF_FF),
        }
    }

    /// An all-zero (unused) partition record.
    pub fn zero() -> Self {
        Self {
            boot_indicator: 0,
            start_head: 0,
            start_sector: 0,
            start_track: 0,
            os_type: 0,
            end_head: 0,
            end_sector: 0,
            end_track: 0,
            lb_start: 0,
            lb_size: 0,
        }
    }

    /// This record's partition type byte.
    pub fn os_type(&self) -> u8 {
        self.os_type
    }

    /// This record's starting LBA.
    pub fn lb_start(&self) -> u32 {
        self.lb_start
    }

    /// This record's size in logical blocks.
    pub fn lb_size(&self) -> u32 {
        self.lb_size
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            boot_indicator: buf[0],
            start_head: buf[1],
            start_sector: buf[2],
            start_track: buf[3],
            os_type: buf[4],
            end_head: buf[5],
            end_sector: buf[6],
            end_track: buf[7],
            lb_start: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            lb_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }

    fn encode(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0] = self.boot_indicator;
        out[1] = self.start_head;
        out[2] = self.start_sector;
        out[3] = self.start_track;
        out[4] = self.os_type;
        out[5] = self.end_head;
        out[6] = self.end_sector;
        out[7] = self.end_track;
        out[8..12].copy_from_slice(&self.lb_start.to_le_bytes());
        out[12..16].copy_from_slice(&self.lb_size.to_le_bytes());
        out
    }
}

/// Check whether `mbr` qualifies as a protective MBR: signature `0xAA55`
/// and at least one primary entry of type `0xEE`. A disk failing this
/// check is not fatal to GPT loading — see the read path — it simply
/// leaves the corresponding status bit clear.
pub fn pmbr_check(mbr: &Mbr) -> Result<()> {
    if mbr.signature != SIGNATURE {
        return Err(GptError::BadPartitionTable(
            "invalid MBR signature".to_string(),
        ));
    }
    if !mbr
        .partitions
        .iter()
        .any(|p| p.os_type == PROTECTIVE_OS_TYPE)
    {
        return Err(GptError::BadPartitionTable(
            "no protective partition entry".to_string(),
        ));
    }
    Ok(())
}
