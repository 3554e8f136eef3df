//! Partition-level helpers: querying a single partition's label and GUIDs,
//! and resolving its own entry on the parent disk, through the
//! [`PartitionOf`] relationship.

use crate::disk::PartitionOf;
use crate::entry::GptEntry;
use crate::error::{GptError, Result};
use crate::guid::guid_to_str;
use crate::reconcile::load;

/// Read `device`'s own partition entry off its parent disk's GPT.
///
/// Fails with [`GptError::BadArgument`] if `device`'s partition map is not
/// `"gpt"`, or if its index has no corresponding entry.
pub fn device_partentry<P: PartitionOf>(device: &mut P) -> Result<GptEntry> {
    if device.partmap() != "gpt" {
        return Err(GptError::BadArgument(format!(
            "partition map {:?} is not gpt",
            device.partmap()
        )));
    }
    let index = device.partition_index();
    let state = load(device.parent())?;
    state
        .get_partentry(index)
        .ok_or_else(|| GptError::BadArgument(format!("no partition entry at index {index}")))
}

/// `device`'s partition name, decoded from its GPT entry.
pub fn part_label<P: PartitionOf>(device: &mut P) -> Result<String> {
    Ok(device_partentry(device)?.name)
}

/// `device`'s unique partition GUID, rendered as a string.
pub fn part_uuid<P: PartitionOf>(device: &mut P) -> Result<String> {
    Ok(guid_to_str(&device_partentry(device)?.unique_guid))
}

/// The disk GUID of `device`'s parent disk, rendered as a string.
pub fn disk_uuid<P: PartitionOf>(device: &mut P) -> Result<String> {
    let state = load(device.parent())?;
    Ok(guid_to_str(&state.preferred_header().disk_guid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc32_le;
    use crate::disk::MemDisk;
    use crate::header::GptHeader;
    use crate::mbr::Mbr;

    struct FakePartition {
        parent: MemDisk,
        offset: u64,
        index: u32,
    }

    impl PartitionOf for FakePartition {
        type Parent = MemDisk;

        fn parent(&mut self) -> &mut MemDisk {
            &mut self.parent
        }

        fn partition_sector_offset(&self) -> u64 {
            self.offset
        }

        fn partition_index(&self) -> u32 {
            self.index
        }

        fn partmap(&self) -> &str {
            "gpt"
        }
    }

    fn build_disk_with_one_partition(name: &str) -> (MemDisk, uuid::Uuid, uuid::Uuid) {
        let total_sectors = 4096u64;
        let mut disk = MemDisk::zeroed((total_sectors << 9) as usize, 9);
        let mbr = Mbr::protective(u32::try_from(total_sectors - 1).ok());
        disk.write(0, &mbr.encode()).unwrap();

        let disk_guid = uuid::Uuid::new_v4();
        let part_guid = uuid::Uuid::new_v4();
        let entries_sectors = 32u64;

        let mut entry = GptEntry::default();
        entry.type_guid = uuid::Uuid::parse_str("0FC63DAF-8483-4772-8E79-3D69D8477DE4").unwrap();
        entry.unique_guid = part_guid;
        entry.first_lba = 2 + entries_sectors;
        entry.last_lba = total_sectors - 2 - entries_sectors;
        entry.name = name.to_string();

        let mut entries_buf = vec![0u8; 128 * 128];
        entries_buf[0..128].copy_from_slice(&entry.encode(128).unwrap());

        let mut primary = GptHeader {
            header_lba: 1,
            alternate_lba: total_sectors - 1,
            first_usable: 2 + entries_sectors,
            last_usable: total_sectors - 2 - entries_sectors,
            disk_guid,
            entries_lba: 2,
            max_entries: 128,
            entry_size: 128,
            ..GptHeader::default()
        };
        primary.entries_crc32 = crc32_le(&entries_buf);
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
        disk.write(disk.sector_to_byte(backup.entries_lba).unwrap(), &entries_buf)
            .unwrap();

        (disk, disk_guid, part_guid)
    }

    #[test]
    fn part_label_and_uuid_resolve_through_parent() {
        let (disk, disk_guid, part_guid) = build_disk_with_one_partition("root");
        let mut partition = FakePartition {
            parent: disk,
            offset: 2 + 32,
            index: 0,
        };

        assert_eq!(part_label(&mut partition).unwrap(), "root");
        assert_eq!(part_uuid(&mut partition).unwrap(), guid_to_str(&part_guid));
        assert_eq!(disk_uuid(&mut partition).unwrap(), guid_to_str(&disk_guid));
    }

    #[test]
    fn device_partentry_rejects_non_gpt_partmap() {
        struct NonGpt(MemDisk);
        impl PartitionOf for NonGpt {
            type Parent = MemDisk;
            fn parent(&mut self) -> &mut MemDisk {
                &mut self.0
            }
            fn partition_sector_offset(&self) -> u64 {
                0
            }
            fn partition_index(&self) -> u32 {
                0
            }
            fn partmap(&self) -> &str {
                "mbr"
            }
        }

        let (disk, _, _) = build_disk_with_one_partition("root");
        let mut device = NonGpt(disk);
        assert!(device_partentry(&mut device).is_err());
    }
}
