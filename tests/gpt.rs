//! End-to-end scenarios from the engine's testable-properties section,
//! driven entirely against synthetic in-memory disk images.

use gptrecon::disk::{DiskAccess, FileDisk, MemDisk};
use gptrecon::error::GptError;
use gptrecon::header::GptHeader;
use gptrecon::mbr::Mbr;
use gptrecon::status::Status;
use gptrecon::{codec, repair, write};

const SECTOR_LOG2: u8 = 9;
const ENTRIES_SECTORS: u64 = 32; // 128 entries * 128 bytes = 16384 bytes

fn build_disk(total_sectors: u64) -> MemDisk {
    let total_bytes = (total_sectors << SECTOR_LOG2) as usize;
    let mut disk = MemDisk::zeroed(total_bytes, SECTOR_LOG2);

    let mbr = Mbr::protective(u32::try_from(total_sectors - 1).ok());
    disk.write(0, &mbr.encode()).unwrap();

    let mut primary = GptHeader {
        header_lba: 1,
        alternate_lba: total_sectors - 1,
        first_usable: 2 + ENTRIES_SECTORS,
        last_usable: total_sectors - 2 - ENTRIES_SECTORS,
        disk_guid: uuid::Uuid::new_v4(),
        entries_lba: 2,
        max_entries: 128,
        entry_size: 128,
        ..GptHeader::default()
    };
    let entries_buf = vec![0u8; 128 * 128];
    primary.entries_crc32 = codec::crc32_le(&entries_buf);
    primary.crc32 = primary.crc32_with_field_zeroed();

    let mut backup = primary.clone();
    backup.header_lba = total_sectors - 1;
    backup.alternate_lba = 1;
    backup.entries_lba = total_sectors - 1 - ENTRIES_SECTORS;
    backup.crc32 = backup.crc32_with_field_zeroed();

    disk.write(disk.sector_to_byte(1).unwrap(), &primary.encode())
        .unwrap();
    disk.write(disk.sector_to_byte(2).unwrap(), &entries_buf)
        .unwrap();
    disk.write(disk.sector_to_byte(backup.header_lba).unwrap(), &backup.encode())
        .unwrap();
    disk.write(disk.sector_to_byte(backup.entries_lba).unwrap(), &entries_buf)
        .unwrap();
    disk
}

#[test]
fn happy_load_2mib_image() {
    let total_sectors = (2 * 1024 * 1024) / 512; // 2 MiB image at 512-byte sectors
    let mut disk = build_disk(total_sectors);
    let state = gptrecon::load(&mut disk).unwrap();

    assert!(state.status.contains(Status::PROTECTIVE_MBR));
    assert!(state.both_valid());
    assert_eq!(state.primary_header.first_usable, 34);
    assert_eq!(state.backup_header.header_lba, total_sectors - 1);
    assert!(!gptrecon::disk_uuid_of(&state).is_empty());
}

#[test]
fn corrupt_primary_crc_falls_back_and_repair_restores_it() {
    let mut disk = build_disk(4096);
    let off = disk.sector_to_byte(1).unwrap();
    let mut raw = disk.read(off, 92).unwrap();
    raw[20] ^= 0xFF; // reserved field, doesn't change layout but breaks crc32
    disk.write(off, &raw).unwrap();

    let mut state = gptrecon::load(&mut disk).unwrap();
    assert!(!state.status.contains(Status::PRIMARY_HEADER_VALID));
    assert!(state.status.backup_usable());

    repair(&mut disk, &mut state).unwrap();
    write(&mut disk, &state).unwrap();

    let reloaded = gptrecon::load(&mut disk).unwrap();
    assert!(reloaded.both_valid());
    assert_eq!(reloaded.primary_header.entries_lba, 2);
    assert_eq!(reloaded.primary_header, state.primary_header);
}

#[test]
fn disk_grown_relocates_backup_on_repair() {
    let disk = build_disk(4096);
    let mut bytes = disk.into_bytes();
    bytes.resize((8192u64 << SECTOR_LOG2) as usize, 0);
    let old_backup_off = (4095u64 << SECTOR_LOG2) as usize;
    bytes[old_backup_off..old_backup_off + 512].fill(0);
    let mut grown = MemDisk::from_bytes(bytes, SECTOR_LOG2);

    let mut state = gptrecon::load(&mut grown).unwrap();
    assert!(state.status.primary_usable());
    assert!(!state.status.backup_usable());

    repair(&mut grown, &mut state).unwrap();
    assert_eq!(state.primary_header.alternate_lba, 8191);
    assert_eq!(state.backup_header.header_lba, 8191);
    assert_eq!(state.backup_header.entries_lba, 8191 - ENTRIES_SECTORS);
}

#[test]
fn primary_backup_disagreement_reports_out_of_sync() {
    let mut disk = build_disk(4096);
    let off = disk.sector_to_byte(1).unwrap();
    let raw = disk.read(off, 92).unwrap();
    let mut primary = GptHeader::decode(&raw).unwrap();
    primary.disk_guid = uuid::Uuid::new_v4();
    primary.crc32 = primary.crc32_with_field_zeroed();
    disk.write(off, &primary.encode()).unwrap();

    let err = gptrecon::load(&mut disk).unwrap_err();
    assert!(matches!(err, GptError::BadPartitionTable(msg) if msg.contains("out of sync")));
}

#[test]
fn backup_beyond_disk_end_warns_but_still_writes_primary() {
    let mut disk = build_disk(4096);
    let mut state = gptrecon::load(&mut disk).unwrap();
    state.backup_header.header_lba = 9000;

    write(&mut disk, &state).unwrap();

    let primary_off = disk.sector_to_byte(1).unwrap();
    let raw = disk.read(primary_off, 92).unwrap();
    let reloaded_primary = GptHeader::decode(&raw).unwrap();
    assert_eq!(reloaded_primary, state.primary_header);
}

#[test]
fn non_protective_mbr_with_valid_gpt_still_loads() {
    let mut disk = build_disk(4096);
    let mut sector0 = disk.read(0, 512).unwrap();
    sector0[450] = 0x83; // first partition record's type byte
    disk.write(0, &sector0).unwrap();

    let state = gptrecon::load(&mut disk).unwrap();
    assert!(!state.status.contains(Status::PROTECTIVE_MBR));
    assert!(state.both_valid());
}

#[test]
fn backup_at_exactly_total_sectors_minus_one_is_accepted() {
    let disk = build_disk(4096);
    assert_eq!(disk.total_sectors(), Some(4096));
    let mut disk = disk;
    let state = gptrecon::load(&mut disk).unwrap();
    assert_eq!(state.backup_header.header_lba, 4095);
    assert!(state.both_valid());
}

#[test]
fn file_disk_round_trips_through_a_real_tempfile() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let disk = build_disk(4096);
    std::fs::write(tmp.path(), disk.as_bytes()).unwrap();

    let mut file_disk = FileDisk::open(tmp.path(), true, SECTOR_LOG2).unwrap();
    let mut state = gptrecon::load(&mut file_disk).unwrap();
    assert!(state.both_valid());

    repair(&mut file_disk, &mut state).unwrap();
    write(&mut file_disk, &state).unwrap();

    let mut reopened = FileDisk::open(tmp.path(), false, SECTOR_LOG2).unwrap();
    let reloaded = gptrecon::load(&mut reopened).unwrap();
    assert_eq!(reloaded.primary_header, state.primary_header);
    assert_eq!(reloaded.entries, state.entries);
}
