//! End-to-end scenarios against a synthesized 8 MiB default-geometry
//! image, driving the library API the way the binary's `cli` module
//! would, but directly: the same shape as the teacher's own
//! std-mode examples, which call `FileSystem`/`VirtFile` methods
//! straight from their test bodies rather than spawning a process.
//!
//! Scenario numbering and byte counts follow spec.md §8's S1-S6 against
//! the same 8 MiB default-geometry image it specifies.

use std::io::{Read, Seek, SeekFrom, Write};

use fatmod::device::FileDevice;
use fatmod::error::FatModError;
use fatmod::volume::{ListEntry, Volume};

const SECTOR_SIZE: u64 = 512;
const SECTORS_PER_CLUSTER: u64 = 2;
const RESERVED_SECTORS: u64 = 32;
const FAT_LENGTH_SECTORS: u64 = 64;
const TOTAL_SECTORS: u64 = 16384; // 8 MiB / 512
const END_OF_CHAIN: u32 = 0x0FFF_FFFF;

fn write_le_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn write_le_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Builds a fresh 8 MiB image: a valid boot sector, a FAT1 region with
/// only the root directory's cluster (2) marked end-of-chain, and a
/// zeroed (empty) root directory cluster.
fn build_image() -> std::fs::File {
    let total_bytes = (TOTAL_SECTORS * SECTOR_SIZE) as usize;
    let mut image = vec![0u8; total_bytes];

    write_le_u16(&mut image, 11, SECTOR_SIZE as u16);
    image[13] = SECTORS_PER_CLUSTER as u8;
    write_le_u16(&mut image, 14, RESERVED_SECTORS as u16);
    image[16] = 1; // num_fats
    write_le_u32(&mut image, 36, FAT_LENGTH_SECTORS as u32);
    write_le_u32(&mut image, 44, 2); // root_first_cluster
    write_le_u32(&mut image, 32, TOTAL_SECTORS as u32);
    write_le_u16(&mut image, 510, 0xAA55);

    let fat_region_offset = RESERVED_SECTORS * SECTOR_SIZE;
    write_le_u32(&mut image, fat_region_offset as usize + 2 * 4, END_OF_CHAIN);

    let mut file = tempfile::tempfile().unwrap();
    file.write_all(&image).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file
}

/// Opens a fresh volume alongside a second handle onto the same backing
/// file, for tests that need to inspect raw FAT entries or directory
/// bytes the library API itself has no reason to expose.
fn open_volume() -> (Volume<FileDevice>, std::fs::File) {
    let file = build_image();
    let inspector = file.try_clone().unwrap();
    let device = FileDevice::new(file, SECTOR_SIZE as usize);
    (Volume::open(device).unwrap(), inspector)
}

fn fat_entry(inspector: &mut std::fs::File, cluster: u32) -> u32 {
    let offset = RESERVED_SECTORS * SECTOR_SIZE + cluster as u64 * 4;
    inspector.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = [0u8; 4];
    inspector.read_exact(&mut buf).unwrap();
    u32::from_le_bytes(buf) & 0x0FFF_FFFF
}

fn dir_slot_byte0(inspector: &mut std::fs::File, slot: usize) -> u8 {
    let data_region_offset = RESERVED_SECTORS * SECTOR_SIZE + FAT_LENGTH_SECTORS * SECTOR_SIZE;
    let offset = data_region_offset + (slot * 32) as u64;
    inspector.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = [0u8; 1];
    inspector.read_exact(&mut buf).unwrap();
    buf[0]
}

fn file_entries(items: Vec<ListEntry>) -> Vec<(String, u32)> {
    items
        .into_iter()
        .filter_map(|e| match e {
            ListEntry::File { name, size } => Some((name, size)),
            _ => None,
        })
        .collect()
}

#[test]
fn s1_create_on_empty_volume() {
    let (mut volume, _inspector) = open_volume();
    assert_eq!(file_entries(volume.list().unwrap()), Vec::new());
    volume.create("TEST.TXT").unwrap();
    assert_eq!(
        file_entries(volume.list().unwrap()),
        vec![("TEST.TXT".to_string(), 0)]
    );
}

#[test]
fn s2_write_2000_bytes_of_a() {
    let (mut volume, mut inspector) = open_volume();
    volume.create("TEST.TXT").unwrap();
    let data = vec![b'A'; 2000];
    volume.write("TEST.TXT", 0, &data).unwrap();

    assert_eq!(
        file_entries(volume.list().unwrap()),
        vec![("TEST.TXT".to_string(), 2000)]
    );
    assert_eq!(volume.read("TEST.TXT").unwrap(), data);

    // 2000 bytes over a 1024-byte cluster needs exactly two clusters;
    // the first data clusters handed out are 3 and 4 since root (2) is
    // already occupied and this is the volume's first allocation.
    assert_eq!(fat_entry(&mut inspector, 3), 4);
    assert_eq!(fat_entry(&mut inspector, 4), END_OF_CHAIN);
}

#[test]
fn s3_append_500_bytes_of_b() {
    let (mut volume, mut inspector) = open_volume();
    volume.create("TEST.TXT").unwrap();
    volume.write("TEST.TXT", 0, &vec![b'A'; 2000]).unwrap();
    volume.write("TEST.TXT", 2000, &vec![b'B'; 500]).unwrap();

    assert_eq!(
        file_entries(volume.list().unwrap()),
        vec![("TEST.TXT".to_string(), 2500)]
    );
    let data = volume.read("TEST.TXT").unwrap();
    assert_eq!(&data[..2000], &vec![b'A'; 2000][..]);
    assert_eq!(&data[2000..2500], &vec![b'B'; 500][..]);

    assert_eq!(fat_entry(&mut inspector, 3), 4);
    assert_eq!(fat_entry(&mut inspector, 4), 5);
    assert_eq!(fat_entry(&mut inspector, 5), END_OF_CHAIN);
}

#[test]
fn s4_write_past_current_size_is_rejected() {
    let (mut volume, mut inspector) = open_volume();
    volume.create("TEST.TXT").unwrap();
    volume.write("TEST.TXT", 0, &vec![b'A'; 2000]).unwrap();
    volume.write("TEST.TXT", 2000, &vec![b'B'; 500]).unwrap();

    let err = volume.write("TEST.TXT", 3000, &[67]).unwrap_err();
    assert!(matches!(err, FatModError::InvalidOffset));

    assert_eq!(
        file_entries(volume.list().unwrap()),
        vec![("TEST.TXT".to_string(), 2500)]
    );
    assert_eq!(fat_entry(&mut inspector, 5), END_OF_CHAIN);
}

#[test]
fn s5_delete_reclaims_chain_and_tombstones_slot() {
    let (mut volume, mut inspector) = open_volume();
    volume.create("TEST.TXT").unwrap();
    volume.write("TEST.TXT", 0, &vec![b'A'; 2000]).unwrap();
    volume.write("TEST.TXT", 2000, &vec![b'B'; 500]).unwrap();

    volume.delete("TEST.TXT").unwrap();

    assert_eq!(file_entries(volume.list().unwrap()), Vec::new());
    for cluster in [3u32, 4, 5] {
        assert_eq!(fat_entry(&mut inspector, cluster), 0);
    }
    assert_eq!(dir_slot_byte0(&mut inspector, 0), 0xE5);
}

#[test]
fn s6_create_twice_reports_already_exists() {
    let (mut volume, _inspector) = open_volume();
    volume.create("A.B").unwrap();
    let err = volume.create("A.B").unwrap_err();
    assert!(matches!(err, FatModError::AlreadyExists));
    assert_eq!(
        file_entries(volume.list().unwrap()),
        vec![("A.B".to_string(), 0)]
    );
}

#[test]
fn write_spanning_multiple_clusters_allocates_and_reads_back() {
    let (mut volume, _inspector) = open_volume();
    volume.create("BIG.BIN").unwrap();
    let data = vec![0x7Au8; 3000]; // cluster_size is 1024, so this spans 3 clusters
    volume.write("BIG.BIN", 0, &data).unwrap();
    let read_back = volume.read("BIG.BIN").unwrap();
    assert_eq!(read_back, data);
}

#[test]
fn append_at_exact_current_size_extends_the_file() {
    let (mut volume, _inspector) = open_volume();
    volume.create("APPEND.TXT").unwrap();
    volume.write("APPEND.TXT", 0, b"abc").unwrap();
    volume.write("APPEND.TXT", 3, b"def").unwrap();
    assert_eq!(volume.read("APPEND.TXT").unwrap(), b"abcdef");
}

#[test]
fn delete_of_missing_file_reports_not_found() {
    let (mut volume, _inspector) = open_volume();
    let err = volume.delete("NOPE.TXT").unwrap_err();
    assert!(matches!(err, FatModError::NotFound));
}

#[test]
fn create_rejects_invalid_name() {
    let (mut volume, _inspector) = open_volume();
    let err = volume.create("bad name!.txt").unwrap_err();
    assert!(matches!(err, FatModError::InvalidName(_)));
}

#[test]
fn directory_full_once_32_slots_are_used() {
    let (mut volume, _inspector) = open_volume();
    for i in 0..32 {
        volume.create(&format!("F{}.TXT", i)).unwrap();
    }
    let err = volume.create("ONE.MORE").unwrap_err();
    assert!(matches!(err, FatModError::DirectoryFull));
}
