//! Root directory access: 8.3 name encode/decode and the 32-byte
//! directory entry layout.
//!
//! FAT32 fixes the root directory's size at zero: its clusters are a
//! chain like any other, but the chain's length is derived from how many
//! clusters have been walked, never stored separately. This module reads
//! the whole root chain into memory, since spec.md's Non-goals rule out
//! subdirectories and the volumes in scope are small enough that this is
//! the simplest correct approach, the same way the teacher's in-memory
//! `VirtFile` buffers load a cluster at a time rather than memory-mapping
//! the image.

use chrono::{Datelike, Local, Timelike};

use crate::device::BlockDevice;
use crate::error::{FatModError, Result};
use crate::fat::FatTable;
use crate::geometry::Geometry;
use crate::{
    read_le_u16, read_le_u32, write_le_u16, write_le_u32, ATTR_ARCHIVE, ATTR_DIRECTORY,
    ATTR_LONG_NAME, ATTR_VOLUME_ID, DIRENT_SIZE, DIR_ENTRY_DELETED, DIR_ENTRY_FREE_REST,
};

const OFF_NAME: usize = 0;
const OFF_ATTR: usize = 11;
const OFF_CREATE_TIME_TENTH: usize = 13;
const OFF_CREATE_TIME: usize = 14;
const OFF_CREATE_DATE: usize = 16;
const OFF_LAST_ACCESS_DATE: usize = 18;
const OFF_FIRST_CLUSTER_HI: usize = 20;
const OFF_WRITE_TIME: usize = 22;
const OFF_WRITE_DATE: usize = 24;
const OFF_FIRST_CLUSTER_LO: usize = 26;
const OFF_FILE_SIZE: usize = 28;

/// One 32-byte root directory entry, decoded.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attr: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub last_access_date: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster: u32,
    pub file_size: u32,
}

impl DirEntry {
    pub fn parse(bytes: &[u8; DIRENT_SIZE]) -> DirEntry {
        let mut name = [0u8; 11];
        name.copy_from_slice(&bytes[OFF_NAME..OFF_NAME + 11]);
        let first_cluster_hi = read_le_u16(&bytes[OFF_FIRST_CLUSTER_HI..]) as u32;
        let first_cluster_lo = read_le_u16(&bytes[OFF_FIRST_CLUSTER_LO..]) as u32;
        DirEntry {
            name,
            attr: bytes[OFF_ATTR],
            create_time_tenth: bytes[OFF_CREATE_TIME_TENTH],
            create_time: read_le_u16(&bytes[OFF_CREATE_TIME..]),
            create_date: read_le_u16(&bytes[OFF_CREATE_DATE..]),
            last_access_date: read_le_u16(&bytes[OFF_LAST_ACCESS_DATE..]),
            write_time: read_le_u16(&bytes[OFF_WRITE_TIME..]),
            write_date: read_le_u16(&bytes[OFF_WRITE_DATE..]),
            first_cluster: (first_cluster_hi << 16) | first_cluster_lo,
            file_size: read_le_u32(&bytes[OFF_FILE_SIZE..]),
        }
    }

    pub fn serialize(&self) -> [u8; DIRENT_SIZE] {
        let mut bytes = [0u8; DIRENT_SIZE];
        bytes[OFF_NAME..OFF_NAME + 11].copy_from_slice(&self.name);
        bytes[OFF_ATTR] = self.attr;
        bytes[OFF_CREATE_TIME_TENTH] = self.create_time_tenth;
        write_le_u16(&mut bytes[OFF_CREATE_TIME..], self.create_time);
        write_le_u16(&mut bytes[OFF_CREATE_DATE..], self.create_date);
        write_le_u16(&mut bytes[OFF_LAST_ACCESS_DATE..], self.last_access_date);
        write_le_u16(&mut bytes[OFF_WRITE_TIME..], self.write_time);
        write_le_u16(&mut bytes[OFF_WRITE_DATE..], self.write_date);
        write_le_u16(&mut bytes[OFF_FIRST_CLUSTER_HI..], (self.first_cluster >> 16) as u16);
        write_le_u16(&mut bytes[OFF_FIRST_CLUSTER_LO..], self.first_cluster as u16);
        write_le_u32(&mut bytes[OFF_FILE_SIZE..], self.file_size);
        bytes
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == DIR_ENTRY_FREE_REST || self.name[0] == DIR_ENTRY_DELETED
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == DIR_ENTRY_DELETED
    }

    pub fn is_end_marker(&self) -> bool {
        self.name[0] == DIR_ENTRY_FREE_REST
    }

    /// Classifies a live (non-free, non-deleted) slot by attribute. The
    /// root directory this crate creates only ever writes `File` entries,
    /// but an opened image may carry any of the others, and each needs
    /// distinct handling in `list` and must never be mistaken for a
    /// regular file by `find`.
    pub fn kind(&self) -> EntryKind {
        if self.attr & ATTR_LONG_NAME == ATTR_LONG_NAME {
            EntryKind::LongName
        } else if self.attr & ATTR_VOLUME_ID != 0 {
            EntryKind::VolumeLabel
        } else if self.attr & ATTR_DIRECTORY != 0 {
            EntryKind::Subdirectory
        } else {
            EntryKind::File
        }
    }

    pub fn name_display(&self) -> String {
        decode_name(&self.name)
    }
}

/// What a live directory slot represents, per spec.md §3's attribute
/// byte and §4.4's `list`/`find` requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    VolumeLabel,
    LongName,
    Subdirectory,
    File,
}

/// Encodes a user-supplied name into the fixed 11-byte 8.3 field:
/// uppercased, split on the first `.`, each side padded with spaces,
/// restricted to `[A-Z0-9_-]`. Anything else is `InvalidName`.
pub fn encode_name(name: &str) -> Result<[u8; 11]> {
    if name.is_empty() {
        return Err(FatModError::InvalidName(name.to_string()));
    }
    let upper = name.to_ascii_uppercase();
    let (stem, ext) = match upper.split_once('.') {
        Some((s, e)) => (s, e),
        None => (upper.as_str(), ""),
    };
    if stem.is_empty() || stem.len() > 8 || ext.len() > 3 {
        return Err(FatModError::InvalidName(name.to_string()));
    }
    let valid = |c: char| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-';
    if !stem.chars().all(valid) || !ext.chars().all(valid) {
        return Err(FatModError::InvalidName(name.to_string()));
    }

    let mut out = [b' '; 11];
    out[..stem.len()].copy_from_slice(stem.as_bytes());
    out[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    Ok(out)
}

/// Reconstructs a display name from the 11-byte field: trims trailing
/// spaces off the stem and extension and rejoins with `.` if there is an
/// extension.
pub fn decode_name(raw: &[u8; 11]) -> String {
    let stem = std::str::from_utf8(&raw[0..8]).unwrap_or("").trim_end();
    let ext = std::str::from_utf8(&raw[8..11]).unwrap_or("").trim_end();
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// FAT packed date: bits 15-9 year (since 1980), 8-5 month, 4-0 day.
fn pack_date(year: i32, month: u32, day: u32) -> u16 {
    let year_field = ((year - 1980).max(0) as u16) & 0x7F;
    ((year_field << 9) | ((month as u16 & 0xF) << 5) | (day as u16 & 0x1F)) as u16
}

/// FAT packed time: bits 15-11 hour, 10-5 minute, 4-0 seconds/2.
fn pack_time(hour: u32, minute: u32, second: u32) -> u16 {
    (((hour as u16 & 0x1F) << 11) | ((minute as u16 & 0x3F) << 5) | ((second / 2) as u16 & 0x1F))
        as u16
}

/// Splits the host wall clock into a FAT (date, time, tenths) triple for
/// stamping a directory entry's creation/write/access fields.
pub fn now_fat_stamp() -> (u16, u16, u8) {
    let now = Local::now();
    let date = pack_date(now.year(), now.month(), now.day());
    let time = pack_time(now.hour(), now.minute(), now.second());
    let tenth = ((now.second() % 2) * 100 + now.nanosecond() / 10_000_000) as u8;
    (date, time, tenth)
}

/// The root directory, held as one contiguous buffer spanning every
/// cluster in its chain.
pub struct Directory {
    pub first_cluster: u32,
    clusters: Vec<u32>,
    buffer: Vec<u8>,
    cluster_size: usize,
}

impl Directory {
    /// Loads the root directory's full cluster chain into memory.
    pub fn load<D: BlockDevice>(fat: &mut FatTable<D>, geometry: &Geometry) -> Result<Directory> {
        let clusters = fat.walk_chain(geometry.root_first_cluster)?;
        let cluster_size = geometry.cluster_size as usize;
        let mut buffer = Vec::with_capacity(clusters.len() * cluster_size);
        for &cluster in &clusters {
            let offset = geometry.cluster_offset(cluster);
            buffer.extend(fat.device_mut().read_cluster(offset, cluster_size)?);
        }
        Ok(Directory {
            first_cluster: geometry.root_first_cluster,
            clusters,
            buffer,
            cluster_size,
        })
    }

    fn entry_count(&self) -> usize {
        self.buffer.len() / DIRENT_SIZE
    }

    fn entry_at(&self, index: usize) -> DirEntry {
        let mut raw = [0u8; DIRENT_SIZE];
        raw.copy_from_slice(&self.buffer[index * DIRENT_SIZE..(index + 1) * DIRENT_SIZE]);
        DirEntry::parse(&raw)
    }

    /// Iterates over every live (non-deleted) entry, of any kind; callers
    /// that only want regular files must filter on `kind()` themselves —
    /// `list` needs to see volume labels and unsupported entry kinds too.
    pub fn iterate(&self) -> impl Iterator<Item = DirEntry> + '_ {
        (0..self.entry_count())
            .map(|i| self.entry_at(i))
            .take_while(|e| !e.is_end_marker())
            .filter(|e| !e.is_deleted())
    }

    /// Finds the unique live regular-file entry (`attr = 0x20`) by name,
    /// returning its slot index alongside it. A volume label, long-name
    /// fragment, or subdirectory entry never matches, even if its name
    /// happens to collide.
    pub fn find(&self, name: &str) -> Result<Option<(usize, DirEntry)>> {
        let encoded = encode_name(name)?;
        for i in 0..self.entry_count() {
            let entry = self.entry_at(i);
            if entry.is_end_marker() {
                break;
            }
            if !entry.is_deleted() && entry.attr == ATTR_ARCHIVE && entry.name == encoded {
                return Ok(Some((i, entry)));
            }
        }
        Ok(None)
    }

    /// Finds the first deleted or free slot in the single root cluster.
    /// Returns `None` once all 32 slots are occupied; the root directory
    /// never grows beyond its one cluster, per spec.md §6.
    pub fn find_free_slot(&self) -> Option<usize> {
        (0..self.entry_count()).find(|&i| self.entry_at(i).is_free())
    }

    /// Writes `entry` into slot `index` and flushes just that slot's
    /// cluster, the same granularity the block device's `write_range`
    /// exposes.
    pub fn write_entry<D: BlockDevice>(
        &mut self,
        fat: &mut FatTable<D>,
        geometry: &Geometry,
        index: usize,
        entry: &DirEntry,
    ) -> Result<()> {
        let serialized = entry.serialize();
        self.buffer[index * DIRENT_SIZE..(index + 1) * DIRENT_SIZE].copy_from_slice(&serialized);

        let cluster_index = (index * DIRENT_SIZE) / self.cluster_size;
        let offset_in_cluster = (index * DIRENT_SIZE) % self.cluster_size;
        let cluster = self.clusters[cluster_index];
        let offset = geometry.cluster_offset(cluster) + offset_in_cluster as u64;
        fat.device_mut().write_range(offset, &serialized)
    }

    /// Marks slot `index` deleted (`0xE5` sentinel) without disturbing
    /// its neighbors, per spec.md's tombstone-delete semantics.
    pub fn tombstone<D: BlockDevice>(
        &mut self,
        fat: &mut FatTable<D>,
        geometry: &Geometry,
        index: usize,
    ) -> Result<()> {
        let mut entry = self.entry_at(index);
        entry.name[0] = DIR_ENTRY_DELETED;
        self.write_entry(fat, geometry, index, &entry)
    }
}
