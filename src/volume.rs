//! Ties the device, geometry, FAT table and directory together into the
//! five user-visible operations: list, create, write, read, delete.

use log::debug;

use crate::device::BlockDevice;
use crate::dir::{encode_name, now_fat_stamp, DirEntry, Directory, EntryKind};
use crate::error::{FatModError, Result};
use crate::fat::FatTable;
use crate::geometry::Geometry;
use crate::ATTR_ARCHIVE;

/// One line of `list`'s output, per spec.md §4.4: a regular file, the
/// volume label, or an entry kind this crate never creates but must
/// still surface rather than silently merge into the file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    File { name: String, size: u32 },
    VolumeLabel { name: String },
    Unsupported { name: String, kind: &'static str },
}

/// An open volume: a device plus the geometry parsed from its boot
/// sector. Every operation borrows the device mutably for its duration
/// and releases it when the call returns, mirroring spec.md §5's
/// acquire-at-entry, release-on-every-exit resource contract.
pub struct Volume<D: BlockDevice> {
    device: D,
    geometry: Geometry,
}

/// Opens the root directory's chain over a borrowed device. A free
/// function rather than a `Volume` method: called with `&mut self.device`
/// directly from each public method below, so the borrow checker sees it
/// as touching only that field, not `self` as a whole — `self.geometry`
/// (copied into `geometry` before the call) stays readable afterward.
fn load_directory<D: BlockDevice>(
    device: &mut D,
    geometry: Geometry,
) -> Result<(Directory, FatTable<'_, D>)> {
    let mut fat = FatTable::new(device, geometry);
    let dir = Directory::load(&mut fat, &geometry)?;
    Ok((dir, fat))
}

impl<D: BlockDevice> Volume<D> {
    /// Reads the boot sector and parses the volume's geometry.
    pub fn open(mut device: D) -> Result<Volume<D>> {
        let boot_sector = device.read_sector(0)?;
        let geometry = Geometry::parse(&boot_sector)?;
        Ok(Volume { device, geometry })
    }

    /// Lists every live root-directory entry, in on-disk slot order,
    /// classified by kind: regular files, the volume label, and any
    /// unsupported entry kind (long-name fragment, subdirectory) this
    /// crate cannot represent as a file but must not hide either.
    pub fn list(&mut self) -> Result<Vec<ListEntry>> {
        let geometry = self.geometry;
        let (dir, _fat) = load_directory(&mut self.device, geometry)?;
        Ok(dir
            .iterate()
            .map(|e| match e.kind() {
                EntryKind::File => ListEntry::File {
                    name: e.name_display(),
                    size: e.file_size,
                },
                EntryKind::VolumeLabel => ListEntry::VolumeLabel {
                    name: e.name_display(),
                },
                EntryKind::LongName => ListEntry::Unsupported {
                    name: e.name_display(),
                    kind: "long name fragment",
                },
                EntryKind::Subdirectory => ListEntry::Unsupported {
                    name: e.name_display(),
                    kind: "subdirectory",
                },
            })
            .collect())
    }

    /// Creates a zero-length file named `name`. Fails with
    /// `AlreadyExists` if a live entry already has that name, and with
    /// `DirectoryFull` if the root directory's single cluster has no free
    /// slot left — the root never grows beyond it, per spec.md §6.
    pub fn create(&mut self, name: &str) -> Result<()> {
        let encoded = encode_name(name)?;
        let geometry = self.geometry;
        let (mut dir, mut fat) = load_directory(&mut self.device, geometry)?;
        if dir.find(name)?.is_some() {
            return Err(FatModError::AlreadyExists);
        }

        let slot = dir.find_free_slot().ok_or(FatModError::DirectoryFull)?;

        let (date, time, tenth) = now_fat_stamp();
        let entry = DirEntry {
            name: encoded,
            attr: ATTR_ARCHIVE,
            create_time_tenth: tenth,
            create_time: time,
            create_date: date,
            last_access_date: date,
            write_time: time,
            write_date: date,
            first_cluster: 0,
            file_size: 0,
        };
        dir.write_entry(&mut fat, &geometry, slot, &entry)?;
        debug!("created {} at slot {}", name, slot);
        Ok(())
    }

    /// Writes `data` at `offset` in `name`'s file, extending the file
    /// (and allocating clusters) as needed. `offset` must not exceed the
    /// file's current size: writing strictly past the end without first
    /// reaching it is rejected as `InvalidOffset`, per spec.md §4.5.
    pub fn write(&mut self, name: &str, offset: u32, data: &[u8]) -> Result<()> {
        let geometry = self.geometry;
        let (mut dir, mut fat) = load_directory(&mut self.device, geometry)?;
        let (slot, mut entry) = dir.find(name)?.ok_or(FatModError::NotFound)?;
        if offset > entry.file_size {
            return Err(FatModError::InvalidOffset);
        }

        let cluster_size = geometry.cluster_size as u64;
        let end = offset as u64 + data.len() as u64;

        let mut chain = if entry.first_cluster == 0 {
            Vec::new()
        } else {
            fat.walk_chain(entry.first_cluster)?
        };

        let clusters_needed = if end == 0 {
            0
        } else {
            ((end - 1) / cluster_size + 1) as usize
        };
        if clusters_needed > chain.len() {
            let to_allocate = clusters_needed - chain.len();
            let tail = chain.last().copied();
            let new_clusters =
                fat.allocate_and_link(tail, to_allocate, geometry.root_first_cluster)?;
            if chain.is_empty() {
                entry.first_cluster = new_clusters[0];
            }
            chain.extend(new_clusters);
        }

        let mut written = 0usize;
        let mut pos = offset as u64;
        while written < data.len() {
            let cluster_index = (pos / cluster_size) as usize;
            let offset_in_cluster = (pos % cluster_size) as usize;
            let cluster = chain[cluster_index];
            let chunk_len =
                ((cluster_size as usize - offset_in_cluster)).min(data.len() - written);
            let byte_offset = geometry.cluster_offset(cluster) + offset_in_cluster as u64;
            fat.device_mut()
                .write_range(byte_offset, &data[written..written + chunk_len])?;
            written += chunk_len;
            pos += chunk_len as u64;
        }

        if end > entry.file_size as u64 {
            entry.file_size = end as u32;
        }
        let (date, time, _tenth) = now_fat_stamp();
        entry.write_date = date;
        entry.write_time = time;
        entry.last_access_date = date;
        dir.write_entry(&mut fat, &geometry, slot, &entry)?;
        debug!("wrote {} bytes to {} at offset {}", data.len(), name, offset);
        Ok(())
    }

    /// Reads the whole of `name`'s file into memory.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let geometry = self.geometry;
        let (dir, mut fat) = load_directory(&mut self.device, geometry)?;
        let (_slot, entry) = dir.find(name)?.ok_or(FatModError::NotFound)?;
        if entry.file_size == 0 || entry.first_cluster == 0 {
            return Ok(Vec::new());
        }

        let chain = fat.walk_chain(entry.first_cluster)?;
        let cluster_size = geometry.cluster_size as usize;
        let mut out = Vec::with_capacity(entry.file_size as usize);
        for cluster in chain {
            let offset = geometry.cluster_offset(cluster);
            out.extend(fat.device_mut().read_cluster(offset, cluster_size)?);
        }
        out.truncate(entry.file_size as usize);
        Ok(out)
    }

    /// Deletes `name`: frees its cluster chain, then tombstones its
    /// directory slot, matching spec.md §4.5's ordering. A failure
    /// partway through the chain-free leaves the entry still reachable
    /// by name with only part of its chain freed, so the operation can
    /// be retried rather than leaking the remaining clusters.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let geometry = self.geometry;
        let (mut dir, mut fat) = load_directory(&mut self.device, geometry)?;
        let (slot, entry) = dir.find(name)?.ok_or(FatModError::NotFound)?;
        if entry.first_cluster != 0 {
            fat.free_chain(entry.first_cluster)?;
        }
        dir.tombstone(&mut fat, &geometry, slot)?;
        debug!("deleted {}", name);
        Ok(())
    }
}
