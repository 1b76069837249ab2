//! File Allocation Table access: entry decode/encode, chain walking,
//! allocation, and release.

use log::debug;

use crate::device::BlockDevice;
use crate::error::{FatModError, Result};
use crate::geometry::Geometry;
use crate::{
    read_le_u32, write_le_u32, FAT_BAD_CLUSTER, FAT_END_OF_CHAIN, FAT_END_OF_CHAIN_MIN, FAT_FREE,
    FAT_MAX_NEXT, FAT_MIN_NEXT, FAT_RESERVED_MAX, FAT_RESERVED_MIN,
};

/// A decoded 28-bit FAT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Next(u32),
    Reserved,
    Bad,
    EndOfChain,
}

impl FatEntry {
    fn decode(raw: u32) -> FatEntry {
        let value = raw & crate::FAT_ENTRY_MASK;
        match value {
            FAT_FREE => FatEntry::Free,
            FAT_MIN_NEXT..=FAT_MAX_NEXT => FatEntry::Next(value),
            FAT_RESERVED_MIN..=FAT_RESERVED_MAX => FatEntry::Reserved,
            v if v == FAT_BAD_CLUSTER => FatEntry::Bad,
            FAT_END_OF_CHAIN_MIN..=FAT_END_OF_CHAIN => FatEntry::EndOfChain,
            _ => FatEntry::Reserved,
        }
    }

    fn encode(self) -> u32 {
        match self {
            FatEntry::Free => FAT_FREE,
            FatEntry::Next(c) => c & crate::FAT_ENTRY_MASK,
            FatEntry::Reserved => FAT_RESERVED_MIN,
            FatEntry::Bad => FAT_BAD_CLUSTER,
            FatEntry::EndOfChain => FAT_END_OF_CHAIN,
        }
    }
}

/// FAT1 accessor: every read/write goes through here so sentinel decoding
/// stays in one place. FAT2 (and beyond) is never touched, per spec.md's
/// single-FAT-only decision recorded in DESIGN.md.
pub struct FatTable<'a, D: BlockDevice> {
    device: &'a mut D,
    geometry: Geometry,
}

impl<'a, D: BlockDevice> FatTable<'a, D> {
    pub fn new(device: &'a mut D, geometry: Geometry) -> Self {
        Self { device, geometry }
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.device
    }

    pub fn read_entry(&mut self, cluster: u32) -> Result<FatEntry> {
        let offset = self.geometry.fat_entry_offset(cluster);
        let raw = self.device.read_range(offset, 4)?;
        Ok(FatEntry::decode(read_le_u32(&raw)))
    }

    pub fn write_entry(&mut self, cluster: u32, entry: FatEntry) -> Result<()> {
        let offset = self.geometry.fat_entry_offset(cluster);
        let mut buf = [0u8; 4];
        write_le_u32(&mut buf, entry.encode());
        self.device.write_range(offset, &buf)
    }

    /// Walks the chain from `start`, yielding each cluster number in
    /// order. Stops at `EndOfChain`. Any cluster pointer out of the
    /// volume's usable range, a visited cluster seen twice, or a chain
    /// longer than the volume's total usable clusters raises `BadChain`.
    pub fn walk_chain(&mut self, start: u32) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = start;
        loop {
            if current < 2 || current >= self.geometry.usable_clusters + 2 {
                return Err(FatModError::BadChain(format!(
                    "cluster {} out of range",
                    current
                )));
            }
            if !seen.insert(current) {
                return Err(FatModError::BadChain(format!(
                    "cluster {} visited twice",
                    current
                )));
            }
            out.push(current);
            if out.len() as u64 > self.geometry.usable_clusters as u64 {
                return Err(FatModError::BadChain("chain longer than volume".into()));
            }
            match self.read_entry(current)? {
                FatEntry::Next(next) => current = next,
                FatEntry::EndOfChain => break,
                other => {
                    return Err(FatModError::BadChain(format!(
                        "chain terminated by unexpected entry {:?}",
                        other
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Linear scan for the first free cluster at or after `root_cluster + 1`.
    pub fn find_free(&mut self, root_cluster: u32) -> Result<u32> {
        for cluster in (root_cluster + 1)..(self.geometry.usable_clusters + 2) {
            if self.read_entry(cluster)? == FatEntry::Free {
                return Ok(cluster);
            }
        }
        Err(FatModError::NoSpace)
    }

    /// Allocates `count` free clusters, links them into a chain starting
    /// after `prev` (or as a fresh chain if `prev` is `None`), and returns
    /// the cluster numbers in order. On running out of free clusters
    /// partway through, the clusters already allocated are left linked
    /// and terminated (no rollback), matching spec.md §4.3's
    /// no-rollback-on-partial-failure contract; the caller still sees
    /// `NoSpace`.
    pub fn allocate_and_link(
        &mut self,
        prev: Option<u32>,
        count: usize,
        root_cluster: u32,
    ) -> Result<Vec<u32>> {
        let mut allocated = Vec::with_capacity(count);
        let mut tail = prev;
        let mut search_from = root_cluster;

        for _ in 0..count {
            let next = loop {
                let candidate = self.find_free(search_from)?;
                search_from = candidate;
                break candidate;
            };
            self.write_entry(next, FatEntry::EndOfChain)?;
            if let Some(t) = tail {
                self.write_entry(t, FatEntry::Next(next))?;
            }
            allocated.push(next);
            tail = Some(next);
        }
        debug!("allocated clusters {:?}", allocated);
        Ok(allocated)
    }

    /// Frees every cluster in the chain starting at `start`, marking each
    /// `Free` in turn. Halts and surfaces the error at the first I/O
    /// failure rather than attempting to undo already-freed clusters.
    pub fn free_chain(&mut self, start: u32) -> Result<()> {
        let chain = self.walk_chain(start)?;
        for cluster in chain {
            self.write_entry(cluster, FatEntry::Free)?;
        }
        Ok(())
    }
}
