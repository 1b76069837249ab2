//! Boot sector parsing.
//!
//! Reads the BIOS Parameter Block fields the rest of the crate needs and
//! derives the region offsets from them. Fields are read at named byte
//! offsets with explicit little-endian conversions rather than laid over
//! a `#[repr(packed)]` host struct: a cast depends on the host's
//! endianness and on nothing reordering the fields, neither of which a
//! parser reading someone else's disk image should assume.

use log::warn;

use crate::error::{FatModError, Result};
use crate::{
    read_le_u16, read_le_u32, DEFAULT_NUM_FATS, DEFAULT_RESERVED_SECTORS, DEFAULT_ROOT_CLUSTER,
    DEFAULT_SECTORS_PER_CLUSTER, DEFAULT_SECTOR_SIZE, MAX_USABLE_CLUSTERS,
};

const OFF_BYTES_PER_SECTOR: usize = 11;
const OFF_SECTORS_PER_CLUSTER: usize = 13;
const OFF_RESERVED_SECTOR_CNT: usize = 14;
const OFF_NUM_FATS: usize = 16;
const OFF_TOTAL_SECTORS_16: usize = 19;
const OFF_TOTAL_SECTORS_32: usize = 32;
const OFF_FAT_SIZE_32: usize = 36;
const OFF_ROOT_CLUSTER: usize = 44;
const OFF_BOOT_SIGNATURE: usize = 510;

const BOOT_SIGNATURE: u16 = 0xAA55;

/// Non-default geometry fields are warned about on both the `log` facade
/// and the listing sink (stdout), since the boot sector is parsed before
/// any command-specific output and the warning must be visible whichever
/// command was actually run.
fn warn_line(msg: String) {
    warn!("{}", msg);
    println!("WARNING: {}", msg);
}

/// The geometry derived from a volume's boot sector: everything
/// [`crate::fat`] and [`crate::dir`] need to turn a cluster or sector
/// number into a byte offset.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub sector_size: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub fat_length_sectors: u32,
    pub root_first_cluster: u32,
    pub total_sectors: u32,
    pub fat_region_offset: u64,
    pub data_region_offset: u64,
    pub cluster_size: u32,
    pub usable_clusters: u32,
}

impl Geometry {
    /// Parses a full boot sector (at least 512 bytes). Non-default fields
    /// (anything other than the values spec.md calls out as the expected
    /// default) are warned about, not rejected: this crate supports the
    /// full legal FAT32 parameter space, it just flags the unusual case.
    pub fn parse(boot_sector: &[u8]) -> Result<Geometry> {
        if boot_sector.len() < 512 {
            return Err(FatModError::InvalidGeometry(format!(
                "boot sector too short: {} bytes",
                boot_sector.len()
            )));
        }

        let signature = read_le_u16(&boot_sector[OFF_BOOT_SIGNATURE..]);
        if signature != BOOT_SIGNATURE {
            return Err(FatModError::InvalidGeometry(format!(
                "bad boot signature 0x{:04X}",
                signature
            )));
        }

        let sector_size = read_le_u16(&boot_sector[OFF_BYTES_PER_SECTOR..]);
        if sector_size == 0 {
            return Err(FatModError::InvalidGeometry(
                "sector size is zero".to_string(),
            ));
        }
        let sectors_per_cluster = boot_sector[OFF_SECTORS_PER_CLUSTER];
        if sectors_per_cluster == 0 {
            return Err(FatModError::InvalidGeometry(
                "sectors per cluster is zero".to_string(),
            ));
        }
        let reserved_sectors = read_le_u16(&boot_sector[OFF_RESERVED_SECTOR_CNT..]);
        let num_fats = boot_sector[OFF_NUM_FATS];
        if num_fats == 0 {
            return Err(FatModError::InvalidGeometry(
                "number of FATs is zero".to_string(),
            ));
        }
        let fat_length_sectors = read_le_u32(&boot_sector[OFF_FAT_SIZE_32..]);
        let root_first_cluster = read_le_u32(&boot_sector[OFF_ROOT_CLUSTER..]);

        let total_sectors_16 = read_le_u16(&boot_sector[OFF_TOTAL_SECTORS_16..]) as u32;
        let total_sectors_32 = read_le_u32(&boot_sector[OFF_TOTAL_SECTORS_32..]);
        let total_sectors = if total_sectors_16 != 0 {
            total_sectors_16
        } else {
            total_sectors_32
        };

        if sector_size != DEFAULT_SECTOR_SIZE {
            warn_line(format!(
                "non-default sector size: {} (expected {})",
                sector_size, DEFAULT_SECTOR_SIZE
            ));
        }
        if sectors_per_cluster != DEFAULT_SECTORS_PER_CLUSTER {
            warn_line(format!(
                "non-default sectors per cluster: {} (expected {})",
                sectors_per_cluster, DEFAULT_SECTORS_PER_CLUSTER
            ));
        }
        if num_fats != DEFAULT_NUM_FATS {
            warn_line(format!(
                "non-default FAT count: {} (expected {}); only FAT1 is ever addressed",
                num_fats, DEFAULT_NUM_FATS
            ));
        }
        if root_first_cluster != DEFAULT_ROOT_CLUSTER {
            warn_line(format!(
                "non-default root cluster: {} (expected {})",
                root_first_cluster, DEFAULT_ROOT_CLUSTER
            ));
        }
        if reserved_sectors != DEFAULT_RESERVED_SECTORS {
            warn_line(format!(
                "non-default reserved sector count: {} (expected {})",
                reserved_sectors, DEFAULT_RESERVED_SECTORS
            ));
        }

        let sector_size_u64 = sector_size as u64;
        let fat_region_offset = reserved_sectors as u64 * sector_size_u64;
        let fat_region_sectors = fat_length_sectors as u64 * num_fats as u64;
        let data_region_offset = fat_region_offset + fat_region_sectors * sector_size_u64;
        let cluster_size_u64 = sectors_per_cluster as u64 * sector_size_u64;
        let cluster_size = u32::try_from(cluster_size_u64).map_err(|_| {
            FatModError::InvalidGeometry("cluster size overflows u32".to_string())
        })?;

        let data_region_sectors = (total_sectors as u64)
            .saturating_sub(reserved_sectors as u64)
            .saturating_sub(fat_region_sectors);
        let data_clusters = if sectors_per_cluster == 0 {
            0
        } else {
            data_region_sectors / sectors_per_cluster as u64
        };
        // The FAT region itself can address fewer clusters than the data
        // region has room for (an undersized FAT relative to the volume's
        // total sectors); the smaller of the two bounds the real
        // addressable cluster count, matching spec.md §3's three-way min.
        let fat_addressable_clusters =
            (fat_length_sectors as u64 * sector_size_u64 / 4).saturating_sub(2);
        let usable_clusters = u32::try_from(
            data_clusters
                .min(fat_addressable_clusters)
                .min(MAX_USABLE_CLUSTERS as u64),
        )
        .unwrap_or(u32::MAX);

        Ok(Geometry {
            sector_size,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            fat_length_sectors,
            root_first_cluster,
            total_sectors,
            fat_region_offset,
            data_region_offset,
            cluster_size,
            usable_clusters,
        })
    }

    /// Byte offset of the first byte of `cluster` in the data region.
    /// Only meaningful for `cluster >= 2`.
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        self.data_region_offset + (cluster as u64 - 2) * self.cluster_size as u64
    }

    /// Byte offset of FAT1's entry for `cluster` (4 bytes, little-endian).
    pub fn fat_entry_offset(&self, cluster: u32) -> u64 {
        self.fat_region_offset + cluster as u64 * 4
    }
}
