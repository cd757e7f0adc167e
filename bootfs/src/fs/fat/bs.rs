//! Boot sector and BIOS Parameter Block (BPB) decoding.
use super::{Cluster, FatError, FatResult, FatType, Sector, le_u16, le_u32, mbr::MasterBootRecord};
use crate::BlockDevice;
use alloc::{string::String, vec};

/// BPB fields shared by FAT16 and FAT32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootParamBlock {
    /// Bytes per sector.
    ///
    /// This field is either 512, 1024, 2048, or 4096.
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    fat_count: u8,
    /// Number of 32-byte entries in the fixed root directory (0 on FAT32).
    root_entries: u16,
    /// Total sectors if it fits in 16 bits, else 0.
    total_sectors: u16,
    /// Example: 0xF8 for fixed disk and 0xF0 for removable disk.
    media_descriptor: u8,
    /// Sectors per FAT.
    ///
    /// DO NOT USE THIS FIELD FOR FAT32 FILE SYSTEMS.
    sectors_per_fat: u16,
    sectors_per_track: u16,
    heads: u16,
    hidden_sectors: u32,
    /// Used when `total_sectors` is 0.
    total_sectors_large: u32,
}

impl BootParamBlock {
    fn decode(bs: &[u8]) -> Self {
        Self {
            bytes_per_sector: le_u16(bs, 11),
            sectors_per_cluster: bs[13],
            reserved_sectors: le_u16(bs, 14),
            fat_count: bs[16],
            root_entries: le_u16(bs, 17),
            total_sectors: le_u16(bs, 19),
            media_descriptor: bs[21],
            sectors_per_fat: le_u16(bs, 22),
            sectors_per_track: le_u16(bs, 24),
            heads: le_u16(bs, 26),
            hidden_sectors: le_u32(bs, 28),
            total_sectors_large: le_u32(bs, 32),
        }
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_sector(&self) -> u16 {
        self.bytes_per_sector
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.sectors_per_cluster
    }

    #[must_use]
    #[inline]
    pub const fn reserved_sectors(&self) -> u16 {
        self.reserved_sectors
    }

    #[must_use]
    #[inline]
    pub const fn fat_count(&self) -> u8 {
        self.fat_count
    }

    #[must_use]
    #[inline]
    pub const fn root_entries(&self) -> u16 {
        self.root_entries
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors in the file system.
    pub const fn total_sectors(&self) -> u32 {
        if self.total_sectors != 0 {
            self.total_sectors as u32
        } else {
            self.total_sectors_large
        }
    }

    #[must_use]
    #[inline]
    pub const fn media_descriptor(&self) -> u8 {
        self.media_descriptor
    }

    #[must_use]
    #[inline]
    /// Sectors per FAT as stored in the shared block, 0 on FAT32.
    pub const fn sectors_per_fat(&self) -> u16 {
        self.sectors_per_fat
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_track(&self) -> u16 {
        self.sectors_per_track
    }

    #[must_use]
    #[inline]
    pub const fn heads(&self) -> u16 {
        self.heads
    }

    #[must_use]
    #[inline]
    pub const fn hidden_sectors(&self) -> u32 {
        self.hidden_sectors
    }

    #[must_use]
    #[inline]
    /// Sectors occupied by the fixed root directory.
    pub const fn root_dir_sectors(&self) -> u32 {
        if self.bytes_per_sector == 0 {
            return 0;
        }
        (self.root_entries as u32 * 32).div_ceil(self.bytes_per_sector as u32)
    }
}

/// Trailing block shared by both extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootParamBlockEnd {
    drive_number: u8,
    /// Must be 0x29 for the following fields to be valid.
    boot_signature: u8,
    volume_id: u32,
    volume_label: [u8; 11],
    /// "FAT16   ", "FAT32   "...
    fs_type: [u8; 8],
}

impl BootParamBlockEnd {
    pub const BOOT_SIGNATURE: u8 = 0x29;

    fn decode(bs: &[u8], offset: usize) -> Self {
        let mut volume_label = [0; 11];
        volume_label.copy_from_slice(&bs[offset + 7..offset + 18]);
        let mut fs_type = [0; 8];
        fs_type.copy_from_slice(&bs[offset + 18..offset + 26]);
        Self {
            drive_number: bs[offset],
            boot_signature: bs[offset + 2],
            volume_id: le_u32(bs, offset + 3),
            volume_label,
            fs_type,
        }
    }

    fn validate(&self, fat_type: FatType) -> FatResult<()> {
        let fat16 = fat_type == FatType::Fat16;
        if self.boot_signature != Self::BOOT_SIGNATURE {
            return Err(if fat16 {
                FatError::BadFat16BootSignature
            } else {
                FatError::BadFat32BootSignature
            });
        }
        if !self.fs_type.starts_with(b"FAT") {
            return Err(if fat16 {
                FatError::BadFat16FilesystemType
            } else {
                FatError::BadFat32FilesystemType
            });
        }
        Ok(())
    }

    #[must_use]
    #[inline]
    pub const fn drive_number(&self) -> u8 {
        self.drive_number
    }

    #[must_use]
    #[inline]
    pub const fn volume_id(&self) -> u32 {
        self.volume_id
    }

    #[must_use]
    #[inline]
    pub const fn volume_label(&self) -> &[u8; 11] {
        &self.volume_label
    }

    #[must_use]
    #[inline]
    pub const fn fs_type(&self) -> &[u8; 8] {
        &self.fs_type
    }
}

/// FAT32-only BPB fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fat32Extension {
    sectors_per_fat_large: u32,
    flags: u16,
    version: u16,
    root_cluster: u32,
    fs_info_sector: u16,
    backup_boot_sector: u16,
    end: BootParamBlockEnd,
}

impl Fat32Extension {
    fn decode(bs: &[u8]) -> Self {
        Self {
            sectors_per_fat_large: le_u32(bs, 36),
            flags: le_u16(bs, 40),
            version: le_u16(bs, 42),
            root_cluster: le_u32(bs, 44),
            fs_info_sector: le_u16(bs, 48),
            backup_boot_sector: le_u16(bs, 50),
            end: BootParamBlockEnd::decode(bs, 64),
        }
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_fat(&self) -> u32 {
        self.sectors_per_fat_large
    }

    #[must_use]
    #[inline]
    pub const fn flags(&self) -> u16 {
        self.flags
    }

    #[must_use]
    #[inline]
    pub const fn version(&self) -> u16 {
        self.version
    }

    #[must_use]
    #[inline]
    pub const fn root_cluster(&self) -> Cluster {
        Cluster::new(self.root_cluster)
    }

    #[must_use]
    #[inline]
    pub const fn fs_info_sector(&self) -> u16 {
        self.fs_info_sector
    }

    #[must_use]
    #[inline]
    pub const fn backup_boot_sector(&self) -> u16 {
        self.backup_boot_sector
    }
}

/// Width-specific part of the BPB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Fat16(BootParamBlockEnd),
    Fat32(Fat32Extension),
}

impl Extension {
    #[must_use]
    #[inline]
    pub const fn fat_type(&self) -> FatType {
        match self {
            Self::Fat16(_) => FatType::Fat16,
            Self::Fat32(_) => FatType::Fat32,
        }
    }

    #[must_use]
    #[inline]
    pub const fn end(&self) -> &BootParamBlockEnd {
        match self {
            Self::Fat16(end) => end,
            Self::Fat32(ext) => &ext.end,
        }
    }
}

/// A decoded FAT boot sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    bpb: BootParamBlock,
    extension: Extension,
}

impl BootSector {
    pub const SIZE: usize = 512;

    /// Decodes and validates a boot sector.
    pub fn decode(bs: &[u8]) -> FatResult<Self> {
        if bs.len() < Self::SIZE {
            return Err(FatError::Truncated);
        }
        let bpb = BootParamBlock::decode(bs);

        let extension = if bpb.sectors_per_fat() > 0 && bpb.root_entries() > 0 {
            Extension::Fat16(BootParamBlockEnd::decode(bs, 36))
        } else {
            Extension::Fat32(Fat32Extension::decode(bs))
        };
        extension.end().validate(extension.fat_type())?;

        Ok(Self { bpb, extension })
    }

    #[must_use]
    #[inline]
    pub const fn bpb(&self) -> &BootParamBlock {
        &self.bpb
    }

    #[must_use]
    #[inline]
    pub const fn extension(&self) -> &Extension {
        &self.extension
    }

    #[must_use]
    #[inline]
    pub const fn fat_type(&self) -> FatType {
        self.extension.fat_type()
    }
}

/// Where the filesystem lives on the device and how it is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sector_count: u16,
    fat_count: u8,
    /// Sectors of a single FAT copy.
    sectors_per_fat: u32,
    /// On FAT32, the first FAT sector. On FAT16, the first sector of the fixed root region.
    fat_origin: u32,
    /// Sectors of all FAT copies together.
    fat_size: u32,
    root_cluster: Cluster,
    /// Size of the fixed root directory region, 0 on FAT32.
    root_dir_sectors: u32,
    data_sectors: u32,
    /// Start of the partition on the device, in sectors.
    unused_sectors: u32,
    is_fat16: bool,
    volume_label: String,
}

impl PartitionDescriptor {
    /// Computes the layout of `bs`, which lives `unused_sectors` sectors into the device.
    ///
    /// Fails with `InvalidBootSector` if any region would end past sector `u32::MAX`.
    pub fn from_boot_sector(bs: &BootSector, unused_sectors: u32) -> FatResult<Self> {
        let bpb = bs.bpb();
        let reserved = u32::from(bpb.reserved_sectors());
        let fat_count = u32::from(bpb.fat_count());
        let is_fat16 = bs.fat_type() == FatType::Fat16;

        let (sectors_per_fat, fat_origin, root_cluster, root_dir_sectors) = match bs.extension() {
            Extension::Fat32(ext) => {
                let fat_origin = reserved
                    .checked_add(bpb.hidden_sectors())
                    .and_then(|s| s.checked_add(unused_sectors));
                (ext.sectors_per_fat(), fat_origin, ext.root_cluster(), 0)
            }
            Extension::Fat16(_) => {
                let spf = u32::from(bpb.sectors_per_fat());
                let fat_origin = unused_sectors
                    .checked_add(reserved)
                    .and_then(|s| s.checked_add(fat_count * spf));
                (spf, fat_origin, Cluster::new(2), bpb.root_dir_sectors())
            }
        };
        let fat_origin = fat_origin.ok_or(FatError::InvalidBootSector)?;
        let fat_size = fat_count
            .checked_mul(sectors_per_fat)
            .ok_or(FatError::InvalidBootSector)?;

        // Sectors in front of the data region, counted from the boot sector.
        let overhead = reserved
            .checked_add(fat_size)
            .and_then(|s| s.checked_add(root_dir_sectors))
            .ok_or(FatError::InvalidBootSector)?;
        let data_sectors = bpb.total_sectors().saturating_sub(overhead);

        let data_start = if is_fat16 {
            fat_origin.checked_add(root_dir_sectors)
        } else {
            fat_origin.checked_add(fat_size)
        };
        if data_start
            .and_then(|start| start.checked_add(data_sectors))
            .is_none()
        {
            return Err(FatError::InvalidBootSector);
        }

        let label = &bs.extension().end().volume_label;
        let volume_label = String::from_utf8_lossy(label).trim_end().into();

        Ok(Self {
            bytes_per_sector: bpb.bytes_per_sector(),
            sectors_per_cluster: bpb.sectors_per_cluster(),
            reserved_sector_count: bpb.reserved_sectors(),
            fat_count: bpb.fat_count(),
            sectors_per_fat,
            fat_origin,
            fat_size,
            root_cluster,
            root_dir_sectors,
            data_sectors,
            unused_sectors,
            is_fat16,
            volume_label,
        })
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_sector(&self) -> u16 {
        self.bytes_per_sector
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.sectors_per_cluster
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    #[must_use]
    #[inline]
    pub const fn reserved_sector_count(&self) -> u16 {
        self.reserved_sector_count
    }

    #[must_use]
    #[inline]
    pub const fn fat_count(&self) -> u8 {
        self.fat_count
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_fat(&self) -> u32 {
        self.sectors_per_fat
    }

    #[must_use]
    #[inline]
    pub const fn fat_origin(&self) -> u32 {
        self.fat_origin
    }

    #[must_use]
    #[inline]
    pub const fn fat_size(&self) -> u32 {
        self.fat_size
    }

    #[must_use]
    #[inline]
    pub const fn root_cluster(&self) -> Cluster {
        self.root_cluster
    }

    #[must_use]
    #[inline]
    pub const fn root_dir_sectors(&self) -> u32 {
        self.root_dir_sectors
    }

    #[must_use]
    #[inline]
    pub const fn data_sectors(&self) -> u32 {
        self.data_sectors
    }

    #[must_use]
    #[inline]
    /// Number of clusters in the data region.
    pub const fn cluster_count(&self) -> u32 {
        if self.sectors_per_cluster == 0 {
            0
        } else {
            self.data_sectors / self.sectors_per_cluster as u32
        }
    }

    #[must_use]
    #[inline]
    pub const fn unused_sectors(&self) -> u32 {
        self.unused_sectors
    }

    #[must_use]
    #[inline]
    pub const fn is_fat16(&self) -> bool {
        self.is_fat16
    }

    #[must_use]
    #[inline]
    pub const fn fat_type(&self) -> FatType {
        if self.is_fat16 {
            FatType::Fat16
        } else {
            FatType::Fat32
        }
    }

    #[must_use]
    #[inline]
    pub fn volume_label(&self) -> &str {
        &self.volume_label
    }

    #[must_use]
    #[inline]
    /// First sector of the first FAT copy.
    pub const fn fat_start(&self) -> Sector {
        if self.is_fat16 {
            Sector::new(self.unused_sectors + self.reserved_sector_count as u32)
        } else {
            Sector::new(self.fat_origin)
        }
    }

    #[must_use]
    #[inline]
    /// First sector of the fixed FAT16 root directory region.
    pub const fn root_dir_start(&self) -> Sector {
        Sector::new(self.fat_origin)
    }

    #[must_use]
    #[inline]
    /// First sector of cluster 2.
    pub const fn data_start(&self) -> Sector {
        if self.is_fat16 {
            Sector::new(self.fat_origin + self.root_dir_sectors)
        } else {
            Sector::new(self.fat_origin + self.fat_size)
        }
    }

    #[must_use]
    #[inline]
    /// First sector of `cluster`. Only meaningful for `cluster >= 2`.
    pub const fn cluster_to_sector(&self, cluster: Cluster) -> Sector {
        let index = cluster.value().wrapping_sub(2);
        self.data_start()
            .offset(index.wrapping_mul(self.sectors_per_cluster as u32))
    }

    #[must_use]
    #[inline]
    /// Bytes per FAT entry.
    pub const fn fat_entry_size(&self) -> u32 {
        self.fat_type().entry_size()
    }

    #[must_use]
    /// Sector of the FAT holding the entry of `cluster`, and the entry's byte offset in it.
    pub const fn fat_entry_location(&self, cluster: Cluster) -> (Sector, usize) {
        let offset = cluster.value() as u64 * self.fat_entry_size() as u64;
        let bps = self.bytes_per_sector as u64;
        let sector = self.fat_start().offset((offset / bps) as u32);
        (sector, (offset % bps) as usize)
    }
}

/// Finds the FAT filesystem on `device` and computes its layout.
///
/// Sector 0 is either the boot sector itself or an MBR, in which case the boot sector
/// of the first partition is read.
pub fn locate_filesystem<D: BlockDevice>(device: &mut D) -> FatResult<PartitionDescriptor> {
    let block = D::BLOCK_SIZE;
    if block < BootSector::SIZE {
        return Err(FatError::UnsupportedSectorSize(block));
    }
    let mut sector = vec![0u8; block];

    device.read_sectors(&mut sector, 0)?;

    let unused_sectors = if matches!(sector[0], 0xE9 | 0xEB) {
        0
    } else {
        let partition = MasterBootRecord::decode(&sector)?.boot_partition()?;
        crate::debug!(
            "partition 1: type {:#04x} at LBA {}",
            partition.partition_type(),
            partition.start_lba()
        );
        device.read_sectors(&mut sector, partition.start_lba())?;
        partition.start_lba()
    };

    let bs = BootSector::decode(&sector)?;
    if usize::from(bs.bpb().bytes_per_sector()) != block {
        return Err(FatError::UnsupportedSectorSize(usize::from(
            bs.bpb().bytes_per_sector(),
        )));
    }
    if bs.bpb().sectors_per_cluster() == 0 {
        return Err(FatError::InvalidBootSector);
    }

    let descriptor = PartitionDescriptor::from_boot_sector(&bs, unused_sectors)?;
    crate::info!(
        "{:?} volume \"{}\": {} sectors/cluster, FAT at {}, data at {}, root cluster {}",
        descriptor.fat_type(),
        descriptor.volume_label(),
        descriptor.sectors_per_cluster(),
        descriptor.fat_start(),
        descriptor.data_start(),
        descriptor.root_cluster().value()
    );
    Ok(descriptor)
}
