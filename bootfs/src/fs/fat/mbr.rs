//! Master Boot Record decoding.
use super::{FatError, FatResult, le_u16, le_u32};

/// One of the four primary partition entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    /// 0x80 when the partition is bootable.
    status: u8,
    /// Partition type byte (0x0B/0x0C for FAT32, 0x04/0x06/0x0E for FAT16).
    partition_type: u8,
    /// First sector of the partition.
    start_lba: u32,
    /// Number of sectors in the partition.
    sector_count: u32,
}

impl PartitionEntry {
    pub const SIZE: usize = 16;

    fn decode(raw: &[u8]) -> Self {
        Self {
            status: raw[0],
            partition_type: raw[4],
            start_lba: le_u32(raw, 8),
            sector_count: le_u32(raw, 12),
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_bootable(&self) -> bool {
        self.status & 0x80 != 0
    }

    #[must_use]
    #[inline]
    pub const fn partition_type(&self) -> u8 {
        self.partition_type
    }

    #[must_use]
    #[inline]
    pub const fn start_lba(&self) -> u32 {
        self.start_lba
    }

    #[must_use]
    #[inline]
    pub const fn sector_count(&self) -> u32 {
        self.sector_count
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.partition_type == 0 || self.sector_count == 0
    }
}

boot_core::static_assert!(
    MasterBootRecord::PARTITION_TABLE_OFFSET + 4 * PartitionEntry::SIZE
        == MasterBootRecord::SIGNATURE_OFFSET
);

/// Decoded partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterBootRecord {
    partitions: [PartitionEntry; 4],
}

impl MasterBootRecord {
    pub const PARTITION_TABLE_OFFSET: usize = 446;
    pub const SIGNATURE_OFFSET: usize = 510;
    pub const SIGNATURE: u16 = 0xAA55;
    const SIZE: usize = 512;

    /// Decodes the partition table of `sector`.
    pub fn decode(sector: &[u8]) -> FatResult<Self> {
        if sector.len() < Self::SIZE {
            return Err(FatError::Truncated);
        }
        if le_u16(sector, Self::SIGNATURE_OFFSET) != Self::SIGNATURE {
            return Err(FatError::NoMbrSignature);
        }

        let entry = |i: usize| {
            let start = Self::PARTITION_TABLE_OFFSET + i * PartitionEntry::SIZE;
            PartitionEntry::decode(&sector[start..start + PartitionEntry::SIZE])
        };

        Ok(Self {
            partitions: [entry(0), entry(1), entry(2), entry(3)],
        })
    }

    #[must_use]
    #[inline]
    pub const fn partitions(&self) -> &[PartitionEntry; 4] {
        &self.partitions
    }

    /// The partition the filesystem is loaded from: always the first entry.
    pub const fn boot_partition(&self) -> FatResult<PartitionEntry> {
        let first = self.partitions[0];
        if first.is_empty() {
            Err(FatError::NoPartition)
        } else {
            Ok(first)
        }
    }
}
