use super::{Cluster, FatResult, FatType, bs::PartitionDescriptor, le_u16, le_u32};
use crate::cache::SectorSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// FAT16/32 table entry, as seen by a reader following a chain.
pub enum FatEntry {
    /// Used cluster, pointing to the next cluster in the chain
    Next(Cluster),
    /// Last cluster in the chain (also used for values 0 and 1)
    EndOfChain,
    /// Reserved value below the format filler
    Unusual,
    /// Value written by some formatters in the reserved band
    FormatFiller,
    /// Bad cluster
    Bad,
}

impl FatEntry {
    #[must_use]
    /// Classifies a raw table value.
    ///
    /// FAT32 entries only have 28 significant bits, the upper four are ignored.
    pub const fn classify(raw: u32, fat_type: FatType) -> Self {
        let value = raw & fat_type.entry_mask();
        let boundary = fat_type.end_of_chain_boundary();
        if value < 2 || value >= boundary {
            Self::EndOfChain
        } else if value == boundary - 1 {
            Self::Bad
        } else if value == boundary - 2 {
            Self::FormatFiller
        } else if value >= boundary - 8 {
            Self::Unusual
        } else {
            Self::Next(Cluster::new(value))
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_end_of_chain(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    #[must_use]
    #[inline]
    pub const fn next(&self) -> Option<Cluster> {
        match self {
            Self::Next(cluster) => Some(*cluster),
            _ => None,
        }
    }
}

/// Reads the FAT entry of `cluster` through the sector cache.
///
/// Reserved values end the chain: they are reported, not treated as errors.
pub fn read_entry<S: SectorSource + ?Sized>(
    source: &mut S,
    partition: &PartitionDescriptor,
    cluster: Cluster,
) -> FatResult<FatEntry> {
    let (sector, offset) = partition.fat_entry_location(cluster);
    let data = source.possibly_load(sector)?;

    let fat_type = partition.fat_type();
    let raw = match fat_type {
        FatType::Fat16 => u32::from(le_u16(data, offset)),
        FatType::Fat32 => le_u32(data, offset),
    };

    let entry = FatEntry::classify(raw, fat_type);
    match entry {
        FatEntry::Unusual => {
            crate::warn!("unusual FAT value {:#x} after cluster {}", raw, cluster.value());
        }
        FatEntry::FormatFiller => {
            crate::warn!("format filler {:#x} after cluster {}", raw, cluster.value());
        }
        FatEntry::Bad => {
            crate::warn!("bad sector marker after cluster {}", cluster.value());
        }
        FatEntry::Next(_) | FatEntry::EndOfChain => {}
    }
    Ok(entry)
}
