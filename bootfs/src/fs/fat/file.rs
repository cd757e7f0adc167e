//! Sequential reader over a cluster chain.
use super::{
    Cluster, FatError, FatResult, Sector,
    bs::PartitionDescriptor,
    fat::{FatEntry, read_entry},
};
use crate::cache::SectorSource;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Nothing has been loaded yet.
    Uninitialized,
    /// A sector is current.
    Positioned,
    /// The chain or the declared size is exhausted.
    EndOfChain,
}

/// How the reader finds the sector after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    /// Through the FAT.
    Chain {
        cluster: Cluster,
        sector_in_cluster: u32,
        /// Clusters followed so far, bounded by the size of the volume.
        hops: u32,
    },
    /// Through a contiguous run, `left` sectors after the current one.
    Region { left: u32 },
}

/// Streams the bytes of a file or directory.
///
/// Only one sector is borrowed from the source at a time, and the FAT is only
/// consulted when the reader actually crosses into the next cluster.
pub struct ChainReader<'a, S: SectorSource + ?Sized> {
    source: &'a mut S,
    partition: &'a PartitionDescriptor,
    state: ChainState,
    walk: Walk,
    sector: Sector,
    /// Byte offset in the current sector.
    offset: usize,
    sector_size: usize,
    /// Size from the directory record, 0 to read until the end of the chain.
    declared_size: u32,
    position: u64,
}

impl<'a, S: SectorSource + ?Sized> ChainReader<'a, S> {
    /// Creates a reader that loads nothing until the first read.
    pub fn new(
        source: &'a mut S,
        partition: &'a PartitionDescriptor,
        start: Cluster,
        declared_size: u32,
    ) -> Self {
        let sector_size = source.sector_size();
        Self {
            source,
            partition,
            state: ChainState::Uninitialized,
            walk: Walk::Chain {
                cluster: start,
                sector_in_cluster: 0,
                hops: 0,
            },
            sector: partition.cluster_to_sector(start),
            offset: 0,
            sector_size,
            declared_size,
            position: 0,
        }
    }

    /// Opens the chain starting at `start` and loads its first sector.
    ///
    /// A start cluster that holds no data (0 for an empty file) gives a reader
    /// that is already at the end.
    pub fn open(
        source: &'a mut S,
        partition: &'a PartitionDescriptor,
        start: Cluster,
        declared_size: u32,
    ) -> FatResult<Self> {
        let mut reader = Self::new(source, partition, start, declared_size);
        reader.start()?;
        Ok(reader)
    }

    /// Opens the fixed FAT16 root directory region.
    pub fn open_root_region(
        source: &'a mut S,
        partition: &'a PartitionDescriptor,
    ) -> FatResult<Self> {
        let sector_size = source.sector_size();
        let mut reader = Self {
            source,
            partition,
            state: ChainState::Uninitialized,
            walk: Walk::Region {
                left: partition.root_dir_sectors().saturating_sub(1),
            },
            sector: partition.root_dir_start(),
            offset: 0,
            sector_size,
            declared_size: 0,
            position: 0,
        };
        reader.start()?;
        Ok(reader)
    }

    #[must_use]
    #[inline]
    pub const fn state(&self) -> ChainState {
        self.state
    }

    #[must_use]
    #[inline]
    /// Bytes consumed so far.
    pub const fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    #[inline]
    pub const fn declared_size(&self) -> u32 {
        self.declared_size
    }

    #[must_use]
    #[inline]
    /// The cluster being read, `None` for the fixed root region.
    pub const fn cluster(&self) -> Option<Cluster> {
        match self.walk {
            Walk::Chain { cluster, .. } => Some(cluster),
            Walk::Region { .. } => None,
        }
    }

    fn check_cluster(&self, cluster: Cluster) -> FatResult<()> {
        let count = self.partition.cluster_count();
        if count > 0 && cluster.value() > count + 1 {
            return Err(FatError::InvalidCluster);
        }
        Ok(())
    }

    fn start(&mut self) -> FatResult<()> {
        let empty = match self.walk {
            Walk::Chain { cluster, .. } => {
                if cluster.is_valid(self.partition.fat_type()) {
                    self.check_cluster(cluster)?;
                    false
                } else {
                    true
                }
            }
            Walk::Region { .. } => self.partition.root_dir_sectors() == 0,
        };

        if empty {
            self.state = ChainState::EndOfChain;
            return Ok(());
        }
        self.source.possibly_load(self.sector)?;
        self.state = ChainState::Positioned;
        Ok(())
    }

    /// Moves to the next sector once the current one is used up.
    fn advance(&mut self) -> FatResult<()> {
        let spc = u32::from(self.partition.sectors_per_cluster());

        let next = match self.walk {
            Walk::Region { left: 0 } => None,
            Walk::Region { left } => Some((Walk::Region { left: left - 1 }, self.sector.offset(1))),
            Walk::Chain {
                cluster,
                sector_in_cluster,
                hops,
            } if sector_in_cluster + 1 < spc => Some((
                Walk::Chain {
                    cluster,
                    sector_in_cluster: sector_in_cluster + 1,
                    hops,
                },
                self.sector.offset(1),
            )),
            Walk::Chain { cluster, hops, .. } => {
                match read_entry(&mut *self.source, self.partition, cluster)? {
                    FatEntry::Next(next) => {
                        self.check_cluster(next)?;
                        let hops = hops + 1;
                        let count = self.partition.cluster_count();
                        if count > 0 && hops >= count {
                            crate::error!("cluster chain loops after cluster {}", cluster.value());
                            return Err(FatError::InvalidCluster);
                        }
                        let walk = Walk::Chain {
                            cluster: next,
                            sector_in_cluster: 0,
                            hops,
                        };
                        Some((walk, self.partition.cluster_to_sector(next)))
                    }
                    _ => None,
                }
            }
        };

        match next {
            Some((walk, sector)) => {
                self.walk = walk;
                self.sector = sector;
                self.offset = 0;
            }
            None => self.state = ChainState::EndOfChain,
        }
        Ok(())
    }

    /// Returns how many of `wanted` bytes can be taken from the current sector.
    fn available(&mut self, wanted: usize) -> FatResult<usize> {
        if self.state == ChainState::Uninitialized {
            self.start()?;
        }
        if self.state == ChainState::EndOfChain {
            return Ok(0);
        }

        let mut n = wanted;
        if self.declared_size > 0 {
            let left = u64::from(self.declared_size).saturating_sub(self.position);
            if left == 0 {
                self.state = ChainState::EndOfChain;
                return Ok(0);
            }
            n = n.min(usize::try_from(left).unwrap_or(usize::MAX));
        }

        if self.offset == self.sector_size {
            self.advance()?;
            if self.state == ChainState::EndOfChain {
                return Ok(0);
            }
        }
        Ok(n.min(self.sector_size - self.offset))
    }

    /// Reads at most the rest of the current sector into `buf`.
    ///
    /// Returns 0 at the end of the file.
    pub fn read(&mut self, buf: &mut [u8]) -> FatResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.available(buf.len())?;
        if n == 0 {
            return Ok(0);
        }

        let data = self.source.possibly_load(self.sector)?;
        buf[..n].copy_from_slice(&data[self.offset..self.offset + n]);
        self.offset += n;
        self.position += n as u64;
        Ok(n)
    }

    /// Fills `buf` entirely.
    ///
    /// Returns `false` if the file ended before the first byte, and
    /// [`FatError::Truncated`] if it ended in the middle of `buf`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> FatResult<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(FatError::Truncated)
                };
            }
            filled += n;
        }
        Ok(true)
    }

    /// Appends everything left to `out`, returning the number of bytes added.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> FatResult<usize> {
        let start = out.len();
        if self.declared_size > 0 {
            let left = u64::from(self.declared_size).saturating_sub(self.position);
            out.reserve(usize::try_from(left).unwrap_or(0));
        }

        loop {
            let len = out.len();
            out.resize(len + self.sector_size, 0);
            match self.read(&mut out[len..]) {
                Ok(0) => {
                    out.truncate(len);
                    break;
                }
                Ok(n) => out.truncate(len + n),
                Err(err) => {
                    out.truncate(len);
                    return Err(err);
                }
            }
        }
        Ok(out.len() - start)
    }

    /// Moves `count` bytes forward without copying them.
    ///
    /// Returns fewer than `count` if the file ends first.
    pub fn skip(&mut self, count: usize) -> FatResult<usize> {
        let mut skipped = 0;
        while skipped < count {
            let n = self.available(count - skipped)?;
            if n == 0 {
                break;
            }
            self.offset += n;
            self.position += n as u64;
            skipped += n;
        }
        Ok(skipped)
    }
}
