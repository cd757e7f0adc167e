//! Tranquil, the bounded sector cache.
//!
//! A fixed pool of sector-sized buffers. Sectors are mapped to buffers on demand and,
//! once the pool is full, a uniformly random resident sector is ousted to make room.
//! The cache is read-only: there is no dirty state and no write-back.
use crate::{BlockDevice, BlockDeviceError, rand::Lcg};
use alloc::{vec, vec::Vec};
use hashbrown::HashMap;
use thiserror::Error;

mod occupancy;
pub use occupancy::OccupancyMap;

/// A sector number on the underlying device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sector(u32);

impl Sector {
    #[must_use]
    #[inline]
    pub const fn new(sector: u32) -> Self {
        Self(sector)
    }

    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the sector `count` sectors further on the device.
    #[must_use]
    #[inline]
    pub const fn offset(self, count: u32) -> Self {
        Self(self.0.wrapping_add(count))
    }
}

impl core::fmt::Display for Sector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sector {}", self.0)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    #[error("Device error: {0}")]
    Device(#[from] BlockDeviceError),
    #[error("No cache slot available")]
    NoFreeSlot,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Something that hands out sector contents by sector number.
///
/// The FAT code depends on this capability only, never on a device or a concrete cache.
pub trait SectorSource {
    /// Size of a sector in bytes.
    fn sector_size(&self) -> usize;

    /// Returns the contents of `sector`, loading it if it is not resident.
    fn possibly_load(&mut self, sector: Sector) -> CacheResult<&[u8]>;
}

impl<T: SectorSource + ?Sized> SectorSource for &mut T {
    #[inline]
    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    #[inline]
    fn possibly_load(&mut self, sector: Sector) -> CacheResult<&[u8]> {
        (**self).possibly_load(sector)
    }
}

/// Cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of sector buffers in the pool.
    capacity: usize,
    /// Random probes into the occupancy map before falling back to a linear scan.
    probes: usize,
    /// Seed of the slot picker.
    seed: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    pub const DEFAULT_CAPACITY: usize = 32;
    pub const DEFAULT_PROBES: usize = 3;
    pub const DEFAULT_SEED: u32 = 0x5EED_CAFE;

    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            probes: Self::DEFAULT_PROBES,
            seed: Self::DEFAULT_SEED,
        }
    }

    #[must_use]
    #[inline]
    /// Sets the number of slots. A capacity of zero is raised to one.
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_probes(mut self, probes: usize) -> Self {
        self.probes = probes;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    #[inline]
    pub const fn probes(&self) -> usize {
        self.probes
    }

    #[must_use]
    #[inline]
    pub const fn seed(&self) -> u32 {
        self.seed
    }
}

/// Hit/miss/ouster counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    hits: u64,
    misses: u64,
    ousters: u64,
}

impl CacheStats {
    #[must_use]
    #[inline]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    #[inline]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    #[must_use]
    #[inline]
    /// Number of sectors evicted to make room for another.
    pub const fn ousters(&self) -> u64 {
        self.ousters
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    /// Fraction of lookups that were hits, 0 when there were none.
    pub fn hit_ratio(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

impl core::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "hits={} misses={} ratio={:.2} ousters={}",
            self.hits,
            self.misses,
            self.hit_ratio(),
            self.ousters
        )
    }
}

/// Fixed-capacity sector cache over a block device.
pub struct SectorCache<D: BlockDevice> {
    device: D,
    /// `capacity * D::BLOCK_SIZE` bytes, slot `i` at `i * D::BLOCK_SIZE`.
    buffers: Vec<u8>,
    occupancy: OccupancyMap,
    mapping: HashMap<Sector, usize>,
    rng: Lcg,
    probes: usize,
    stats: CacheStats,
}

impl<D: BlockDevice> SectorCache<D> {
    #[must_use]
    pub fn new(device: D, config: CacheConfig) -> Self {
        let capacity = config.capacity().max(1);
        Self {
            device,
            buffers: vec![0; capacity * D::BLOCK_SIZE],
            occupancy: OccupancyMap::new(capacity),
            mapping: HashMap::with_capacity(capacity),
            rng: Lcg::new(config.seed()),
            probes: config.probes(),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.occupancy.len()
    }

    #[must_use]
    #[inline]
    /// Number of sectors currently resident.
    pub fn resident(&self) -> usize {
        self.mapping.len()
    }

    #[must_use]
    #[inline]
    pub fn contains(&self, sector: Sector) -> bool {
        self.mapping.contains_key(&sector)
    }

    #[must_use]
    #[inline]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Reports the counters, optionally resetting them.
    pub fn dump_stats(&mut self, clear: bool) -> CacheStats {
        let stats = self.stats;
        crate::info!("sector cache: {}", stats);
        if clear {
            self.stats = CacheStats::default();
        }
        stats
    }

    #[inline]
    /// Gives access to the device, bypassing the cache.
    pub const fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    #[inline]
    pub fn into_device(self) -> D {
        self.device
    }

    /// Drops every resident sector. Counters are kept.
    pub fn invalidate(&mut self) {
        self.mapping.clear();
        self.occupancy.clear_all();
    }

    fn slot_range(slot: usize) -> core::ops::Range<usize> {
        slot * D::BLOCK_SIZE..(slot + 1) * D::BLOCK_SIZE
    }

    /// Finds a free slot, ousting a random resident sector if the pool is full.
    fn claim_slot(&mut self) -> CacheResult<usize> {
        let capacity = self.capacity();

        for _ in 0..self.probes {
            let slot = self.rng.below(capacity);
            if !self.occupancy.is_set(slot) {
                return Ok(slot);
            }
        }

        if let Some(slot) = self.occupancy.first_clear() {
            return Ok(slot);
        }

        self.stats.ousters += 1;
        let victim_slot = self.rng.below(capacity);
        let victim = self
            .mapping
            .iter()
            .find_map(|(&sector, &slot)| (slot == victim_slot).then_some(sector))
            .ok_or(CacheError::NoFreeSlot)?;
        self.mapping.remove(&victim);
        self.occupancy.clear(victim_slot);
        crate::debug!("sector cache: ousted {} from slot {}", victim, victim_slot);

        Ok(victim_slot)
    }
}

impl<D: BlockDevice> SectorSource for SectorCache<D> {
    #[inline]
    fn sector_size(&self) -> usize {
        D::BLOCK_SIZE
    }

    fn possibly_load(&mut self, sector: Sector) -> CacheResult<&[u8]> {
        if let Some(&slot) = self.mapping.get(&sector) {
            self.stats.hits += 1;
            return Ok(&self.buffers[Self::slot_range(slot)]);
        }
        self.stats.misses += 1;

        let slot = self.claim_slot()?;
        self.occupancy.set(slot);
        self.mapping.insert(sector, slot);

        let range = Self::slot_range(slot);
        if let Err(err) = self
            .device
            .read_sectors(&mut self.buffers[range.clone()], sector.value())
        {
            self.mapping.remove(&sector);
            self.occupancy.clear(slot);
            crate::warn!("sector cache: failed to load {}: {}", sector, err);
            return Err(err.into());
        }

        Ok(&self.buffers[range])
    }
}
