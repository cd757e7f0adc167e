//! In-memory volume shared by the unit tests.
use super::{
    Sector,
    bs::{BootSector, PartitionDescriptor},
};
use crate::{
    BlockDeviceError,
    cache::{CacheError, CacheResult, SectorSource},
};
use alloc::{vec, vec::Vec};

pub const EOC: u32 = 0x0FFF_FFFF;
const SECTORS: usize = 64;

/// FAT32 volume: 1 reserved sector, one 1-sector FAT, 2 sectors per cluster.
///
/// Cluster `c` starts at sector `2 + (c - 2) * 2`, every data byte is its sector number.
pub struct Image {
    pub bytes: Vec<u8>,
    pub loads: Vec<u32>,
    pub fail_on: Option<u32>,
}

impl Image {
    pub fn new(fat: &[(u32, u32)]) -> Self {
        let mut bytes = vec![0u8; SECTORS * 512];
        bytes[0] = 0xEB;
        bytes[11..13].copy_from_slice(&512u16.to_le_bytes());
        bytes[13] = 2;
        bytes[14..16].copy_from_slice(&1u16.to_le_bytes());
        bytes[16] = 1;
        bytes[32..36].copy_from_slice(&(SECTORS as u32).to_le_bytes());
        bytes[36..40].copy_from_slice(&1u32.to_le_bytes());
        bytes[44..48].copy_from_slice(&2u32.to_le_bytes());
        bytes[66] = 0x29;
        bytes[82..90].copy_from_slice(b"FAT32   ");

        for &(cluster, value) in fat {
            let at = 512 + cluster as usize * 4;
            bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        for sector in 2..SECTORS {
            bytes[sector * 512..(sector + 1) * 512].fill(sector as u8);
        }
        Self {
            bytes,
            loads: Vec::new(),
            fail_on: None,
        }
    }

    pub fn partition(&self) -> PartitionDescriptor {
        let bs = BootSector::decode(&self.bytes[..512]).unwrap();
        PartitionDescriptor::from_boot_sector(&bs, 0).unwrap()
    }

    /// Zeroes `cluster` and writes `records` at its start.
    pub fn directory(&mut self, cluster: u32, records: &[[u8; 32]]) {
        let start = (2 + (cluster as usize - 2) * 2) * 512;
        self.bytes[start..start + 1024].fill(0);
        for (i, record) in records.iter().enumerate() {
            self.bytes[start + i * 32..start + (i + 1) * 32].copy_from_slice(record);
        }
    }
}

impl SectorSource for Image {
    fn sector_size(&self) -> usize {
        512
    }

    fn possibly_load(&mut self, sector: Sector) -> CacheResult<&[u8]> {
        if self.fail_on == Some(sector.value()) {
            return Err(CacheError::Device(BlockDeviceError::Io));
        }
        self.loads.push(sector.value());
        let start = sector.value() as usize * 512;
        self.bytes
            .get(start..start + 512)
            .ok_or(CacheError::Device(BlockDeviceError::OutOfBounds))
    }
}
