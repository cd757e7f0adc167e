#![allow(dead_code)]

use bootfs::{BlockDevice, BlockDeviceError};

pub const SECTOR: usize = 512;
pub const EOC32: u32 = 0x0FFF_FFFF;
pub const EOC16: u32 = 0xFFFF;

/// In-memory disk.
pub struct MockDevice {
    data: Vec<u8>,
    /// Sector numbers of every read, in order.
    pub reads: Vec<u32>,
    /// Sectors that fail with an I/O error.
    pub bad_sectors: Vec<u32>,
}

impl MockDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: Vec::new(),
            bad_sectors: Vec::new(),
        }
    }

    pub fn reads_of(&self, sector: u32) -> usize {
        self.reads.iter().filter(|&&s| s == sector).count()
    }
}

impl BlockDevice for MockDevice {
    const BLOCK_SIZE: usize = SECTOR;

    fn read_sectors(&mut self, dst: &mut [u8], lba: u32) -> Result<(), BlockDeviceError> {
        let count = Self::sector_count(dst.len())?;
        if (lba..lba + count).any(|s| self.bad_sectors.contains(&s)) {
            return Err(BlockDeviceError::Io);
        }
        let start = lba as usize * SECTOR;
        let src = self
            .data
            .get(start..start + dst.len())
            .ok_or(BlockDeviceError::OutOfBounds)?;
        dst.copy_from_slice(src);
        self.reads.extend(lba..lba + count);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Fat16,
    Fat32,
}

/// Builds small FAT volumes, optionally behind an MBR.
pub struct ImageBuilder {
    kind: Kind,
    bytes: Vec<u8>,
    /// First sector of the volume.
    offset: usize,
    total: usize,
    spc: usize,
    reserved: usize,
    fat_count: usize,
    spf: usize,
    root_entries: usize,
    next_cluster: u32,
}

impl ImageBuilder {
    /// FAT32: 8 sectors per cluster, 32 reserved sectors, 2 FATs of 16 sectors,
    /// root directory in cluster 2.
    pub fn fat32() -> Self {
        Self::new(Kind::Fat32, 0)
    }

    /// FAT16: 4 sectors per cluster, 1 reserved sector, 2 FATs of 32 sectors,
    /// 512 root entries.
    pub fn fat16() -> Self {
        Self::new(Kind::Fat16, 0)
    }

    /// Same volume, placed at `lba` behind an MBR.
    pub fn partitioned(kind: Kind, lba: usize) -> Self {
        let mut builder = Self::new(kind, lba);
        let entry = 446;
        builder.bytes[entry] = 0x80;
        builder.bytes[entry + 4] = if kind == Kind::Fat32 { 0x0C } else { 0x0E };
        builder.bytes[entry + 8..entry + 12].copy_from_slice(&(lba as u32).to_le_bytes());
        builder.bytes[entry + 12..entry + 16]
            .copy_from_slice(&(builder.total as u32).to_le_bytes());
        builder.bytes[510] = 0x55;
        builder.bytes[511] = 0xAA;
        builder
    }

    fn new(kind: Kind, offset: usize) -> Self {
        let (total, spc, reserved, spf, root_entries) = match kind {
            Kind::Fat32 => (4096, 8, 32, 16, 0),
            Kind::Fat16 => (8000, 4, 1, 32, 512),
        };
        let mut builder = Self {
            kind,
            bytes: vec![0; (offset + total) * SECTOR],
            offset,
            total,
            spc,
            reserved,
            fat_count: 2,
            spf,
            root_entries,
            next_cluster: 2,
        };
        builder.write_boot_sector();
        builder.set_fat(0, 0x0FFF_FFF8);
        builder.set_fat(1, EOC32);
        if kind == Kind::Fat32 {
            // Root directory
            builder.set_fat(2, EOC32);
            builder.next_cluster = 3;
        }
        builder
    }

    fn write_boot_sector(&mut self) {
        let base = self.offset * SECTOR;
        let bs = &mut self.bytes[base..base + SECTOR];
        bs[0] = 0xEB;
        bs[1] = 0x58;
        bs[2] = 0x90;
        bs[3..11].copy_from_slice(b"MSWIN4.1");
        bs[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        bs[13] = self.spc as u8;
        bs[14..16].copy_from_slice(&(self.reserved as u16).to_le_bytes());
        bs[16] = self.fat_count as u8;
        bs[17..19].copy_from_slice(&(self.root_entries as u16).to_le_bytes());
        bs[21] = 0xF8;
        match self.kind {
            Kind::Fat32 => {
                bs[32..36].copy_from_slice(&(self.total as u32).to_le_bytes());
                bs[36..40].copy_from_slice(&(self.spf as u32).to_le_bytes());
                bs[44..48].copy_from_slice(&2u32.to_le_bytes());
                bs[48..50].copy_from_slice(&1u16.to_le_bytes());
                bs[50..52].copy_from_slice(&6u16.to_le_bytes());
                bs[64] = 0x80;
                bs[66] = 0x29;
                bs[67..71].copy_from_slice(&0x1234_5678u32.to_le_bytes());
                bs[71..82].copy_from_slice(b"BOOT       ");
                bs[82..90].copy_from_slice(b"FAT32   ");
            }
            Kind::Fat16 => {
                bs[19..21].copy_from_slice(&(self.total as u16).to_le_bytes());
                bs[22..24].copy_from_slice(&(self.spf as u16).to_le_bytes());
                bs[36] = 0x80;
                bs[38] = 0x29;
                bs[39..43].copy_from_slice(&0x1234_5678u32.to_le_bytes());
                bs[43..54].copy_from_slice(b"FIRMWARE   ");
                bs[54..62].copy_from_slice(b"FAT16   ");
            }
        }
        bs[510] = 0x55;
        bs[511] = 0xAA;
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn cluster_bytes(&self) -> usize {
        self.spc * SECTOR
    }

    fn root_dir_sectors(&self) -> usize {
        (self.root_entries * 32).div_ceil(SECTOR)
    }

    pub fn fat_start(&self) -> usize {
        self.offset + self.reserved
    }

    pub fn root_region_start(&self) -> usize {
        self.fat_start() + self.fat_count * self.spf
    }

    pub fn data_start(&self) -> usize {
        self.root_region_start() + self.root_dir_sectors()
    }

    pub fn cluster_sector(&self, cluster: u32) -> usize {
        self.data_start() + (cluster as usize - 2) * self.spc
    }

    /// Sector holding the FAT entry of `cluster` in the first copy.
    pub fn fat_sector(&self, cluster: u32) -> usize {
        let width = if self.kind == Kind::Fat32 { 4 } else { 2 };
        self.fat_start() + cluster as usize * width / SECTOR
    }

    /// Writes a raw FAT value in every copy. FAT16 values are truncated to 16 bits.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        for copy in 0..self.fat_count {
            let sector = self.fat_start() + copy * self.spf;
            match self.kind {
                Kind::Fat32 => {
                    let at = sector * SECTOR + cluster as usize * 4;
                    self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
                }
                Kind::Fat16 => {
                    let at = sector * SECTOR + cluster as usize * 2;
                    self.bytes[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes());
                }
            }
        }
    }

    fn eoc(&self) -> u32 {
        match self.kind {
            Kind::Fat32 => EOC32,
            Kind::Fat16 => EOC16,
        }
    }

    /// Reserves `count` clusters and links them, in order.
    pub fn alloc_chain(&mut self, count: usize) -> Vec<u32> {
        let chain: Vec<u32> = (0..count as u32).map(|i| self.next_cluster + i).collect();
        self.next_cluster += count as u32;
        self.link(&chain);
        chain
    }

    /// Links arbitrary clusters, the last one ending the chain.
    pub fn link(&mut self, chain: &[u32]) {
        for pair in chain.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = chain.last() {
            let eoc = self.eoc();
            self.set_fat(last, eoc);
        }
    }

    /// Writes `data` across the clusters of `chain`.
    pub fn write_chain(&mut self, chain: &[u32], data: &[u8]) {
        let cluster_bytes = self.cluster_bytes();
        for (&cluster, chunk) in chain.iter().zip(data.chunks(cluster_bytes)) {
            let at = self.cluster_sector(cluster) * SECTOR;
            self.bytes[at..at + chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Stores `data` in fresh clusters, returning the first one (0 when empty).
    pub fn file(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return 0;
        }
        let chain = self.alloc_chain(data.len().div_ceil(self.cluster_bytes()));
        self.write_chain(&chain, data);
        chain[0]
    }

    /// Stores directory records in fresh clusters, returning the first one.
    pub fn directory(&mut self, records: &[[u8; 32]]) -> u32 {
        let bytes: Vec<u8> = records.iter().flatten().copied().collect();
        let count = bytes.len().div_ceil(self.cluster_bytes()).max(1);
        let chain = self.alloc_chain(count);
        self.write_chain(&chain, &bytes);
        chain[0]
    }

    /// Stores the root directory records.
    pub fn root(&mut self, records: &[[u8; 32]]) {
        let bytes: Vec<u8> = records.iter().flatten().copied().collect();
        match self.kind {
            Kind::Fat32 => {
                assert!(bytes.len() <= self.cluster_bytes(), "root spans one cluster");
                self.write_chain(&[2], &bytes);
            }
            Kind::Fat16 => {
                assert!(bytes.len() <= self.root_entries * 32);
                let at = self.root_region_start() * SECTOR;
                self.bytes[at..at + bytes.len()].copy_from_slice(&bytes);
            }
        }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn build(self) -> MockDevice {
        MockDevice::new(self.bytes)
    }
}

/// A regular (8.3) record.
pub fn short_record(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut r = [0u8; 32];
    r[..11].copy_from_slice(name);
    r[11] = attr;
    r[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    r[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    r[28..32].copy_from_slice(&size.to_le_bytes());
    r
}

pub fn checksum(short: &[u8; 11]) -> u8 {
    short
        .iter()
        .fold(0u8, |sum, &b| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b))
}

/// Long name fragments of `name` followed by its regular record, in disk order.
pub fn named_record(
    name: &str,
    short: &[u8; 11],
    attr: u8,
    cluster: u32,
    size: u32,
) -> Vec<[u8; 32]> {
    const OFFSETS: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let units: Vec<u16> = name.encode_utf16().collect();
    let chunks: Vec<&[u16]> = units.chunks(13).collect();
    let sum = checksum(short);

    let mut records = Vec::new();
    for (i, chunk) in chunks.iter().enumerate().rev() {
        let mut r = [0u8; 32];
        r[0] = (i as u8 + 1) | if i + 1 == chunks.len() { 0x40 } else { 0 };
        r[11] = 0x0F;
        r[13] = sum;
        for (k, &off) in OFFSETS.iter().enumerate() {
            let unit = match chunk.len() {
                n if k < n => chunk[k],
                n if k == n => 0,
                _ => 0xFFFF,
            };
            r[off..off + 2].copy_from_slice(&unit.to_le_bytes());
        }
        records.push(r);
    }
    records.push(short_record(short, attr, cluster, size));
    records
}

/// Deterministic file content.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}
