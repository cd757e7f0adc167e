//! File Allocation Table (FAT) file system implementation.
//!
//! Only FAT16 and FAT32 are supported, read-only. Every sector the FAT code
//! touches after mounting goes through a [`SectorSource`].
use super::{FileMetadata, FileResult, FileSystem, FileType, Path, PathBuf, PosixError};
use crate::{
    BlockDevice, BlockDeviceError,
    cache::{CacheConfig, CacheError, CacheStats, SectorCache, SectorSource},
};
use alloc::vec::Vec;
use thiserror::Error;

pub mod bs;
pub mod date;
pub mod dir;
pub mod dirent;
#[expect(clippy::module_inception, reason = "FS is named after this table")]
pub mod fat;
pub mod file;
pub mod inode;
pub mod lfn;
pub mod mbr;
#[cfg(test)]
mod testing;

pub use crate::cache::Sector;
use bs::PartitionDescriptor;
use dir::DirEntry;
use file::ChainReader;
use inode::InodeTable;

/// Fat types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat16,
    Fat32,
}

impl FatType {
    #[must_use]
    #[inline]
    /// Size of a table entry in bytes.
    pub const fn entry_size(self) -> u32 {
        match self {
            Self::Fat16 => 2,
            Self::Fat32 => 4,
        }
    }

    #[must_use]
    #[inline]
    /// Significant bits of a table entry.
    pub const fn entry_mask(self) -> u32 {
        match self {
            Self::Fat16 => 0xFFFF,
            Self::Fat32 => 0x0FFF_FFFF,
        }
    }

    #[must_use]
    #[inline]
    /// Smallest end-of-chain marker.
    pub const fn end_of_chain_boundary(self) -> u32 {
        match self {
            Self::Fat16 => 0xFFF8,
            Self::Fat32 => 0x0FFF_FFF8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cluster(u32);

impl Cluster {
    #[must_use]
    #[inline]
    pub const fn new(cluster: u32) -> Self {
        Self(cluster)
    }

    #[must_use]
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    /// Joins the two 16-bit halves stored in a directory record.
    pub const fn from_halves(high: u16, low: u16) -> Self {
        Self(((high as u32) << 16) | low as u32)
    }

    #[must_use]
    #[inline]
    /// Returns true if the cluster can hold data, i.e. it is neither
    /// one of the two reserved clusters nor a marker value.
    pub const fn is_valid(&self, fat_type: FatType) -> bool {
        self.0 >= 2 && self.0 < fat_type.end_of_chain_boundary() - 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Error type for FAT filesystem operations
pub enum FatError {
    #[error("Device error: {0}")]
    Device(#[from] BlockDeviceError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Structure is truncated")]
    Truncated,
    #[error("No MBR signature")]
    NoMbrSignature,
    #[error("No partition in the MBR")]
    NoPartition,
    #[error("Bad FAT16 boot signature")]
    BadFat16BootSignature,
    #[error("Bad FAT32 boot signature")]
    BadFat32BootSignature,
    #[error("Bad FAT16 filesystem type")]
    BadFat16FilesystemType,
    #[error("Bad FAT32 filesystem type")]
    BadFat32FilesystemType,
    #[error("Unsupported sector size: {0}")]
    UnsupportedSectorSize(usize),
    #[error("Invalid boot sector")]
    InvalidBootSector,
    #[error("Invalid long name fragment")]
    InvalidLongName,
    #[error("Invalid cluster")]
    InvalidCluster,
    #[error("Not found")]
    NotFound,
    #[error("Not a directory")]
    NotADirectory,
}

pub type FatResult<T> = Result<T, FatError>;

impl From<FatError> for PosixError {
    fn from(err: FatError) -> Self {
        match err {
            FatError::NotFound => Self::NoEnt,
            FatError::NotADirectory => Self::NotDir,
            FatError::Cache(CacheError::NoFreeSlot) => Self::NoMem,
            _ => Self::Unknown,
        }
    }
}

/// Converts at the API boundary, logging what the caller will not see.
fn posix(err: FatError) -> PosixError {
    let converted = PosixError::from(err);
    if converted == PosixError::Unknown {
        crate::error!("FAT error: {}", err);
    }
    converted
}

#[must_use]
#[inline]
pub(crate) fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[must_use]
#[inline]
pub(crate) fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// A mounted FAT volume.
pub struct FatFs<S: SectorSource> {
    source: S,
    partition: PartitionDescriptor,
    inodes: InodeTable,
}

impl<D: BlockDevice> FatFs<SectorCache<D>> {
    /// Locates the filesystem on `device`, then puts a sector cache in front of it.
    pub fn mount(mut device: D, config: CacheConfig) -> FatResult<Self> {
        let partition = bs::locate_filesystem(&mut device)?;
        Ok(Self::new(partition, SectorCache::new(device, config)))
    }

    #[must_use]
    #[inline]
    pub const fn cache(&self) -> &SectorCache<D> {
        &self.source
    }

    #[inline]
    pub fn dump_stats(&mut self, clear: bool) -> CacheStats {
        self.source.dump_stats(clear)
    }

    #[must_use]
    #[inline]
    pub fn unmount(self) -> D {
        self.source.into_device()
    }
}

impl<S: SectorSource> FatFs<S> {
    #[must_use]
    pub fn new(partition: PartitionDescriptor, source: S) -> Self {
        Self {
            source,
            partition,
            inodes: InodeTable::new(),
        }
    }

    #[must_use]
    #[inline]
    pub const fn partition(&self) -> &PartitionDescriptor {
        &self.partition
    }

    #[inline]
    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    #[must_use]
    #[inline]
    pub const fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    fn root_entry(&mut self) -> DirEntry {
        let inode = self.inodes.inode_for(Path::SEPARATOR_STR);
        DirEntry::root(self.partition.root_cluster(), inode)
    }

    /// Lists the records of `dir`.
    fn list(&mut self, dir: &DirEntry) -> FatResult<Vec<DirEntry>> {
        if !dir.is_directory() {
            return Err(FatError::NotADirectory);
        }
        let mut reader = open_entry(&mut self.source, &self.partition, dir)?;
        dir::read_directory(&mut reader, dir.path(), &mut self.inodes)
    }

    /// Walks `path` from the root directory.
    ///
    /// Empty segments are ignored and names match ASCII case-insensitively,
    /// against the long name or the 8.3 alias.
    pub fn resolve(&mut self, path: Path) -> FatResult<DirEntry> {
        let mut current = self.root_entry();

        for component in path.components() {
            let found = self
                .list(&current)?
                .into_iter()
                .find(|entry| entry.matches(component))
                .ok_or(FatError::NotFound)?;

            current = if found.is_directory() && found.first_cluster().value() == 0 {
                // `..` of a first-level directory
                self.root_entry()
            } else {
                found
            };
        }

        Ok(current)
    }

    /// Opens a reader over the content of `path`.
    ///
    /// Directories can be opened too, the reader then yields their raw records.
    pub fn open(&mut self, path: Path) -> FileResult<ChainReader<'_, S>> {
        let entry = self.resolve(path).map_err(posix)?;
        open_entry(&mut self.source, &self.partition, &entry).map_err(posix)
    }

    /// Lists the directory at `path`, `.` and `..` included.
    pub fn open_dir(&mut self, path: Path) -> FileResult<Vec<DirEntry>> {
        let entry = self.resolve(path).map_err(posix)?;
        self.list(&entry).map_err(posix)
    }
}

fn open_entry<'a, S: SectorSource>(
    source: &'a mut S,
    partition: &'a PartitionDescriptor,
    entry: &DirEntry,
) -> FatResult<ChainReader<'a, S>> {
    if entry.is_root() {
        if partition.is_fat16() {
            return ChainReader::open_root_region(source, partition);
        }
        return ChainReader::open(source, partition, partition.root_cluster(), 0);
    }
    let size = if entry.is_directory() { 0 } else { entry.size() };
    ChainReader::open(source, partition, entry.first_cluster(), size)
}

/// Reads into `buffer` from `offset`, until it is full or the file ends.
fn read_at<S: SectorSource>(
    reader: &mut ChainReader<'_, S>,
    buffer: &mut [u8],
    offset: usize,
) -> FatResult<usize> {
    if reader.skip(offset)? < offset {
        return Ok(0);
    }
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl<S: SectorSource> FileSystem for FatFs<S> {
    fn exists(&mut self, path: Path) -> FileResult<bool> {
        match self.resolve(path) {
            Ok(_) => Ok(true),
            Err(FatError::NotFound | FatError::NotADirectory) => Ok(false),
            Err(err) => Err(posix(err)),
        }
    }

    fn metadata(&mut self, path: Path) -> FileResult<FileMetadata> {
        let entry = self.resolve(path).map_err(posix)?;
        let file_type = if entry.is_directory() {
            FileType::Directory
        } else {
            FileType::File
        };
        let size = usize::try_from(entry.size()).unwrap_or(usize::MAX);
        Ok(FileMetadata::new(size, file_type, entry.inode()))
    }

    fn read(&mut self, path: Path, buffer: &mut [u8], offset: usize) -> FileResult<usize> {
        let mut reader = self.open(path)?;
        read_at(&mut reader, buffer, offset).map_err(posix)
    }

    fn read_dir(&mut self, path: Path) -> FileResult<Vec<PathBuf>> {
        let entries = self.open_dir(path)?;
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_dot())
            .map(|entry| entry.path().clone())
            .collect())
    }
}
