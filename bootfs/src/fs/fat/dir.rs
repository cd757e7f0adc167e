//! Directory listing.
use super::{
    Cluster, FatResult,
    date::DateTime,
    dirent::{Attributes, DIR_ENTRY_SIZE, LongNameRecord, RecordKind, ShortEntry},
    file::ChainReader,
    inode::InodeTable,
    lfn::LongNameAccumulator,
};
use crate::{
    cache::SectorSource,
    fs::{Path, PathBuf},
};
use alloc::{string::String, vec::Vec};

/// A file or directory, as listed by its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Long name if the record has one, else the 8.3 name.
    name: String,
    short_name: String,
    attributes: Attributes,
    size: u32,
    created: DateTime,
    modified: DateTime,
    accessed: DateTime,
    first_cluster: Cluster,
    path: PathBuf,
    inode: u64,
}

impl DirEntry {
    /// The root directory, which has no record of its own.
    #[must_use]
    pub fn root(cluster: Cluster, inode: u64) -> Self {
        Self {
            name: String::from(Path::SEPARATOR_STR),
            short_name: String::new(),
            attributes: Attributes::new(Attributes::DIRECTORY),
            size: 0,
            created: DateTime::default(),
            modified: DateTime::default(),
            accessed: DateTime::default(),
            first_cluster: cluster,
            path: PathBuf::root(),
            inode,
        }
    }

    fn from_record(
        record: &ShortEntry,
        long_name: Option<String>,
        parent: &PathBuf,
        inodes: &mut InodeTable,
    ) -> Self {
        let short_name = record.short_name();
        let name = long_name.unwrap_or_else(|| short_name.clone());
        let path = parent.join(&name);
        let inode = inodes.inode_for(path.as_str());

        Self {
            name,
            short_name,
            attributes: record.attributes(),
            size: record.file_size(),
            created: record.creation_datetime(),
            modified: record.last_write_datetime(),
            accessed: record.last_access_datetime(),
            first_cluster: record.first_cluster(),
            path,
            inode,
        }
    }

    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    #[inline]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attributes
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    #[must_use]
    #[inline]
    /// Size in bytes, 0 for directories.
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    #[inline]
    pub const fn created(&self) -> DateTime {
        self.created
    }

    #[must_use]
    #[inline]
    pub const fn modified(&self) -> DateTime {
        self.modified
    }

    #[must_use]
    #[inline]
    pub const fn accessed(&self) -> DateTime {
        self.accessed
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }

    #[must_use]
    #[inline]
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    #[must_use]
    #[inline]
    pub const fn inode(&self) -> u64 {
        self.inode
    }

    #[must_use]
    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.as_str() == Path::SEPARATOR_STR
    }

    #[must_use]
    #[inline]
    /// True for the `.` and `..` links.
    pub fn is_dot(&self) -> bool {
        self.is_directory() && matches!(self.name.as_str(), "." | "..")
    }

    #[must_use]
    /// Compares `component` with both names, ignoring ASCII case.
    pub fn matches(&self, component: &str) -> bool {
        self.name.eq_ignore_ascii_case(component)
            || (!self.short_name.is_empty() && self.short_name.eq_ignore_ascii_case(component))
    }
}

/// Lists every live entry of the directory read by `reader`.
///
/// Listing stops at the first end-of-directory record or at the end of the chain.
/// Malformed long name fragments are skipped, the regular record they precede
/// then falls back to its 8.3 name. Volume labels are not listed.
pub fn read_directory<S: SectorSource + ?Sized>(
    reader: &mut ChainReader<'_, S>,
    parent: &PathBuf,
    inodes: &mut InodeTable,
) -> FatResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut long_name = LongNameAccumulator::new();
    let mut record = [0u8; DIR_ENTRY_SIZE];

    while reader.read_exact(&mut record)? {
        match RecordKind::of(&record) {
            RecordKind::EndOfDirectory => break,
            RecordKind::Deleted => long_name.reset(),
            RecordKind::LongName => match LongNameRecord::decode(&record) {
                Ok(fragment) => long_name.push(&fragment),
                Err(err) => {
                    crate::warn!("{}: skipping long name fragment: {}", parent, err);
                    long_name.reset();
                }
            },
            RecordKind::Regular => {
                let short = ShortEntry::decode(&record)?;
                if short.is_volume_id() {
                    long_name.reset();
                    continue;
                }
                let name = long_name.take(&short.filename_raw());
                entries.push(DirEntry::from_record(&short, name, parent, inodes));
            }
        }
    }

    crate::debug!("{}: {} entries", parent, entries.len());
    Ok(entries)
}
