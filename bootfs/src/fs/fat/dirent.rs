//! 32-byte directory records.
use super::{Cluster, FatError, FatResult, date::DateTime, le_u16, le_u32};
use alloc::string::String;

/// Size of a directory record in bytes (always 32 bytes)
pub const DIR_ENTRY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Directory entry attributes
pub struct Attributes(u8);

impl Attributes {
    /// Read-only attribute
    pub const READ_ONLY: u8 = 0x01;
    /// Hidden attribute
    pub const HIDDEN: u8 = 0x02;
    /// System attribute
    pub const SYSTEM: u8 = 0x04;
    /// Volume ID attribute
    pub const VOLUME_ID: u8 = 0x08;
    /// Directory attribute
    pub const DIRECTORY: u8 = 0x10;
    /// Archive attribute
    pub const ARCHIVE: u8 = 0x20;
    /// Long file name attribute
    pub const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;

    #[must_use]
    #[inline]
    pub const fn new(attributes: u8) -> Self {
        Self(attributes)
    }

    #[must_use]
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_read_only(self) -> bool {
        self.0 & Self::READ_ONLY != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_system(self) -> bool {
        self.0 & Self::SYSTEM != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_volume_id(self) -> bool {
        self.0 & Self::VOLUME_ID != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_archive(self) -> bool {
        self.0 & Self::ARCHIVE != 0
    }

    #[must_use]
    #[inline]
    /// Returns true if the record is a long file name fragment
    pub const fn is_long_name(self) -> bool {
        self.0 == Self::LONG_NAME
    }
}

/// What the first name byte says about a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// No more records in this directory.
    EndOfDirectory,
    Deleted,
    LongName,
    Regular,
}

impl RecordKind {
    /// Deleted entry marker (first byte)
    pub const DELETED_ENTRY: u8 = 0xE5;
    /// End of directory marker (first byte)
    pub const END_OF_ENTRIES: u8 = 0x00;

    /// Classifies a raw record.
    ///
    /// # Panics
    ///
    /// Panics if `record` is shorter than [`DIR_ENTRY_SIZE`].
    #[must_use]
    pub fn of(record: &[u8]) -> Self {
        match record[0] {
            Self::END_OF_ENTRIES => Self::EndOfDirectory,
            Self::DELETED_ENTRY => Self::Deleted,
            _ if Attributes::new(record[11]).is_long_name() => Self::LongName,
            _ => Self::Regular,
        }
    }
}

/// Regular (8.3) directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortEntry {
    /// Filename, space padded
    name: [u8; 8],
    /// Extension, space padded
    ext: [u8; 3],
    attr: Attributes,
    /// Case flags written by Windows NT
    nt_res: u8,
    /// Creation time refinement, in 10 ms units
    creation_time_tenths: u8,
    creation_time: u16,
    creation_date: u16,
    last_access_date: u16,
    first_cluster_high: u16,
    write_time: u16,
    write_date: u16,
    first_cluster_low: u16,
    file_size: u32,
}

impl ShortEntry {
    /// Stands for a leading 0xE5 in a live name.
    const KANJI_E5: u8 = 0x05;
    /// `nt_res` bit: the base name is stored upper case but displayed lower case.
    const LOWER_CASE_BASE: u8 = 0x08;
    /// `nt_res` bit: same for the extension.
    const LOWER_CASE_EXT: u8 = 0x10;

    /// Decodes a regular record.
    pub fn decode(record: &[u8]) -> FatResult<Self> {
        if record.len() < DIR_ENTRY_SIZE {
            return Err(FatError::Truncated);
        }
        let mut name = [0; 8];
        name.copy_from_slice(&record[0..8]);
        let mut ext = [0; 3];
        ext.copy_from_slice(&record[8..11]);

        Ok(Self {
            name,
            ext,
            attr: Attributes::new(record[11]),
            nt_res: record[12],
            creation_time_tenths: record[13],
            creation_time: le_u16(record, 14),
            creation_date: le_u16(record, 16),
            last_access_date: le_u16(record, 18),
            first_cluster_high: le_u16(record, 20),
            write_time: le_u16(record, 22),
            write_date: le_u16(record, 24),
            first_cluster_low: le_u16(record, 26),
            file_size: le_u32(record, 28),
        })
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attr
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(&self) -> bool {
        self.attr.is_directory()
    }

    #[must_use]
    #[inline]
    pub const fn is_volume_id(&self) -> bool {
        self.attr.is_volume_id() && !self.attr.is_directory()
    }

    #[must_use]
    /// Returns the raw 11-byte name as stored, the form the LFN checksum covers
    pub fn filename_raw(&self) -> [u8; 11] {
        let mut result = [0u8; 11];
        result[..8].copy_from_slice(&self.name);
        result[8..].copy_from_slice(&self.ext);
        result
    }

    #[must_use]
    /// Returns the display name: trimmed base, then `.` and the extension if any
    pub fn short_name(&self) -> String {
        let mut name = self.name;
        if name[0] == Self::KANJI_E5 {
            name[0] = RecordKind::DELETED_ENTRY;
        }

        let mut out = String::with_capacity(12);
        push_trimmed(&mut out, &name, self.nt_res & Self::LOWER_CASE_BASE != 0);
        let ext_len = trimmed_len(&self.ext);
        if ext_len > 0 {
            out.push('.');
            push_trimmed(&mut out, &self.ext, self.nt_res & Self::LOWER_CASE_EXT != 0);
        }
        out
    }

    #[must_use]
    /// Returns the first cluster.
    ///
    /// The two halves are combined as `high * 65536 + low`, on FAT16 the high half is 0.
    pub const fn first_cluster(&self) -> Cluster {
        Cluster::from_halves(self.first_cluster_high, self.first_cluster_low)
    }

    #[must_use]
    #[inline]
    pub const fn file_size(&self) -> u32 {
        self.file_size
    }

    #[must_use]
    #[inline]
    pub const fn creation_datetime(&self) -> DateTime {
        DateTime::decode(
            self.creation_date,
            self.creation_time,
            self.creation_time_tenths,
        )
    }

    #[must_use]
    #[inline]
    /// Last access has no time of day on disk: it decodes as midnight.
    pub const fn last_access_datetime(&self) -> DateTime {
        DateTime::decode(self.last_access_date, 0, 0)
    }

    #[must_use]
    #[inline]
    pub const fn last_write_datetime(&self) -> DateTime {
        DateTime::decode(self.write_date, self.write_time, 0)
    }
}

fn trimmed_len(field: &[u8]) -> usize {
    field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1)
}

/// Appends the space-trimmed `field`.
///
/// Bytes above 0x7F belong to the volume's OEM code page, which is unknown here. They
/// pass through as the code point of the same value, so distinct names stay distinct.
fn push_trimmed(out: &mut String, field: &[u8], lower: bool) {
    for &b in &field[..trimmed_len(field)] {
        let b = if lower { b.to_ascii_lowercase() } else { b };
        out.push(char::from(b));
    }
}

/// Checksum of an 8.3 name, stored in every LFN fragment of that name
#[must_use]
pub fn short_name_checksum(raw: &[u8; 11]) -> u8 {
    raw.iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// Long file name fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongNameRecord {
    /// Sequence number, 1-based, bit 6 set on the last fragment of a name
    seq_num: u8,
    /// Characters 1-5, 6-11 and 12-13 of this fragment
    units: [u16; LongNameRecord::UNITS],
    /// Number of meaningful units before the terminator or padding
    len: usize,
    /// Must be 0 for name fragments
    entry_type: u8,
    checksum: u8,
    /// Must be 0
    first_cluster: u16,
}

impl LongNameRecord {
    /// UTF-16 units per fragment
    pub const UNITS: usize = 13;
    /// Fragments needed for the longest (255 unit) name
    pub const MAX_SEQUENCE: u8 = 20;
    const LAST_ENTRY: u8 = 0x40;
    const SEQUENCE_MASK: u8 = 0x1F;
    /// Byte offsets of the three unit groups, and their lengths in units
    const GROUPS: [(usize, usize); 3] = [(1, 5), (14, 6), (28, 2)];

    /// Decodes a fragment, rejecting malformed ones.
    pub fn decode(record: &[u8]) -> FatResult<Self> {
        if record.len() < DIR_ENTRY_SIZE {
            return Err(FatError::Truncated);
        }
        if !Attributes::new(record[11]).is_long_name() {
            return Err(FatError::InvalidLongName);
        }

        let mut units = [0u16; Self::UNITS];
        let mut len = 0;
        let mut terminated = false;
        let mut i = 0;
        for (offset, count) in Self::GROUPS {
            for k in 0..count {
                let unit = le_u16(record, offset + 2 * k);
                units[i] = unit;
                i += 1;
                if terminated {
                    continue;
                }
                if unit == 0x0000 || unit == 0xFFFF {
                    terminated = true;
                } else {
                    len += 1;
                }
            }
        }

        let entry = Self {
            seq_num: record[0],
            units,
            len,
            entry_type: record[12],
            checksum: record[13],
            first_cluster: le_u16(record, 26),
        };

        let seq = entry.sequence();
        if entry.entry_type != 0 || entry.first_cluster != 0 || !(1..=Self::MAX_SEQUENCE).contains(&seq) {
            return Err(FatError::InvalidLongName);
        }
        Ok(entry)
    }

    #[must_use]
    #[inline]
    pub const fn sequence(&self) -> u8 {
        self.seq_num & Self::SEQUENCE_MASK
    }

    #[must_use]
    #[inline]
    /// True on the fragment holding the end of the name, which is the first one on disk
    pub const fn is_last(&self) -> bool {
        self.seq_num & Self::LAST_ENTRY != 0
    }

    #[must_use]
    #[inline]
    pub const fn checksum(&self) -> u8 {
        self.checksum
    }

    #[must_use]
    #[inline]
    /// Name units carried by this fragment, terminator and padding excluded
    pub fn units(&self) -> &[u16] {
        &self.units[..self.len]
    }
}
