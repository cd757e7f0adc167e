use alloc::{string::String, vec::Vec};
use thiserror::Error;

pub mod fat;

/// Errors surfaced to the boot layer.
///
/// This is a closed set: every lower-level error is folded into one of these
/// before it leaves the filesystem API.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum PosixError {
    #[error("no error")]
    None,
    #[error("permission denied")]
    Access,
    #[error("bad file descriptor")]
    BadF,
    #[error("too many open files")]
    MFile,
    #[error("too many open files in system")]
    NFile,
    #[error("no such file or directory")]
    NoEnt,
    #[error("out of memory")]
    NoMem,
    #[error("not a directory")]
    NotDir,
    #[error("unknown error")]
    Unknown,
}

impl PosixError {
    #[must_use]
    /// Fixed human-readable message of the error.
    pub const fn message(self) -> &'static str {
        match self {
            Self::None => "no error",
            Self::Access => "permission denied",
            Self::BadF => "bad file descriptor",
            Self::MFile => "too many open files",
            Self::NFile => "too many open files in system",
            Self::NoEnt => "no such file or directory",
            Self::NoMem => "out of memory",
            Self::NotDir => "not a directory",
            Self::Unknown => "unknown error",
        }
    }
}

pub type FileResult<T> = Result<T, PosixError>;

/// A read-only file system interface.
///
/// Each operation takes a full path: there are no handles at this layer.
pub trait FileSystem {
    /// Checks if a file exists at the given path.
    fn exists(&mut self, path: Path) -> FileResult<bool>;
    /// Returns information about the file at the given path.
    fn metadata(&mut self, path: Path) -> FileResult<FileMetadata>;
    /// Reads from the file at the given path into the given buffer, starting at `offset`.
    ///
    /// This returns how many bytes were read, 0 meaning end of file.
    fn read(&mut self, path: Path, buffer: &mut [u8], offset: usize) -> FileResult<usize>;
    /// Returns the full path of every entry in the directory at the given path.
    fn read_dir(&mut self, path: Path) -> FileResult<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PathBuf(String);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Path<'a>(&'a str);

impl PathBuf {
    #[must_use]
    #[inline]
    /// Creates a new `PathBuf` from the given string.
    pub fn new(path: &str) -> Self {
        Self(String::from(path))
    }

    #[must_use]
    #[inline]
    pub fn root() -> Self {
        Self::new(Path::SEPARATOR_STR)
    }

    #[inline]
    /// Appends a single component, inserting a separator if needed.
    pub fn push(&mut self, component: &str) {
        if !self.0.ends_with(Path::SEPARATOR) {
            self.0.push(Path::SEPARATOR);
        }
        self.0.push_str(component.trim_start_matches(Path::SEPARATOR));
    }

    #[must_use]
    #[inline]
    pub fn as_path(&self) -> Path<'_> {
        Path(&self.0)
    }

    #[must_use]
    #[inline]
    pub fn join(&self, component: &str) -> Self {
        let mut new_path = self.clone();
        new_path.push(component);
        new_path
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::borrow::Borrow<str> for PathBuf {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PathBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> Path<'a> {
    pub const SEPARATOR: char = '/';
    pub const SEPARATOR_STR: &'static str = "/";

    #[must_use]
    #[inline]
    /// Creates a new `Path` from the given string slice.
    pub const fn new(path: &'a str) -> Self {
        Self(path)
    }

    /// Iterates over the non-empty components of the path.
    pub fn components(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.0.split(Self::SEPARATOR).filter(|c| !c.is_empty())
    }
}

impl Path<'_> {
    #[must_use]
    #[inline]
    /// Allocates a new `PathBuf` from the current path.
    pub fn to_owned(&self) -> PathBuf {
        PathBuf::new(self.0)
    }

    #[must_use]
    #[inline]
    pub const fn as_str(&self) -> &str {
        self.0
    }
}

impl<'a> From<&'a str> for Path<'a> {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self(value)
    }
}

impl core::ops::Deref for Path<'_> {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FileMetadata {
    size: usize,
    file_type: FileType,
    inode: u64,
}

impl FileMetadata {
    #[must_use]
    #[inline]
    pub const fn new(size: usize, file_type: FileType, inode: u64) -> Self {
        Self {
            size,
            file_type,
            inode,
        }
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    #[inline]
    pub const fn file_type(&self) -> FileType {
        self.file_type
    }

    #[must_use]
    #[inline]
    pub const fn inode(&self) -> u64 {
        self.inode
    }
}
