//! Path to inode number assignment.
//!
//! FAT has no inodes: numbers are handed out the first time a path is seen and
//! stay stable for the lifetime of the mount.
use alloc::string::String;
use hashbrown::HashMap;

#[derive(Debug, Clone)]
pub struct InodeTable {
    inodes: HashMap<String, u64>,
    next: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    const FIRST: u64 = 1;

    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self {
            inodes: HashMap::new(),
            next: Self::FIRST,
        }
    }

    /// Returns the inode of `path`, assigning the next free number if it has none.
    pub fn inode_for(&mut self, path: &str) -> u64 {
        if let Some(&inode) = self.inodes.get(path) {
            return inode;
        }
        let inode = self.next;
        self.next += 1;
        self.inodes.insert(String::from(path), inode);
        inode
    }

    #[must_use]
    #[inline]
    pub fn get(&self, path: &str) -> Option<u64> {
        self.inodes.get(path).copied()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }
}
