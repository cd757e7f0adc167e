use alloc::{vec, vec::Vec};

/// One bit per cache slot, set while the slot holds a sector.
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    words: Vec<u64>,
    len: usize,
}

impl OccupancyMap {
    const BITS: usize = u64::BITS as usize;

    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(Self::BITS)],
            len,
        }
    }

    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    #[inline]
    pub fn is_set(&self, slot: usize) -> bool {
        slot < self.len && self.words[slot / Self::BITS] & (1 << (slot % Self::BITS)) != 0
    }

    #[inline]
    pub fn set(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot / Self::BITS] |= 1 << (slot % Self::BITS);
    }

    #[inline]
    pub fn clear(&mut self, slot: usize) {
        debug_assert!(slot < self.len);
        self.words[slot / Self::BITS] &= !(1 << (slot % Self::BITS));
    }

    /// Index of the first clear bit, if any.
    #[must_use]
    pub fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * Self::BITS + word.trailing_ones() as usize)
            .filter(|&slot| slot < self.len)
    }

    #[must_use]
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }
}
