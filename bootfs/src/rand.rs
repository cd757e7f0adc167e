//! Pseudo-random numbers for slot selection.
//!
//! There is no entropy source this early in boot, and reproducible eviction
//! order makes cache behaviour easy to reason about, so a seeded LCG is enough.

/// Linear congruential generator (glibc constants).
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    const MULTIPLIER: u32 = 1_103_515_245;
    const INCREMENT: u32 = 12_345;

    #[must_use]
    #[inline]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    #[inline]
    pub const fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        // Low bits of an LCG have short periods
        self.state.rotate_left(16)
    }

    /// Returns a value in `0..bound`.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    pub fn below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "empty range");
        let wide = u64::from(self.next_u32()) * bound as u64;
        // `wide >> 32` is strictly below `bound`
        usize::try_from(wide >> 32).unwrap_or(bound - 1)
    }
}
