//! Long file name reassembly.
//!
//! A long name is split into 13-unit fragments stored right before the regular
//! record they name, highest sequence number first. The accumulator collects raw
//! UTF-16 units and only decodes once the name is complete, so surrogate pairs
//! split across two fragments survive.
use super::dirent::{LongNameRecord, short_name_checksum};
use alloc::{collections::VecDeque, string::String};
use boot_core::static_assert;

static_assert!(
    LongNameRecord::MAX_SEQUENCE as usize * LongNameRecord::UNITS >= 255,
    "20 fragments must hold the longest name"
);

/// Pending long name of the record being scanned.
#[derive(Debug, Default, Clone)]
pub struct LongNameAccumulator {
    units: VecDeque<u16>,
    /// Lowest and highest sequence numbers collected so far.
    run: Option<(u8, u8)>,
    /// Sequence number of the fragment flagged last, once seen.
    total: Option<u8>,
    checksum: Option<u8>,
}

impl LongNameAccumulator {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            units: VecDeque::new(),
            run: None,
            total: None,
            checksum: None,
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_pending(&self) -> bool {
        self.run.is_some()
    }

    /// True once every fragment from 1 up to the one flagged last is present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!((self.run, self.total), (Some((1, high)), Some(total)) if high == total)
    }

    pub fn reset(&mut self) {
        self.units.clear();
        self.run = None;
        self.total = None;
        self.checksum = None;
    }

    /// Adds a fragment.
    ///
    /// A fragment numbered one below the lowest pending one is prepended (the on-disk
    /// order), one numbered one above the highest is appended. Any other fragment,
    /// or one carrying another checksum, drops the pending name and starts a new one.
    pub fn push(&mut self, record: &LongNameRecord) {
        let seq = record.sequence();
        let same_name = self.checksum == Some(record.checksum());

        match self.run {
            Some((low, high))
                if same_name && !record.is_last() && seq.checked_add(1) == Some(low) =>
            {
                for &unit in record.units().iter().rev() {
                    self.units.push_front(unit);
                }
                self.run = Some((seq, high));
            }
            Some((low, high))
                if same_name && self.total.is_none() && high.checked_add(1) == Some(seq) =>
            {
                self.units.extend(record.units());
                self.run = Some((low, seq));
            }
            pending => {
                if pending.is_some() {
                    crate::warn!(
                        "long name fragment {} out of sequence, dropping pending name",
                        seq
                    );
                }
                self.reset();
                self.units.extend(record.units());
                self.run = Some((seq, seq));
                self.checksum = Some(record.checksum());
            }
        }

        if record.is_last() {
            self.total = Some(seq);
        }
    }

    /// Completes the pending name for the regular record named `short_raw`.
    ///
    /// Returns `None` if no fragment is pending or the fragments do not form a whole
    /// name. The accumulator is reset either way.
    pub fn take(&mut self, short_raw: &[u8; 11]) -> Option<String> {
        if !self.is_pending() {
            return None;
        }
        if !self.is_complete() {
            crate::warn!(
                "incomplete long name for {}",
                String::from_utf8_lossy(short_raw)
            );
            self.reset();
            return None;
        }
        if self.checksum != Some(short_name_checksum(short_raw)) {
            crate::warn!(
                "long name checksum mismatch for {}",
                String::from_utf8_lossy(short_raw)
            );
        }

        let name = char::decode_utf16(self.units.iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        self.reset();
        Some(name)
    }
}
