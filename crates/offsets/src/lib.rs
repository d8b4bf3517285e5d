//! # Offsets
//!
//! The in-memory record boundary table for the taskstack engine.
//!
//! Records are packed back to back in a byte buffer, so the only way to find
//! record `i` is to remember where it starts. An [`OffsetIndex`] holds
//! `offset[0..=n]` for `n` records:
//!
//! ```text
//!  bytes:   a  \n  b  b  \n  c  \n  0  0  0
//!  offset:  0       2         5      7
//!           ^rec 0  ^rec 1    ^rec 2 ^end
//! ```
//!
//! ## Key properties
//! - `offset[0] == 0` always; the base entry is never removed.
//! - Entries are **strictly increasing**, so every record is non-empty.
//! - The last entry is the logical end of data.
//! - The table never holds more than `max_records + 1` entries.
//!
//! The table is never persisted. [`OffsetIndex::rebuild`] reproduces it from
//! the bytes alone, yielding the same table a sequence of appends would have.
//!
//! ## Example
//! ```rust
//! use offsets::OffsetIndex;
//!
//! let idx = OffsetIndex::rebuild(b"a\nbb\n\0\0", b'\n', 8).unwrap();
//! assert_eq!(idx.as_slice(), &[0, 2, 5]);
//! assert_eq!(idx.records(), 2);
//! assert_eq!(idx.record(1), Some(2..5));
//! ```

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("offset table full: at most {max_records} records")]
    Overflow { max_records: usize },
    #[error("offset {offset} does not follow its predecessor {previous}")]
    NotIncreasing { offset: usize, previous: usize },
    #[error("offset slot {slot} out of bounds (table has {len} entries)")]
    OutOfBounds { slot: usize, len: usize },
}

/// Strictly increasing table of record boundaries, `offset[0..=records]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    offsets: Vec<usize>,
    max_records: usize,
}

impl OffsetIndex {
    /// Creates an empty table (`[0]`) that accepts up to `max_records` records.
    pub fn new(max_records: usize) -> Self {
        let mut offsets = Vec::with_capacity(max_records.saturating_add(1));
        offsets.push(0);
        Self {
            offsets,
            max_records,
        }
    }

    /// Rebuilds the table by scanning `bytes` once for `delimiter`.
    ///
    /// Every delimiter at position `p` closes a record and contributes the
    /// boundary `p + 1`. Bytes after the last delimiter are not part of any
    /// record; the caller decides whether they are acceptable.
    ///
    /// # Errors
    ///
    /// [`IndexError::Overflow`] if more than `max_records` delimiters are found.
    pub fn rebuild(bytes: &[u8], delimiter: u8, max_records: usize) -> Result<Self, IndexError> {
        let mut idx = Self::new(max_records);
        for (pos, _) in bytes.iter().enumerate().filter(|(_, b)| **b == delimiter) {
            idx.append(pos + 1)?;
        }
        Ok(idx)
    }

    /// Adds a boundary after a newly written record.
    ///
    /// # Errors
    ///
    /// - [`IndexError::Overflow`] if the table already holds `max_records` records.
    /// - [`IndexError::NotIncreasing`] if `offset <= end()`.
    pub fn append(&mut self, offset: usize) -> Result<(), IndexError> {
        if self.records() >= self.max_records {
            return Err(IndexError::Overflow {
                max_records: self.max_records,
            });
        }
        let previous = self.end();
        if offset <= previous {
            return Err(IndexError::NotIncreasing { offset, previous });
        }
        self.offsets.push(offset);
        Ok(())
    }

    /// Removes and returns the top boundary. The base `0` entry is never removed.
    pub fn pop_last(&mut self) -> Option<usize> {
        if self.offsets.len() > 1 {
            self.offsets.pop()
        } else {
            None
        }
    }

    /// Replaces the interior boundary at `slot` after bytes have been moved.
    ///
    /// Only entries strictly between the base and the end may be overwritten:
    /// moving records never changes where data starts or ends.
    pub fn overwrite(&mut self, slot: usize, value: usize) -> Result<(), IndexError> {
        let len = self.offsets.len();
        if slot == 0 || slot + 1 >= len {
            return Err(IndexError::OutOfBounds { slot, len });
        }
        let previous = self.offsets[slot - 1];
        if value <= previous {
            return Err(IndexError::NotIncreasing {
                offset: value,
                previous,
            });
        }
        let next = self.offsets[slot + 1];
        if next <= value {
            return Err(IndexError::NotIncreasing {
                offset: next,
                previous: value,
            });
        }
        self.offsets[slot] = value;
        Ok(())
    }

    /// Number of records described by the table.
    pub fn records(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns `true` when the table describes no records.
    pub fn is_empty(&self) -> bool {
        self.records() == 0
    }

    /// Logical end of data: the last boundary.
    pub fn end(&self) -> usize {
        // never empty: `new` seeds the base entry and `pop_last` keeps it
        self.offsets[self.offsets.len() - 1]
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Byte range of record `i` (0 = bottom).
    pub fn record(&self, i: usize) -> Option<Range<usize>> {
        if i < self.records() {
            Some(self.offsets[i]..self.offsets[i + 1])
        } else {
            None
        }
    }

    /// Byte ranges of all records, bottom to top.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.offsets.windows(2).map(|w| w[0]..w[1])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.offsets
    }

    /// Verifies the table invariants: base is zero, strictly increasing, and
    /// within the record limit.
    pub fn check(&self) -> bool {
        self.offsets.first() == Some(&0)
            && self.offsets.windows(2).all(|w| w[0] < w[1])
            && self.records() <= self.max_records
    }
}
