use offsets::{IndexError, OffsetIndex};
use region::{Region, Sizing};
use std::fs::File;
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::config::StackConfig;
use crate::error::{Corruption, OpenError, StackError};
use crate::format::{first_nonzero, Layout};
use crate::item::validate_item;
use crate::view::View;
use crate::StackStore;

/// Stack of variable-length records packed back to back in a mapped file.
///
/// # Layout
///
/// Records sit contiguously from byte 0; each ends with the delimiter. The
/// [`OffsetIndex`] holds every record start plus the end of data, and is
/// rebuilt by a single scan whenever the file is opened. Bytes after the end
/// of data are always zero.
///
/// # Mutations
///
/// Every operation validates first, then updates bytes and boundaries in
/// the mapping, then issues one synchronous flush of the touched range
/// before returning. `swap` and `rotate` move records of different lengths
/// over each other, so they stage the records into owned scratch buffers
/// and write them back; the source and destination ranges overlap.
pub struct DelimitedStack {
    region: Region,
    index: OffsetIndex,
    config: StackConfig,
    /// Staging buffers, each `max_item_size + 1` bytes.
    scratch: [Vec<u8>; 3],
}

impl DelimitedStack {
    /// Maps `file` and rebuilds the stack from its contents.
    ///
    /// # Errors
    ///
    /// - [`OpenError::Config`] if `config` is invalid.
    /// - [`OpenError::Region`] if the file is larger than `max_file_size`,
    ///   locked, or cannot be mapped.
    /// - [`OpenError::Corrupt`] if the bytes are not a valid stack.
    pub fn open(file: File, config: StackConfig) -> Result<Self, OpenError> {
        let config = config.with_layout(Layout::Delimited);
        config.validate()?;
        let region = Region::map(file, config.capacity(), Sizing::AtMost)?;
        Self::from_region(region, config)
    }

    /// Opens (creating if missing) the stack file at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P, config: StackConfig) -> Result<Self, OpenError> {
        let config = config.with_layout(Layout::Delimited);
        config.validate()?;
        let region = Region::open_path(path, config.capacity(), Sizing::AtMost)?;
        Self::from_region(region, config)
    }

    fn from_region(region: Region, config: StackConfig) -> Result<Self, OpenError> {
        let index = rebuild_index(region.bytes(), &config).map_err(|err| {
            if let OpenError::Corrupt { offset, kind } = &err {
                warn!(offset, %kind, "refusing corrupt stack file");
            }
            err
        })?;

        debug!(
            layout = "delimited",
            size = index.records(),
            end = index.end(),
            capacity = region.capacity(),
            "opened stack"
        );

        let scratch_len = config.max_record_len();
        Ok(Self {
            region,
            index,
            scratch: [
                Vec::with_capacity(scratch_len),
                Vec::with_capacity(scratch_len),
                Vec::with_capacity(scratch_len),
            ],
            config,
        })
    }

    /// The current boundary table, `offset[0..=len]`.
    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    /// All record bytes, bottom to top, without the zero padding.
    pub fn data(&self) -> &[u8] {
        &self.region.bytes()[..self.index.end()]
    }

    /// Records bottom to top, delimiter included.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let bytes = self.region.bytes();
        self.index.ranges().map(move |r| &bytes[r])
    }

    /// Checks the table against the bytes: base zero, strictly increasing,
    /// within limits, every record delimited, and a clear tail.
    pub fn check_invariants(&self) -> bool {
        let bytes = self.region.bytes();
        let end = self.index.end();
        self.index.check()
            && end <= self.region.capacity()
            && self.index.records() <= self.config.max_stack_size
            && self
                .index
                .ranges()
                .all(|r| bytes[r.end - 1] == self.config.delimiter)
            && first_nonzero(&bytes[end..]).is_none()
    }

    /// Flushes everything and releases the file.
    pub fn close(self) -> Result<(), StackError> {
        self.region.flush()?;
        Ok(())
    }

    fn require(&self, needed: usize, op: &'static str) -> Result<(), StackError> {
        let size = self.index.records();
        if size < needed {
            return Err(StackError::Underflow { op, needed, size });
        }
        Ok(())
    }

    /// The last `N` boundaries, bottom first. Callers check the size first.
    fn tail<const N: usize>(&self) -> [usize; N] {
        let offsets = self.index.as_slice();
        let mut out = [0; N];
        out.copy_from_slice(&offsets[offsets.len() - N..]);
        out
    }
}

impl StackStore for DelimitedStack {
    fn config(&self) -> &StackConfig {
        &self.config
    }

    fn len(&self) -> usize {
        self.index.records()
    }

    /// Appends `item` at the current end of data.
    fn push(&mut self, item: &[u8]) -> Result<(), StackError> {
        if self.index.records() >= self.config.max_stack_size {
            return Err(StackError::StackOverflow {
                max: self.config.max_stack_size,
            });
        }
        validate_item(item, &self.config)?;

        let start = self.index.end();
        let available = self.region.capacity() - start;
        if item.len() > available {
            return Err(StackError::FileTooLarge {
                needed: item.len(),
                available,
            });
        }

        self.index.append(start + item.len())?;
        if let Err(e) = self.region.write_at(start, item) {
            self.index.pop_last();
            return Err(e.into());
        }
        self.region.flush_range(start, item.len())?;

        trace!(size = self.index.records(), end = self.index.end(), "push");
        Ok(())
    }

    /// Removes the top record and zeroes the bytes it occupied.
    fn drop_top(&mut self) -> Result<(), StackError> {
        self.require(1, "drop")?;
        let [start, end] = self.tail::<2>();

        self.region.zero(start..end)?;
        self.index.pop_last();
        self.region.flush_range(start, end - start)?;

        trace!(size = self.index.records(), end = start, "drop");
        Ok(())
    }

    /// Exchanges the top two records.
    ///
    /// ```text
    /// before: [.. | B b_start..a_start | A a_start..end ]
    /// after:  [.. | A b_start..b_start+len(A) | B ..end ]
    /// ```
    fn swap(&mut self) -> Result<(), StackError> {
        self.require(2, "swap")?;
        let [b_start, a_start, end] = self.tail::<3>();

        let bytes = self.region.bytes();
        let [a, b, _] = &mut self.scratch;
        stage(a, &bytes[a_start..end]);
        stage(b, &bytes[b_start..a_start]);

        let split = b_start + a.len();
        self.region.write_at(b_start, a)?;
        self.region.write_at(split, b)?;

        let slot = self.index.as_slice().len() - 2;
        self.index.overwrite(slot, split)?;
        self.region.flush_range(b_start, end - b_start)?;

        trace!(split, "swap");
        Ok(())
    }

    /// Moves the top record beneath the two records under it.
    ///
    /// ```text
    /// before: [.. | A a..b | B b..c | C c..end ]
    /// after:  [.. | C      | A      | B        ]
    /// ```
    fn rotate(&mut self) -> Result<(), StackError> {
        self.require(3, "rotate")?;
        let [a_start, b_start, c_start, end] = self.tail::<4>();

        let bytes = self.region.bytes();
        let [a, b, c] = &mut self.scratch;
        stage(a, &bytes[a_start..b_start]);
        stage(b, &bytes[b_start..c_start]);
        stage(c, &bytes[c_start..end]);

        let first_split = a_start + c.len();
        let second_split = first_split + a.len();
        self.region.write_at(a_start, c)?;
        self.region.write_at(first_split, a)?;
        self.region.write_at(second_split, b)?;

        // upper boundary first so each overwrite sees a strictly increasing table
        let top = self.index.as_slice().len() - 2;
        self.index.overwrite(top, second_split)?;
        self.index.overwrite(top - 1, first_split)?;
        self.region.flush_range(a_start, end - a_start)?;

        trace!(first_split, second_split, "rotate");
        Ok(())
    }

    fn view(&self) -> Option<View<'_>> {
        let size = self.index.records();
        if size == 0 {
            return None;
        }
        let [top_start, end] = self.tail::<2>();
        let bytes = self.region.bytes();
        Some(View::packed(
            &bytes[top_start..end],
            &bytes[..top_start],
            self.config.delimiter,
            size,
        ))
    }

    fn flush(&self) -> Result<(), StackError> {
        self.region.flush()?;
        Ok(())
    }
}

fn stage(buf: &mut Vec<u8>, src: &[u8]) {
    buf.clear();
    buf.extend_from_slice(src);
}

/// Rebuilds the boundary table from `bytes` and rejects anything a sequence
/// of valid pushes could not have produced.
fn rebuild_index(bytes: &[u8], config: &StackConfig) -> Result<OffsetIndex, OpenError> {
    // a scan only ever appends increasing offsets, so overflow is the one failure
    let index = OffsetIndex::rebuild(bytes, config.delimiter, config.max_stack_size).map_err(
        |err| {
            let max_records = match err {
                IndexError::Overflow { max_records } => max_records,
                _ => config.max_stack_size,
            };
            // first byte of the record that did not fit
            let offset = bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == config.delimiter)
                .nth(max_records.saturating_sub(1))
                .map_or(0, |(p, _)| p + 1);
            OpenError::Corrupt {
                offset,
                kind: Corruption::TooManyRecords,
            }
        },
    )?;

    for range in index.ranges() {
        let len = range.len();
        if len == 1 {
            return Err(OpenError::Corrupt {
                offset: range.start,
                kind: Corruption::BlankRecord,
            });
        }
        if len > config.max_record_len() {
            return Err(OpenError::Corrupt {
                offset: range.start,
                kind: Corruption::RecordTooLong { len },
            });
        }
    }

    let end = index.end();
    if let Some(pos) = first_nonzero(&bytes[end..]) {
        return Err(OpenError::Corrupt {
            offset: end + pos,
            kind: Corruption::TrailingBytes,
        });
    }

    Ok(index)
}
