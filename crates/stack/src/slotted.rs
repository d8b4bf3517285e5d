use region::{Region, Sizing};
use std::fs::File;
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::config::StackConfig;
use crate::error::{Corruption, OpenError, StackError};
use crate::format::{trim_slot, Layout};
use crate::item::validate_item;
use crate::view::View;
use crate::StackStore;

/// Stack stored as `max_stack_size` fixed-width, zero-padded slots.
///
/// Slot `i` holds item `i` verbatim, delimiter included, followed by zeros.
/// A free slot is all zeros. The size is the number of leading used slots;
/// nothing else is persisted. This layout cannot rotate.
pub struct SlotStack {
    region: Region,
    config: StackConfig,
    size: usize,
    width: usize,
    scratch: [Vec<u8>; 2],
}

impl SlotStack {
    /// Maps `file` as a slot array and counts the used slots.
    ///
    /// An empty file is initialised to the full slot capacity; any other
    /// length that does not match it is rejected with
    /// [`RegionError::SizeMismatch`](region::RegionError::SizeMismatch).
    pub fn open(file: File, config: StackConfig) -> Result<Self, OpenError> {
        let config = config.with_layout(Layout::Slotted);
        config.validate()?;
        let region = Region::map(file, config.capacity(), Sizing::Exact)?;
        Self::from_region(region, config)
    }

    /// Opens (creating if missing) the slot file at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P, config: StackConfig) -> Result<Self, OpenError> {
        let config = config.with_layout(Layout::Slotted);
        config.validate()?;
        let region = Region::open_path(path, config.capacity(), Sizing::Exact)?;
        Self::from_region(region, config)
    }

    fn from_region(region: Region, config: StackConfig) -> Result<Self, OpenError> {
        let width = config.max_record_len();
        let size = count_slots(region.bytes(), width, config.delimiter).map_err(|err| {
            if let OpenError::Corrupt { offset, kind } = &err {
                warn!(offset, %kind, "refusing corrupt slot file");
            }
            err
        })?;

        debug!(
            layout = "slotted",
            size,
            width,
            capacity = region.capacity(),
            "opened stack"
        );

        Ok(Self {
            region,
            size,
            width,
            scratch: [Vec::with_capacity(width), Vec::with_capacity(width)],
            config,
        })
    }

    /// Width of one slot in bytes.
    pub fn slot_width(&self) -> usize {
        self.width
    }

    /// Used slots, bottom to top, padding removed.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.region.bytes()[..self.size * self.width]
            .chunks(self.width)
            .map(trim_slot)
    }

    /// Flushes everything and releases the file.
    pub fn close(self) -> Result<(), StackError> {
        self.region.flush()?;
        Ok(())
    }

    fn slot_start(&self, slot: usize) -> usize {
        slot * self.width
    }

    fn require(&self, needed: usize, op: &'static str) -> Result<(), StackError> {
        if self.size < needed {
            return Err(StackError::Underflow {
                op,
                needed,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl StackStore for SlotStack {
    fn config(&self) -> &StackConfig {
        &self.config
    }

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, item: &[u8]) -> Result<(), StackError> {
        if self.size >= self.config.max_stack_size {
            return Err(StackError::StackOverflow {
                max: self.config.max_stack_size,
            });
        }
        validate_item(item, &self.config)?;

        let start = self.slot_start(self.size);
        self.region.write_at(start, item)?;
        self.size += 1;
        self.region.flush_range(start, self.width)?;

        trace!(size = self.size, "push");
        Ok(())
    }

    fn drop_top(&mut self) -> Result<(), StackError> {
        self.require(1, "drop")?;

        let start = self.slot_start(self.size - 1);
        self.region.zero(start..start + self.width)?;
        self.size -= 1;
        self.region.flush_range(start, self.width)?;

        trace!(size = self.size, "drop");
        Ok(())
    }

    /// Exchanges the top two slots, padding included.
    fn swap(&mut self) -> Result<(), StackError> {
        self.require(2, "swap")?;

        let lower = self.slot_start(self.size - 2);
        let upper = lower + self.width;
        let bytes = self.region.bytes();
        let [l, u] = &mut self.scratch;
        l.clear();
        l.extend_from_slice(&bytes[lower..upper]);
        u.clear();
        u.extend_from_slice(&bytes[upper..upper + self.width]);

        self.region.write_at(lower, u)?;
        self.region.write_at(upper, l)?;
        self.region.flush_range(lower, 2 * self.width)?;

        trace!(size = self.size, "swap");
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), StackError> {
        Err(StackError::RotateUnsupported)
    }

    fn view(&self) -> Option<View<'_>> {
        if self.size == 0 {
            return None;
        }
        let top_start = self.slot_start(self.size - 1);
        let bytes = self.region.bytes();
        Some(View::slotted(
            trim_slot(&bytes[top_start..top_start + self.width]),
            &bytes[..top_start],
            self.width,
            self.size,
        ))
    }

    fn flush(&self) -> Result<(), StackError> {
        self.region.flush()?;
        Ok(())
    }
}

/// Counts leading used slots, rejecting gaps and any slot that `push` could
/// not have written: unterminated, blank, or split by an early delimiter.
fn count_slots(bytes: &[u8], width: usize, delimiter: u8) -> Result<usize, OpenError> {
    let mut size = 0;
    let mut free_seen = false;

    for (slot, chunk) in bytes.chunks(width).enumerate() {
        let used = trim_slot(chunk);
        if used.is_empty() {
            free_seen = true;
            continue;
        }
        if free_seen {
            return Err(OpenError::Corrupt {
                offset: slot * width,
                kind: Corruption::SlotGap { slot },
            });
        }
        if used.last() != Some(&delimiter) {
            return Err(OpenError::Corrupt {
                offset: slot * width,
                kind: Corruption::UnterminatedSlot { slot },
            });
        }
        if used.len() == 1 {
            return Err(OpenError::Corrupt {
                offset: slot * width,
                kind: Corruption::BlankSlot { slot },
            });
        }
        if let Some(position) = used[..used.len() - 1]
            .iter()
            .position(|b| *b == delimiter)
        {
            return Err(OpenError::Corrupt {
                offset: slot * width + position,
                kind: Corruption::SlotDelimiter { slot, position },
            });
        }
        size += 1;
    }

    Ok(size)
}
