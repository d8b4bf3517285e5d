//! # Region — fixed-capacity file-backed byte region
//!
//! The backing store for the taskstack engine. A [`Region`] maps a file of a
//! fixed capacity into memory with `memmap2`, so every write through
//! [`Region::write_at`] or [`Region::zero`] lands in the file's pages.
//! Nothing is durable until [`Region::flush`] or [`Region::flush_range`]
//! returns: both issue a synchronous `msync` and only return after the
//! kernel reports the pages written.
//!
//! A region owns its file for as long as it lives. Mapping takes an exclusive
//! advisory lock (`flock`) so a second process, or a second handle in the same
//! process, cannot mutate the same file underneath it.
//!
//! ## Sizing
//!
//! ```text
//! Sizing::AtMost  file_len <= capacity   zero-extend to capacity, map
//!                 file_len >  capacity   RegionError::TooLarge
//!
//! Sizing::Exact   file_len == 0          initialise to capacity, map
//!                 file_len == capacity   map
//!                 otherwise              RegionError::SizeMismatch
//! ```

use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Range;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("region capacity must be non-zero")]
    ZeroCapacity,
    #[error("file is {len} bytes, larger than the {capacity} byte capacity")]
    TooLarge { len: u64, capacity: usize },
    #[error("file is {actual} bytes, expected exactly {expected}")]
    SizeMismatch { expected: usize, actual: u64 },
    #[error("file is locked by another owner")]
    Locked,
    #[error("range {start}..{end} outside region of {capacity} bytes")]
    OutOfBounds {
        start: usize,
        end: usize,
        capacity: usize,
    },
}

/// How an existing file length is reconciled with the requested capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// The file may be shorter than capacity (it is zero-extended) but never longer.
    AtMost,
    /// The file must already be exactly capacity bytes, or empty.
    Exact,
}

/// A fixed-capacity byte region mirrored to a file.
pub struct Region {
    mmap: MmapMut,
    // Held for the lock; the mapping stays valid without it but the lock does not.
    file: File,
    capacity: usize,
    file_len_at_open: u64,
}

impl Region {
    /// Maps an already-opened read/write `file` as a region of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// - [`RegionError::ZeroCapacity`] if `capacity == 0`.
    /// - [`RegionError::Locked`] if another handle holds the file lock.
    /// - [`RegionError::TooLarge`] / [`RegionError::SizeMismatch`] per `sizing`.
    /// - [`RegionError::Io`] on any metadata, resize, or mmap failure.
    pub fn map(file: File, capacity: usize, sizing: Sizing) -> Result<Self, RegionError> {
        if capacity == 0 {
            return Err(RegionError::ZeroCapacity);
        }

        if let Err(e) = file.try_lock_exclusive() {
            return if e.kind() == fs2::lock_contended_error().kind() {
                Err(RegionError::Locked)
            } else {
                Err(RegionError::Io(e))
            };
        }

        let len = file.metadata()?.len();
        match sizing {
            Sizing::AtMost if len > capacity as u64 => {
                return Err(RegionError::TooLarge { len, capacity });
            }
            Sizing::Exact if len != 0 && len != capacity as u64 => {
                return Err(RegionError::SizeMismatch {
                    expected: capacity,
                    actual: len,
                });
            }
            _ => {}
        }

        if len < capacity as u64 {
            // new bytes read as zero, which both layouts treat as free space
            file.set_len(capacity as u64)?;
            file.sync_all()?;
        }

        // SAFETY: the file is exclusively locked for the region's lifetime and
        // has just been sized to at least `capacity` bytes.
        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file)? };

        debug!(capacity, file_len = len, ?sizing, "mapped region");

        Ok(Self {
            mmap,
            file,
            capacity,
            file_len_at_open: len,
        })
    }

    /// Opens (creating if missing) the file at `path` read/write and maps it.
    pub fn open_path<P: AsRef<Path>>(
        path: P,
        capacity: usize,
        sizing: Sizing,
    ) -> Result<Self, RegionError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        Self::map(file, capacity, sizing)
    }

    /// Total mapped size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length the file had before it was mapped (and possibly extended).
    pub fn file_len_at_open(&self) -> u64 {
        self.file_len_at_open
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Copies `data` into the region at `offset`.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        let range = self.checked(offset..offset.saturating_add(data.len()))?;
        self.mmap[range].copy_from_slice(data);
        Ok(())
    }

    /// Overwrites `range` with zero bytes.
    pub fn zero(&mut self, range: Range<usize>) -> Result<(), RegionError> {
        let range = self.checked(range)?;
        self.mmap[range].fill(0);
        Ok(())
    }

    /// Synchronously flushes the whole region to stable storage.
    pub fn flush(&self) -> Result<(), RegionError> {
        self.mmap.flush()?;
        Ok(())
    }

    /// Synchronously flushes `len` bytes starting at `offset`.
    ///
    /// An empty range is a no-op.
    pub fn flush_range(&self, offset: usize, len: usize) -> Result<(), RegionError> {
        self.checked(offset..offset.saturating_add(len))?;
        if len == 0 {
            return Ok(());
        }
        self.mmap.flush_range(offset, len)?;
        Ok(())
    }

    /// Returns a handle to the underlying file.
    pub fn file(&self) -> &File {
        &self.file
    }

    fn checked(&self, range: Range<usize>) -> Result<Range<usize>, RegionError> {
        if range.start > range.end || range.end > self.capacity {
            return Err(RegionError::OutOfBounds {
                start: range.start,
                end: range.end,
                capacity: self.capacity,
            });
        }
        Ok(range)
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("capacity", &self.capacity)
            .field("file_len_at_open", &self.file_len_at_open)
            .finish()
    }
}
