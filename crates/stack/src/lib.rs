//! # taskstack — durable LIFO task stack in a mapped file
//!
//! A bounded stack of short text items stored in one fixed-capacity file.
//! The file is mapped into memory ([`region::Region`]) and every mutation is
//! flushed synchronously before it reports success, so a returned `Ok`
//! survives a crash.
//!
//! Two interchangeable layouts implement the same [`StackStore`] interface:
//!
//! - [`DelimitedStack`]: variable-length records packed back to back,
//!   located through an [`offsets::OffsetIndex`] that is rebuilt by scanning
//!   for the delimiter at open time. Supports push, drop, swap, and rotate.
//! - [`SlotStack`]: one fixed-width, zero-padded slot per item. Supports
//!   push, drop, and swap.
//!
//! ## File layout (delimited)
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ rec 0 ... \n │ rec 1 ... \n │ ... │ rec n-1 ... \n │  data
//! ├────────────────────────────────────────────────────┤
//! │ 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 │  padding to capacity
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! No header, no metadata: the bytes are the whole state.
//!
//! ## Example
//! ```rust,no_run
//! use taskstack::{open_path, StackConfig, StackStore};
//!
//! let mut stack = open_path("tasks", StackConfig::default()).unwrap();
//! stack.push(b"write report\n").unwrap();
//! stack.push_text(b"call back").unwrap();
//! stack.swap().unwrap();
//! if let Some(view) = stack.view() {
//!     assert_eq!(view.top, b"write report\n");
//! }
//! ```

mod config;
mod delimited;
mod error;
mod format;
mod item;
mod slotted;
mod view;

use std::fs::File;
use std::path::Path;

pub use config::{NewlinePolicy, StackConfig};
pub use delimited::DelimitedStack;
pub use error::{ConfigError, Corruption, ErrorClass, OpenError, StackError};
pub use format::{
    Layout, DEFAULT_DELIMITER, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_ITEM_SIZE,
    DEFAULT_MAX_STACK_SIZE,
};
pub use item::{prepare_item, validate_item};
pub use slotted::SlotStack;
pub use view::{Rest, View};

/// Operations shared by both stack layouts.
///
/// Every mutating method either succeeds after flushing its change to the
/// file, or fails. Capacity, validation, and underflow failures leave the
/// stack exactly as it was.
pub trait StackStore {
    fn config(&self) -> &StackConfig;

    /// Number of items on the stack.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes one delimiter-terminated item.
    ///
    /// # Errors
    ///
    /// `StackOverflow`, `EmptyItem`, `ItemTooLong`, `ItemMissingNewline`,
    /// `InteriorDelimiter`, `FileTooLarge`, or a storage failure.
    fn push(&mut self, item: &[u8]) -> Result<(), StackError>;

    /// Removes the top item.
    fn drop_top(&mut self) -> Result<(), StackError>;

    /// Exchanges the two topmost items.
    fn swap(&mut self) -> Result<(), StackError>;

    /// Moves the top item below the next two.
    fn rotate(&mut self) -> Result<(), StackError>;

    /// The top item and the items beneath it, or `None` when empty.
    fn view(&self) -> Option<View<'_>>;

    /// Forces the whole backing file to stable storage.
    fn flush(&self) -> Result<(), StackError>;

    /// Pushes raw input after applying the configured [`NewlinePolicy`].
    fn push_text(&mut self, text: &[u8]) -> Result<(), StackError> {
        let item = prepare_item(text, self.config())?;
        self.push(&item)
    }
}

/// Opens a stack over an already-opened read/write `file`, choosing the
/// backend from `config.layout`.
pub fn open(file: File, config: StackConfig) -> Result<Box<dyn StackStore>, OpenError> {
    Ok(match config.layout {
        Layout::Delimited => Box::new(DelimitedStack::open(file, config)?),
        Layout::Slotted => Box::new(SlotStack::open(file, config)?),
    })
}

/// Opens (creating if missing) the stack file at `path`, choosing the
/// backend from `config.layout`.
pub fn open_path<P: AsRef<Path>>(
    path: P,
    config: StackConfig,
) -> Result<Box<dyn StackStore>, OpenError> {
    Ok(match config.layout {
        Layout::Delimited => Box::new(DelimitedStack::open_path(path, config)?),
        Layout::Slotted => Box::new(SlotStack::open_path(path, config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    fn small(layout: Layout) -> StackConfig {
        StackConfig::default()
            .with_layout(layout)
            .with_max_item_size(8)
            .with_max_stack_size(4)
            .with_max_file_size(64)
    }

    fn top(stack: &dyn StackStore) -> Vec<u8> {
        stack.view().map(|v| v.top.to_vec()).unwrap_or_default()
    }

    // ---------------------- Backend selection ----------------------

    #[test]
    fn both_layouts_share_push_drop_swap() -> Result<()> {
        for layout in [Layout::Delimited, Layout::Slotted] {
            let dir = tempdir()?;
            let mut stack = open_path(dir.path().join("stack"), small(layout))?;

            assert!(stack.is_empty());
            stack.push(b"first\n")?;
            stack.push(b"second\n")?;
            stack.swap()?;
            assert_eq!(top(stack.as_ref()), b"first\n", "{:?}", layout);

            stack.drop_top()?;
            assert_eq!(stack.len(), 1);
            assert_eq!(top(stack.as_ref()), b"second\n");
            stack.flush()?;
        }
        Ok(())
    }

    #[test]
    fn rotate_depends_on_layout() -> Result<()> {
        let dir = tempdir()?;
        let mut packed = open_path(dir.path().join("packed"), small(Layout::Delimited))?;
        let mut slots = open_path(dir.path().join("slots"), small(Layout::Slotted))?;

        for item in [&b"a\n"[..], &b"b\n"[..], &b"c\n"[..]] {
            packed.push(item)?;
            slots.push(item)?;
        }

        packed.rotate()?;
        assert_eq!(top(packed.as_ref()), b"b\n");

        let err = slots.rotate().unwrap_err();
        assert!(matches!(err, StackError::RotateUnsupported));
        assert_eq!(err.class(), ErrorClass::Unsupported);
        Ok(())
    }

    #[test]
    fn open_accepts_caller_opened_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("stack");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut stack = open(file, small(Layout::Delimited))?;
        stack.push(b"task\n")?;
        drop(stack);

        assert_eq!(&std::fs::read(&path)?[..5], b"task\n");
        Ok(())
    }

    // ---------------------- Newline policy ----------------------

    #[test]
    fn push_text_appends_delimiter_by_default() -> Result<()> {
        let dir = tempdir()?;
        let mut stack = open_path(dir.path().join("stack"), small(Layout::Delimited))?;

        stack.push_text(b"buy milk")?;
        stack.push_text(b"done\n")?;

        let view = stack.view().unwrap();
        assert_eq!(view.top, b"done\n");
        assert_eq!(view.rest().collect::<Vec<_>>(), vec![&b"buy milk\n"[..]]);
        Ok(())
    }

    #[test]
    fn push_text_rejects_under_reject_policy() -> Result<()> {
        let dir = tempdir()?;
        let config = small(Layout::Delimited).with_newline_policy(NewlinePolicy::Reject);
        let mut stack = open_path(dir.path().join("stack"), config)?;

        let err = stack.push_text(b"buy milk").unwrap_err();
        assert!(matches!(err, StackError::ItemMissingNewline));
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(stack.is_empty());
        Ok(())
    }

    #[test]
    fn push_is_strict_regardless_of_policy() -> Result<()> {
        let dir = tempdir()?;
        let mut stack = open_path(dir.path().join("stack"), small(Layout::Delimited))?;
        assert_eq!(stack.config().newline_policy, NewlinePolicy::Append);
        assert!(matches!(
            stack.push(b"no nl"),
            Err(StackError::ItemMissingNewline)
        ));
        assert!(stack.is_empty());
        assert!(stack.view().is_none());
        Ok(())
    }

    // ---------------------- Error classes ----------------------

    #[test]
    fn errors_are_classified() -> Result<()> {
        let dir = tempdir()?;
        let mut stack = open_path(dir.path().join("stack"), small(Layout::Delimited))?;

        assert_eq!(stack.drop_top().unwrap_err().class(), ErrorClass::Underflow);
        assert_eq!(
            stack.push(b"far too long\n").unwrap_err().class(),
            ErrorClass::Capacity
        );
        for _ in 0..4 {
            stack.push(b"x\n")?;
        }
        let err = stack.push(b"y\n").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Capacity);
        assert_eq!(err.to_string(), "stack is full (4 items)");
        Ok(())
    }
}
