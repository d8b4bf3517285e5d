use offsets::IndexError;
use region::RegionError;
use thiserror::Error;

/// Failure of a stack operation.
///
/// Every variant except `Index` and `Region` is raised before any byte or
/// boundary is touched, so the stack is unchanged when one is returned.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("stack is full ({max} items)")]
    StackOverflow { max: usize },
    #[error("item is {len} bytes, at most {max} allowed")]
    ItemTooLong { len: usize, max: usize },
    #[error("item does not end with the delimiter")]
    ItemMissingNewline,
    #[error("item is empty")]
    EmptyItem,
    #[error("item contains the delimiter at byte {position}")]
    InteriorDelimiter { position: usize },
    #[error("item needs {needed} bytes but only {available} remain in the file")]
    FileTooLarge { needed: usize, available: usize },
    #[error("{op} needs at least {needed} items, stack has {size}")]
    Underflow {
        op: &'static str,
        needed: usize,
        size: usize,
    },
    #[error("rotate is not supported by the fixed-slot layout")]
    RotateUnsupported,
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Coarse grouping of [`StackError`] for callers that only need to decide
/// how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A limit would be exceeded; shrink the item or the stack.
    Capacity,
    /// The item itself is malformed.
    Validation,
    /// Not enough items for the operation.
    Underflow,
    /// The layout cannot perform the operation at all.
    Unsupported,
    /// Storage or internal bookkeeping failed.
    Storage,
}

impl StackError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::StackOverflow { .. } | Self::ItemTooLong { .. } | Self::FileTooLarge { .. } => {
                ErrorClass::Capacity
            }
            Self::ItemMissingNewline | Self::EmptyItem | Self::InteriorDelimiter { .. } => {
                ErrorClass::Validation
            }
            Self::Underflow { .. } => ErrorClass::Underflow,
            Self::RotateUnsupported => ErrorClass::Unsupported,
            Self::Index(_) | Self::Region(_) => ErrorClass::Storage,
        }
    }
}

/// Invalid [`StackConfig`](crate::StackConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("delimiter must not be the zero byte")]
    ZeroDelimiter,
    #[error("{field} must be greater than zero")]
    ZeroSize { field: &'static str },
    #[error("fixed-slot layout needs {needed} bytes, above max_file_size {max_file_size}")]
    SlotsExceedFile { needed: usize, max_file_size: usize },
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: String, value: String },
}

/// What was wrong with a stack file found at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("more records than the stack may hold")]
    TooManyRecords,
    #[error("record holds only the delimiter")]
    BlankRecord,
    #[error("record of {len} bytes exceeds the item limit")]
    RecordTooLong { len: usize },
    #[error("non-zero bytes after the last record")]
    TrailingBytes,
    #[error("slot {slot} is used but an earlier slot is free")]
    SlotGap { slot: usize },
    #[error("slot {slot} does not end with the delimiter")]
    UnterminatedSlot { slot: usize },
    #[error("slot {slot} holds only the delimiter")]
    BlankSlot { slot: usize },
    #[error("slot {slot} holds the delimiter at byte {position} before its end")]
    SlotDelimiter { slot: usize, position: usize },
}

/// Failure to open a stack file.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("corrupt stack file at byte {offset}: {kind}")]
    Corrupt { offset: usize, kind: Corruption },
}
