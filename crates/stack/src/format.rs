//! On-disk layout constants and byte-level helpers shared by both backends.
//!
//! Delimited layout (no header, zero padding up to capacity):
//!
//! ```text
//! [rec 0 .. \n][rec 1 .. \n] ... [rec n-1 .. \n][0 0 0 ... 0]
//! ```
//!
//! Fixed-slot layout (`max_stack_size` slots of `max_item_size + 1` bytes):
//!
//! ```text
//! [item 0 \n 0 0][item 1 \n 0 0 0] ... [0 0 0 0 0 0]
//! ```

use std::str::FromStr;

use crate::error::ConfigError;

/// Record terminator used unless configured otherwise.
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// Longest item text in bytes, excluding the delimiter.
pub const DEFAULT_MAX_ITEM_SIZE: usize = 127;

/// Most items the stack may hold.
pub const DEFAULT_MAX_STACK_SIZE: usize = 32;

/// Capacity of the delimited backing file.
pub const DEFAULT_MAX_FILE_SIZE: usize = 4096;

/// Which of the two on-disk layouts a stack file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Variable-length records packed back to back, found by scanning for the delimiter.
    #[default]
    Delimited,
    /// One fixed-width, zero-padded slot per item.
    Slotted,
}

impl FromStr for Layout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delimited" | "packed" => Ok(Self::Delimited),
            "slotted" | "fixed" | "slots" => Ok(Self::Slotted),
            _ => Err(ConfigError::InvalidValue {
                var: "layout".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Strips the zero padding from a fixed-width slot.
///
/// An empty result means the slot is free.
pub fn trim_slot(slot: &[u8]) -> &[u8] {
    let used = slot.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    &slot[..used]
}

/// Position of the first non-zero byte in `bytes`, if any.
pub fn first_nonzero(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|b| *b != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_slot_strips_padding_only() {
        assert_eq!(trim_slot(b"ab\n\0\0"), b"ab\n");
        assert_eq!(trim_slot(b"a\0b\n\0"), b"a\0b\n");
        assert_eq!(trim_slot(b"\0\0\0"), b"");
        assert_eq!(trim_slot(b""), b"");
    }

    #[test]
    fn first_nonzero_finds_stray_bytes() {
        assert_eq!(first_nonzero(&[0, 0, 0]), None);
        assert_eq!(first_nonzero(&[0, 0, 7, 0]), Some(2));
    }

    #[test]
    fn layout_parses_aliases() {
        assert_eq!("delimited".parse::<Layout>().unwrap(), Layout::Delimited);
        assert_eq!(" Fixed ".parse::<Layout>().unwrap(), Layout::Slotted);
        assert!("btree".parse::<Layout>().is_err());
    }
}
