//! Read-only snapshot of a stack for rendering.

use crate::format::trim_slot;

/// The top item plus an iterator over everything beneath it.
///
/// Borrowed straight from the mapped region; no bytes are copied.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// Top record, delimiter included.
    pub top: &'a [u8],
    rest: Rest<'a>,
    depth: usize,
}

impl<'a> View<'a> {
    pub(crate) fn packed(top: &'a [u8], below: &'a [u8], delimiter: u8, depth: usize) -> Self {
        Self {
            top,
            rest: Rest {
                source: Source::Packed { bytes: below, delimiter },
            },
            depth,
        }
    }

    pub(crate) fn slotted(top: &'a [u8], below: &'a [u8], width: usize, depth: usize) -> Self {
        Self {
            top,
            rest: Rest {
                source: Source::Slots { bytes: below, width },
            },
            depth,
        }
    }

    /// Records below the top, bottom first.
    pub fn rest(&self) -> Rest<'a> {
        self.rest
    }

    /// The records below the top as one contiguous run, when the layout
    /// stores them that way (delimited layout only).
    pub fn rest_bytes(&self) -> Option<&'a [u8]> {
        match self.rest.source {
            Source::Packed { bytes, .. } => Some(bytes),
            Source::Slots { .. } => None,
        }
    }

    /// Number of records in the stack, top included.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Iterator over the records beneath the top, bottom to top.
#[derive(Debug, Clone, Copy)]
pub struct Rest<'a> {
    source: Source<'a>,
}

#[derive(Debug, Clone, Copy)]
enum Source<'a> {
    Packed { bytes: &'a [u8], delimiter: u8 },
    Slots { bytes: &'a [u8], width: usize },
}

impl<'a> Iterator for Rest<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Packed { bytes, delimiter } => {
                let current: &'a [u8] = *bytes;
                if current.is_empty() {
                    return None;
                }
                let delimiter = *delimiter;
                let len = current
                    .iter()
                    .position(|b| *b == delimiter)
                    .map_or(current.len(), |p| p + 1);
                let (record, remaining) = current.split_at(len);
                *bytes = remaining;
                Some(record)
            }
            Source::Slots { bytes, width } => {
                let current: &'a [u8] = *bytes;
                let width = *width;
                if width == 0 || current.len() < width {
                    return None;
                }
                let (slot, remaining) = current.split_at(width);
                *bytes = remaining;
                Some(trim_slot(slot))
            }
        }
    }
}
