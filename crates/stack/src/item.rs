//! Item validation and the caller-side newline policy.

use std::borrow::Cow;

use crate::config::{NewlinePolicy, StackConfig};
use crate::error::StackError;

/// Checks that `item` can be stored as one record.
///
/// A valid item is non-empty, at most `max_item_size + 1` bytes, ends with
/// the delimiter, has some text before it, and contains no other delimiter.
/// Anything else would not survive a rescan of the file unchanged.
pub fn validate_item(item: &[u8], config: &StackConfig) -> Result<(), StackError> {
    let Some((&last, text)) = item.split_last() else {
        return Err(StackError::EmptyItem);
    };
    if item.len() > config.max_record_len() {
        return Err(StackError::ItemTooLong {
            len: item.len(),
            max: config.max_record_len(),
        });
    }
    if last != config.delimiter {
        return Err(StackError::ItemMissingNewline);
    }
    if text.is_empty() {
        return Err(StackError::EmptyItem);
    }
    if let Some(position) = text.iter().position(|b| *b == config.delimiter) {
        return Err(StackError::InteriorDelimiter { position });
    }
    Ok(())
}

/// Applies the configured [`NewlinePolicy`] to raw input text.
///
/// With [`NewlinePolicy::Append`] a missing delimiter is added; with
/// [`NewlinePolicy::Reject`] the text is returned unchanged and the later
/// push fails with [`StackError::ItemMissingNewline`]. Text that already ends
/// with the delimiter is never copied.
pub fn prepare_item<'a>(text: &'a [u8], config: &StackConfig) -> Result<Cow<'a, [u8]>, StackError> {
    if text.is_empty() {
        return Err(StackError::EmptyItem);
    }
    if text.last() == Some(&config.delimiter) {
        return Ok(Cow::Borrowed(text));
    }
    match config.newline_policy {
        NewlinePolicy::Append => {
            let mut owned = Vec::with_capacity(text.len() + 1);
            owned.extend_from_slice(text);
            owned.push(config.delimiter);
            Ok(Cow::Owned(owned))
        }
        NewlinePolicy::Reject => Ok(Cow::Borrowed(text)),
    }
}
