//! Stack configuration: layout selection, size limits, and input policy.

use std::str::FromStr;

use crate::error::ConfigError;
use crate::format::{
    Layout, DEFAULT_DELIMITER, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_ITEM_SIZE,
    DEFAULT_MAX_STACK_SIZE,
};

/// What [`prepare_item`](crate::prepare_item) does with text that does not
/// end in the delimiter.
///
/// The engine's `push` always rejects such items; this policy only applies to
/// callers that go through `push_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewlinePolicy {
    /// Append the delimiter before pushing.
    #[default]
    Append,
    /// Pass the text through unchanged, so it fails with `ItemMissingNewline`.
    Reject,
}

impl FromStr for NewlinePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::InvalidValue {
                var: "newline policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Limits and layout for a stack file.
///
/// All sizes are in bytes except `max_stack_size`, which counts items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub layout: Layout,
    /// Byte that terminates every record. Must not be zero.
    pub delimiter: u8,
    /// Longest item text, not counting the delimiter.
    pub max_item_size: usize,
    pub max_stack_size: usize,
    /// Capacity of the backing file for the delimited layout, and the upper
    /// bound on the computed slot capacity for the fixed-slot layout.
    pub max_file_size: usize,
    pub newline_policy: NewlinePolicy,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            delimiter: DEFAULT_DELIMITER,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            newline_policy: NewlinePolicy::default(),
        }
    }
}

impl StackConfig {
    /// Creates configuration from environment variables over the defaults.
    ///
    /// Environment variables:
    /// - `TASKSTACK_LAYOUT`: "delimited" or "slotted"
    /// - `TASKSTACK_DELIMITER`: a single byte, or `\n` / `\t`
    /// - `TASKSTACK_MAX_ITEM_SIZE`, `TASKSTACK_MAX_STACK_SIZE`, `TASKSTACK_MAX_FILE_SIZE`
    /// - `TASKSTACK_NEWLINE`: "append" or "reject"
    ///
    /// The result is validated before it is returned.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("TASKSTACK_LAYOUT") {
            config.layout = v.parse()?;
        }
        if let Some(v) = lookup("TASKSTACK_DELIMITER") {
            config.delimiter = parse_delimiter(&v)?;
        }
        if let Some(v) = lookup("TASKSTACK_MAX_ITEM_SIZE") {
            config.max_item_size = parse_size("TASKSTACK_MAX_ITEM_SIZE", &v)?;
        }
        if let Some(v) = lookup("TASKSTACK_MAX_STACK_SIZE") {
            config.max_stack_size = parse_size("TASKSTACK_MAX_STACK_SIZE", &v)?;
        }
        if let Some(v) = lookup("TASKSTACK_MAX_FILE_SIZE") {
            config.max_file_size = parse_size("TASKSTACK_MAX_FILE_SIZE", &v)?;
        }
        if let Some(v) = lookup("TASKSTACK_NEWLINE") {
            config.newline_policy = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_item_size(mut self, max_item_size: usize) -> Self {
        self.max_item_size = max_item_size;
        self
    }

    pub fn with_max_stack_size(mut self, max_stack_size: usize) -> Self {
        self.max_stack_size = max_stack_size;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_newline_policy(mut self, policy: NewlinePolicy) -> Self {
        self.newline_policy = policy;
        self
    }

    /// Longest record in bytes, delimiter included. Also the scratch buffer size.
    pub fn max_record_len(&self) -> usize {
        self.max_item_size.saturating_add(1)
    }

    /// Bytes the backing file must span for the configured layout.
    pub fn capacity(&self) -> usize {
        match self.layout {
            Layout::Delimited => self.max_file_size,
            Layout::Slotted => self.max_stack_size.saturating_mul(self.max_record_len()),
        }
    }

    /// Checks that the configuration describes a usable stack.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter == 0 {
            // zero is the padding byte for both layouts
            return Err(ConfigError::ZeroDelimiter);
        }
        for (field, value) in [
            ("max_item_size", self.max_item_size),
            ("max_stack_size", self.max_stack_size),
            ("max_file_size", self.max_file_size),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSize { field });
            }
        }
        if self.layout == Layout::Slotted && self.capacity() > self.max_file_size {
            return Err(ConfigError::SlotsExceedFile {
                needed: self.capacity(),
                max_file_size: self.max_file_size,
            });
        }
        Ok(())
    }
}

fn parse_size(var: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
        })
}

fn parse_delimiter(value: &str) -> Result<u8, ConfigError> {
    match value {
        "\\n" => Ok(b'\n'),
        "\\t" => Ok(b'\t'),
        v if v.len() == 1 => Ok(v.as_bytes()[0]),
        _ => Err(ConfigError::InvalidValue {
            var: "TASKSTACK_DELIMITER".to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = StackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delimiter, b'\n');
        assert_eq!(config.max_record_len(), 128);
        assert_eq!(config.capacity(), 4096);
    }

    #[test]
    fn default_limits_fit_the_slot_layout() {
        let config = StackConfig::default().with_layout(Layout::Slotted);
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity(), 32 * 128);
    }

    #[test]
    fn zero_delimiter_is_rejected() {
        let config = StackConfig::default().with_delimiter(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroDelimiter));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = StackConfig::default().with_max_stack_size(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroSize {
                field: "max_stack_size"
            })
        );
    }

    #[test]
    fn slots_larger_than_file_are_rejected() {
        let config = StackConfig::default()
            .with_layout(Layout::Slotted)
            .with_max_stack_size(100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SlotsExceedFile { needed: 12800, .. })
        ));
    }

    // -------------------- Environment --------------------

    #[test]
    fn lookup_overrides_defaults() {
        let config = StackConfig::from_lookup(lookup_from(&[
            ("TASKSTACK_LAYOUT", "slotted"),
            ("TASKSTACK_DELIMITER", ";"),
            ("TASKSTACK_MAX_ITEM_SIZE", "15"),
            ("TASKSTACK_MAX_STACK_SIZE", "8"),
            ("TASKSTACK_MAX_FILE_SIZE", "1024"),
            ("TASKSTACK_NEWLINE", "reject"),
        ]))
        .unwrap();

        assert_eq!(config.layout, Layout::Slotted);
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.max_item_size, 15);
        assert_eq!(config.max_stack_size, 8);
        assert_eq!(config.max_file_size, 1024);
        assert_eq!(config.newline_policy, NewlinePolicy::Reject);
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = StackConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, StackConfig::default());
    }

    #[test]
    fn escaped_newline_delimiter() {
        let config =
            StackConfig::from_lookup(lookup_from(&[("TASKSTACK_DELIMITER", "\\n")])).unwrap();
        assert_eq!(config.delimiter, b'\n');
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = StackConfig::from_lookup(lookup_from(&[("TASKSTACK_MAX_ITEM_SIZE", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "TASKSTACK_MAX_ITEM_SIZE".to_string(),
                value: "lots".to_string()
            }
        );
        assert!(StackConfig::from_lookup(lookup_from(&[("TASKSTACK_DELIMITER", "ab")])).is_err());
        assert!(StackConfig::from_lookup(lookup_from(&[("TASKSTACK_NEWLINE", "maybe")])).is_err());
    }
}
