//! Engine configuration.

/// Limits applied to intents during `prepare` validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum transaction name length in bytes.
    pub max_name_len: usize,

    /// Maximum business key length in bytes.
    pub max_key_len: usize,

    /// Maximum value length in bytes.
    pub max_value_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_len: 1024,
            max_key_len: 1024,
            max_value_len: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum transaction name length.
    #[must_use]
    pub const fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Sets the maximum key length.
    #[must_use]
    pub const fn max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Sets the maximum value length.
    #[must_use]
    pub const fn max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }
}
