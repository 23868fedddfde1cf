#![forbid(unsafe_code)]

//! History configuration.
//!
//! The history has one tunable: the capacity of the done log. With the
//! `config` feature, [`HistoryConfig`] loads from TOML or JSON.
//!
//! ```toml
//! # rewind.toml
//! limit = 500
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("rewind.toml")?;
//! let history = History::with_config(config);
//! ```

#[cfg(feature = "config")]
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default capacity of the done log.
pub const DEFAULT_LIMIT: usize = 10_000;

/// Configuration for an action history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of entries kept in the done log. Oldest entries are
    /// evicted first.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with a custom done-log capacity.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Set the done-log capacity.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Configuration without a practical capacity (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self { limit: usize::MAX }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }
}

/// Errors loading a [`HistoryConfig`].
#[cfg(feature = "config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(serde_json::Error),
}
