//! Batch runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the conversion
//! and sidecar passes. Library code never reads environment variables itself; binaries read
//! them and hand the raw values to the `*_from_env_value` helpers below.

use crate::constants::{DEFAULT_CONVERTER, DEFAULT_DATA_ROOT};
use crate::{BatchError, BatchResult};
use std::path::{Path, PathBuf};

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    data_root: PathBuf,
    converter: PathBuf,
}

impl BatchConfig {
    /// Create a new `BatchConfig`.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::InvalidInput` if either path is empty.
    pub fn new(data_root: PathBuf, converter: PathBuf) -> BatchResult<Self> {
        if data_root.as_os_str().is_empty() {
            return Err(BatchError::InvalidInput("data root cannot be empty".into()));
        }
        if converter.as_os_str().is_empty() {
            return Err(BatchError::InvalidInput(
                "converter executable cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_root,
            converter,
        })
    }

    /// Root directory holding one directory per subject.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Converter executable, either a path or a name resolved through `PATH`.
    pub fn converter(&self) -> &Path {
        &self.converter
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            converter: PathBuf::from(DEFAULT_CONVERTER),
        }
    }
}

/// Resolve the data root from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATA_ROOT`].
pub fn data_root_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
}

/// Resolve the converter executable from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_CONVERTER`].
pub fn converter_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONVERTER))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
