//! Resource loading utilities
//!
//! This module loads schema models and XML documents from the file
//! system, enforcing the configured size limit.

use crate::error::{Error, Result};
use crate::limits::Limits;
use std::fs;
use std::path::Path;

/// Resource loader for schema models and documents
#[derive(Debug, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a file as a string
    pub fn load(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| {
            Error::Resource(format!("Failed to stat file '{}': {}", path.display(), e))
        })?;
        self.limits.check_xml_size(metadata.len() as usize)?;

        fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
        })
    }
}
