//! Block store configuration
//!
//! Controls how a file is scanned for headers and whether the link pass may
//! write chain and timestamp metadata back to disk.
//!
//! ```toml
//! in_memory_scan_limit = 4194304
//! scan_chunk_size = 65536
//! link_mode = "writable-only"
//! ```

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Files up to this size are read whole and searched in memory
pub const DEFAULT_IN_MEMORY_SCAN_LIMIT: u64 = 4 * 1024 * 1024;

/// Read size for the streaming scanner
pub const DEFAULT_SCAN_CHUNK_SIZE: usize = 64 * 1024;

/// When the link pass (chain + creation stamps) is written back to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// Never rewrite headers during discovery
    Never,
    /// Rewrite only files opened read-write (never the running executable)
    #[default]
    WritableOnly,
    /// Always attempt the rewrite; failures are logged and ignored
    Always,
}

impl LinkMode {
    /// Whether a link pass should run for a store with the given access
    pub fn applies(self, writable: bool) -> bool {
        match self {
            LinkMode::Never => false,
            LinkMode::WritableOnly => writable,
            LinkMode::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Largest file size scanned in a single read
    pub in_memory_scan_limit: u64,

    /// Chunk size used when streaming larger files
    #[validate(range(min = 4096, max = 16777216))]
    pub scan_chunk_size: usize,

    pub link_mode: LinkMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            in_memory_scan_limit: DEFAULT_IN_MEMORY_SCAN_LIMIT,
            scan_chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
            link_mode: LinkMode::default(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(source).map_err(|e| EmbedError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| EmbedError::Config(e.to_string()))
    }

    /// Run field validation
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| EmbedError::Config(e.to_string()))
    }

    pub fn with_link_mode(mut self, link_mode: LinkMode) -> Self {
        self.link_mode = link_mode;
        self
    }

    pub fn with_in_memory_scan_limit(mut self, limit: u64) -> Self {
        self.in_memory_scan_limit = limit;
        self
    }

    pub fn with_scan_chunk_size(mut self, size: usize) -> Self {
        self.scan_chunk_size = size;
        self
    }
}
