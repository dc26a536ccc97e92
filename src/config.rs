//! Configuration for tempstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a [`TemporaryStorage`](crate::TemporaryStorage) instance
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Size Classes
    // -------------------------------------------------------------------------
    /// Smallest block handed out by the pool (power of two).
    /// Classes double from here up to `max_block_size`.
    pub min_block_size: usize,

    /// Largest pooled block (power of two). Requests above this get a
    /// dedicated segment sized exactly to the request.
    pub max_block_size: usize,

    /// Capacity of a pooled segment. Classes whose block is larger than this
    /// use one block per segment.
    pub segment_capacity: usize,

    // -------------------------------------------------------------------------
    // Backing Store
    // -------------------------------------------------------------------------
    /// Where segment mappings come from
    pub backing: Backing,

    // -------------------------------------------------------------------------
    // Background Work
    // -------------------------------------------------------------------------
    /// Worker threads serving the `*_async` operations
    pub io_threads: usize,

    // -------------------------------------------------------------------------
    // Integrity
    // -------------------------------------------------------------------------
    /// Record a CRC32 per payload and verify it on every materializing read
    pub verify_checksums: bool,
}

/// Backing store for segment mappings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// Anonymous mappings (swap/pagefile backed, vanish with the process)
    Anonymous,

    /// File-backed mappings under a scratch directory:
    ///   {dir}/
    ///     ├── segment_000001.seg
    ///     └── segment_000002.seg
    /// Each file is removed when its segment is destroyed.
    Directory(PathBuf),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_block_size: 4 * 1024,          // 4 KB
            max_block_size: 2 * 1024 * 1024,   // 2 MB
            segment_capacity: 4 * 1024 * 1024, // 4 MB
            backing: Backing::Anonymous,
            io_threads: 4,
            verify_checksums: false,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the size-class layout and thread count
    pub fn validate(&self) -> Result<()> {
        if self.min_block_size == 0 || !self.min_block_size.is_power_of_two() {
            return Err(StoreError::Config(format!(
                "min_block_size must be a non-zero power of two, got {}",
                self.min_block_size
            )));
        }
        if !self.max_block_size.is_power_of_two() {
            return Err(StoreError::Config(format!(
                "max_block_size must be a power of two, got {}",
                self.max_block_size
            )));
        }
        if self.max_block_size < self.min_block_size {
            return Err(StoreError::Config(format!(
                "max_block_size ({}) is smaller than min_block_size ({})",
                self.max_block_size, self.min_block_size
            )));
        }
        if self.segment_capacity == 0 {
            return Err(StoreError::Config(
                "segment_capacity must be non-zero".to_string(),
            ));
        }
        if self.segment_capacity / self.min_block_size > u32::MAX as usize {
            return Err(StoreError::Config(format!(
                "segment_capacity ({}) holds more than {} blocks of {} bytes",
                self.segment_capacity,
                u32::MAX,
                self.min_block_size
            )));
        }
        if self.io_threads == 0 {
            return Err(StoreError::Config(
                "io_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: StoreConfig,
}

impl ConfigBuilder {
    /// Set the smallest block size (in bytes)
    pub fn min_block_size(mut self, size: usize) -> Self {
        self.config.min_block_size = size;
        self
    }

    /// Set the largest pooled block size (in bytes)
    pub fn max_block_size(mut self, size: usize) -> Self {
        self.config.max_block_size = size;
        self
    }

    /// Set the pooled segment capacity (in bytes)
    pub fn segment_capacity(mut self, size: usize) -> Self {
        self.config.segment_capacity = size;
        self
    }

    /// Use anonymous mappings
    pub fn anonymous(mut self) -> Self {
        self.config.backing = Backing::Anonymous;
        self
    }

    /// Back segments with files in the given scratch directory
    pub fn backing_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backing = Backing::Directory(path.into());
        self
    }

    /// Set the number of background I/O threads
    pub fn io_threads(mut self, count: usize) -> Self {
        self.config.io_threads = count;
        self
    }

    /// Enable or disable CRC32 verification on reads
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.config.verify_checksums = enabled;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
