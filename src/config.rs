//! Configuration for tagtree
//!
//! Centralized configuration with sensible defaults.

use crate::nbt::Compression;

/// Main configuration shared by record stores and tree walks
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Compression used when a record created in memory is first saved.
    /// Records read from disk keep the scheme they were stored with.
    pub default_compression: Compression,

    /// Decode the first populated record while opening an archive, to reject
    /// files that merely look like region files
    pub verify_first_record: bool,

    // -------------------------------------------------------------------------
    // Tree Configuration
    // -------------------------------------------------------------------------
    /// How many nodes a walk visits between cancellation checks
    pub cancel_poll_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_compression: Compression::Zlib,
            verify_first_record: true,
            cancel_poll_interval: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the compression for newly created records
    pub fn default_compression(mut self, compression: Compression) -> Self {
        self.config.default_compression = compression;
        self
    }

    /// Enable or disable the first-record sanity check on open
    pub fn verify_first_record(mut self, verify: bool) -> Self {
        self.config.verify_first_record = verify;
        self
    }

    /// Set the number of nodes visited between cancellation checks
    pub fn cancel_poll_interval(mut self, interval: usize) -> Self {
        self.config.cancel_poll_interval = interval.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
