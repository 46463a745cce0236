//! Sanitization configuration.
//!
//! Block geometry, pipeline depth and reporting cadence are fixed for
//! a whole session. Everything has a default so an empty TOML file is
//! a valid configuration.

use crate::analysis::{EntropyPolicy, DEFAULT_ENTROPY_THRESHOLD};
use crate::wipe::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Pipeline and hashing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeConfig {
    /// Bytes per generated/written block.
    pub block_size: usize,
    /// Blocks buffered between generator and writer.
    pub queue_depth: usize,
    /// Report write progress every N blocks (and on the last block).
    pub write_report_interval: u64,
    /// Report hashing progress every N blocks (and on the last block).
    pub hash_report_interval: u64,
    /// Digest used for surface checkpoints.
    pub hash_algorithm: HashAlgorithm,
    /// Sync the device to media after each write pass, then drop its
    /// cached pages before the verification read.
    pub sync_after_pass: bool,
    /// Compare each post-pass readback digest with the digest of the
    /// blocks that were handed to the writer.
    pub verify_against_stream: bool,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            block_size: MIB,
            queue_depth: 16,
            write_report_interval: 25,
            hash_report_interval: 50,
            hash_algorithm: HashAlgorithm::Sha256,
            sync_after_pass: true,
            verify_against_stream: true,
        }
    }
}

/// Live entropy checking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Minimum bits per byte.
    pub threshold: f64,
    /// Check every Nth written block.
    pub interval: u64,
    /// Response to a threshold miss.
    pub policy: EntropyPolicy,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ENTROPY_THRESHOLD,
            interval: 100,
            policy: EntropyPolicy::Warn,
        }
    }
}

/// Post-wipe random sector audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Number of sample attempts.
    pub samples: u32,
    /// Bytes read per sample.
    pub sample_size: usize,
    /// Physical sector size; sample offsets are multiples of it.
    pub sector_size: u64,
    /// Fixed RNG seed for reproducible offsets.
    pub rng_seed: Option<u64>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            sample_size: 4096,
            sector_size: 512,
            rng_seed: None,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pass pipeline and hashing.
    #[serde(default)]
    pub wipe: WipeConfig,
    /// Live entropy checks.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Random sector audit.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.sector_size == 0 {
            return Err(ConfigError::InvalidSectorSize);
        }
        let sector = self.audit.sector_size as usize;

        if self.wipe.block_size == 0 || self.wipe.block_size % sector != 0 {
            return Err(ConfigError::InvalidBlockSize {
                block_size: self.wipe.block_size,
                sector_size: self.audit.sector_size,
            });
        }
        if self.wipe.queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }
        if self.wipe.write_report_interval == 0
            || self.wipe.hash_report_interval == 0
            || self.watchdog.interval == 0
        {
            return Err(ConfigError::InvalidInterval);
        }
        if !(0.0..=8.0).contains(&self.watchdog.threshold) {
            return Err(ConfigError::InvalidThreshold(self.watchdog.threshold));
        }
        if self.audit.sample_size == 0 || self.audit.sample_size % sector != 0 {
            return Err(ConfigError::InvalidSampleSize {
                sample_size: self.audit.sample_size,
                sector_size: self.audit.sector_size,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[allow(missing_docs)]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("block size {block_size} must be a non-zero multiple of sector size {sector_size}")]
    InvalidBlockSize { block_size: usize, sector_size: u64 },
    #[error("queue depth must be at least 1")]
    InvalidQueueDepth,
    #[error("report and watchdog intervals must be at least 1")]
    InvalidInterval,
    #[error("entropy threshold {0} outside 0.0-8.0")]
    InvalidThreshold(f64),
    #[error("sector size must be non-zero")]
    InvalidSectorSize,
    #[error("sample size {sample_size} must be a non-zero multiple of sector size {sector_size}")]
    InvalidSampleSize { sample_size: usize, sector_size: u64 },
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.wipe.block_size, MIB);
        assert_eq!(config.wipe.queue_depth, 16);
        assert_eq!(config.watchdog.threshold, 7.9);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.wipe.write_report_interval, 25);
        assert_eq!(config.wipe.hash_report_interval, 50);
        assert_eq!(config.audit.samples, 20);
        assert_eq!(config.audit.rng_seed, None);
        assert!(config.wipe.verify_against_stream);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [wipe]
            block_size = 65536
            hash_algorithm = "blake3"

            [watchdog]
            policy = "abort"

            [audit]
            rng_seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.wipe.block_size, 65536);
        assert_eq!(config.wipe.queue_depth, 16);
        assert_eq!(config.wipe.hash_algorithm, HashAlgorithm::Blake3);
        assert_eq!(config.watchdog.policy, EntropyPolicy::Abort);
        assert_eq!(config.audit.rng_seed, Some(42));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unaligned_block_size_invalid() {
        let mut config = Config::default();
        config.wipe.block_size = 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBlockSize { .. })
        ));
    }

    #[test]
    fn test_zero_queue_depth_invalid() {
        let mut config = Config::default();
        config.wipe.queue_depth = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQueueDepth)
        ));
    }

    #[test]
    fn test_threshold_out_of_range_invalid() {
        let mut config = Config::default();
        config.watchdog.threshold = 8.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_unaligned_sample_size_invalid() {
        let mut config = Config::default();
        config.audit.sample_size = 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSampleSize { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_read_error() {
        assert!(matches!(
            Config::from_file("/nonexistent/forensic-wipe.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
