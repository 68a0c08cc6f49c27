//! Access configuration.
//!
//! The host exposes a single recognized option, `file-caching`, read once at
//! open time. The remaining tunables default to the fixed constants of the read
//! loop and only exist so embedders and tests can shorten them.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default caching delay handed back to the consumer at open.
pub const DEFAULT_CACHING_MS: u64 = 300;
/// Readiness wait slice used while no data is available.
pub const DEFAULT_POLL_SLICE_MS: u64 = 500;
/// Pause after a failed read before returning to the caller.
pub const DEFAULT_ERROR_DELAY_MS: u64 = 100;
/// Pause between zero-byte reads in workaround mode.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;
/// Number of reads between two size re-checks.
pub const DEFAULT_SIZE_REFRESH_READS: u32 = 10;

/// Resolved settings used by [`crate::FileAccess`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessConfig {
    /// Buffering delay the consumer should apply.
    pub caching: Duration,
    /// Bounded readiness wait before re-checking cancellation.
    pub poll_slice: Duration,
    /// Delay applied after a read error.
    pub error_delay: Duration,
    /// Delay between zero-byte reads in workaround mode.
    pub retry_interval: Duration,
    /// Reads between size re-checks (never zero).
    pub size_refresh_reads: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            caching: Duration::from_millis(DEFAULT_CACHING_MS),
            poll_slice: Duration::from_millis(DEFAULT_POLL_SLICE_MS),
            error_delay: Duration::from_millis(DEFAULT_ERROR_DELAY_MS),
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            size_refresh_reads: DEFAULT_SIZE_REFRESH_READS,
        }
    }
}

/// On-disk form of the access settings (TOML, kebab-case keys).
///
/// ```toml
/// file-caching = 1200
/// poll-slice-ms = 250
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AccessConfigFile {
    /// Caching value in milliseconds.
    pub file_caching: Option<u64>,
    pub poll_slice_ms: Option<u64>,
    pub error_delay_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub size_refresh_reads: Option<u32>,
}

impl AccessConfigFile {
    /// Parse settings from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(ConfigError::Parse)
    }

    /// Read and parse a TOML settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Overlay the values present in the file onto `base`.
    pub fn apply(&self, base: AccessConfig) -> AccessConfig {
        let ms = Duration::from_millis;
        AccessConfig {
            caching: self.file_caching.map(ms).unwrap_or(base.caching),
            poll_slice: self.poll_slice_ms.map(ms).unwrap_or(base.poll_slice),
            error_delay: self.error_delay_ms.map(ms).unwrap_or(base.error_delay),
            retry_interval: self.retry_interval_ms.map(ms).unwrap_or(base.retry_interval),
            size_refresh_reads: self
                .size_refresh_reads
                .filter(|n| *n > 0)
                .unwrap_or(base.size_refresh_reads),
        }
    }
}
