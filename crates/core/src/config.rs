//! Configuration types shared across crates.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::Duration;

/// Prefix of environment variables that override file configuration.
pub const ENV_PREFIX: &str = "BLOCKGATE_";

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory of the bucket.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/bucket"),
        }
    }
}

/// Bucket index consumption settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BucketIndexConfig {
    /// Use the tenant's bucket index instead of fetching deletion marks one by one.
    #[serde(default = "default_bucket_index_enabled")]
    pub enabled: bool,
    /// An index older than this is reported as stale (seconds).
    #[serde(default = "default_max_stale_period_secs")]
    pub max_stale_period_secs: u64,
}

fn default_bucket_index_enabled() -> bool {
    true
}

fn default_max_stale_period_secs() -> u64 {
    3600 // 1 hour
}

impl Default for BucketIndexConfig {
    fn default() -> Self {
        Self {
            enabled: default_bucket_index_enabled(),
            max_stale_period_secs: default_max_stale_period_secs(),
        }
    }
}

impl BucketIndexConfig {
    /// Get the max stale period as a Duration.
    pub fn max_stale_period(&self) -> Duration {
        Duration::seconds(i64::try_from(self.max_stale_period_secs).unwrap_or(i64::MAX))
    }
}

/// Block metadata filtering configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Grace period before a block marked for deletion stops being served (seconds).
    #[serde(default = "default_ignore_deletion_marks_delay_secs")]
    pub ignore_deletion_marks_delay_secs: u64,
    /// Maximum concurrent deletion mark fetches when the bucket index is not used.
    #[serde(default = "default_meta_sync_concurrency")]
    pub meta_sync_concurrency: usize,
    /// Blocks starting within this window of now are left to the ingesters (seconds).
    /// Zero disables the recency filter.
    #[serde(default)]
    pub ignore_blocks_within_secs: u64,
    /// Bucket index settings.
    #[serde(default)]
    pub bucket_index: BucketIndexConfig,
}

fn default_ignore_deletion_marks_delay_secs() -> u64 {
    6 * 3600 // 6 hours
}

fn default_meta_sync_concurrency() -> usize {
    20
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ignore_deletion_marks_delay_secs: default_ignore_deletion_marks_delay_secs(),
            meta_sync_concurrency: default_meta_sync_concurrency(),
            ignore_blocks_within_secs: 0,
            bucket_index: BucketIndexConfig::default(),
        }
    }
}

impl FetcherConfig {
    /// Get the deletion mark grace period as a Duration.
    pub fn ignore_deletion_marks_delay(&self) -> Duration {
        let secs = i64::try_from(self.ignore_deletion_marks_delay_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Get the recency window as a Duration.
    pub fn ignore_blocks_within(&self) -> Duration {
        let secs = i64::try_from(self.ignore_blocks_within_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Validate fetcher configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.meta_sync_concurrency == 0 {
            return Err("fetcher.meta_sync_concurrency must be at least 1".to_string());
        }

        for (name, value) in [
            (
                "fetcher.ignore_deletion_marks_delay_secs",
                self.ignore_deletion_marks_delay_secs,
            ),
            (
                "fetcher.ignore_blocks_within_secs",
                self.ignore_blocks_within_secs,
            ),
        ] {
            // Halved so that twice the value (the mark cache horizon) still fits.
            if value > (i64::MAX / 2) as u64 {
                return Err(format!(
                    "{name} {value} exceeds maximum value {}",
                    i64::MAX / 2
                ));
            }
        }

        Ok(())
    }
}

/// Complete configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Block metadata filtering configuration.
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file overlaid with
    /// `BLOCKGATE_`-prefixed environment variables (`__` separates sections).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> crate::Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.fetcher.validate().map_err(crate::Error::Config)?;
        Ok(config)
    }
}
