//! Store configuration and index write policy.

use rand::Rng;
use serde::{Deserialize, Serialize};
use spectra_protocol::defaults::{
    AWS_REGION_ENV_KEY, DEFAULT_AWS_REGION, DEFAULT_BUCKET, DEFAULT_INFLUXDB_DATABASE,
    DEFAULT_INFLUXDB_HOST, DEFAULT_KEY_PREFIX, DEFAULT_MEASUREMENT, DEFAULT_SPECTROMETER_TAG,
    INFLUXDB_DATABASE_ENV_KEY, INFLUXDB_HOST_ENV_KEY, S3_ENDPOINT_ENV_KEY,
};
use spectra_protocol::reading::is_safe_spectrometer_id;
use spectra_protocol::EnvSource;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Batching, jitter and retry settings for index writes.
///
/// Only the index stage is governed by this policy; uploads are never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritePolicy {
    /// Flush as soon as this many points are pending.
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Upper bound of the random delay added to each flush deadline.
    pub jitter_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub max_retries: u32,
    pub max_retry_delay_ms: u64,
    pub exponential_base: u32,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            flush_interval_ms: 10_000,
            jitter_interval_ms: 2_000,
            retry_interval_ms: 5_000,
            max_retries: 5,
            max_retry_delay_ms: 30_000,
            exponential_base: 2,
        }
    }
}

impl WritePolicy {
    pub fn validate(&self) -> StoreResult<()> {
        if self.batch_size == 0 {
            return Err(StoreError::config("write_policy.batch_size must be at least 1"));
        }
        if self.flush_interval_ms == 0 {
            return Err(StoreError::config(
                "write_policy.flush_interval_ms must be at least 1",
            ));
        }
        if self.exponential_base == 0 {
            return Err(StoreError::config(
                "write_policy.exponential_base must be at least 1",
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt + 1`:
    /// `retry_interval * exponential_base^attempt`, capped at `max_retry_delay`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.exponential_base).saturating_pow(attempt);
        let millis = self
            .retry_interval_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(millis)
    }

    /// Time until the next scheduled flush, jitter included.
    pub fn flush_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter = if self.jitter_interval_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.jitter_interval_ms)
        };
        Duration::from_millis(self.flush_interval_ms.saturating_add(jitter))
    }
}

/// Whether `ingest` waits for the index write to reach a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexConfirmation {
    /// Return once the background writer has accepted the point. Index
    /// failures are reported only through logs and the operator alert.
    #[default]
    Background,
    /// Flush and block until the point is written or abandoned, and report
    /// the result in the ingest outcome.
    AwaitResult,
}

/// Deployment settings for the persistence pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub region: String,
    /// Custom S3-compatible endpoint; AWS when unset.
    pub endpoint: Option<String>,
    pub influx_host: String,
    pub influx_database: String,
    pub measurement: String,
    pub spectrometer_tag: String,
    /// Directory for scratch files; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    pub index_confirmation: IndexConfirmation,
    pub write_policy: WritePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            region: DEFAULT_AWS_REGION.to_string(),
            endpoint: None,
            influx_host: DEFAULT_INFLUXDB_HOST.to_string(),
            influx_database: DEFAULT_INFLUXDB_DATABASE.to_string(),
            measurement: DEFAULT_MEASUREMENT.to_string(),
            spectrometer_tag: DEFAULT_SPECTROMETER_TAG.to_string(),
            scratch_dir: None,
            index_confirmation: IndexConfirmation::Background,
            write_policy: WritePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by the deployment keys present in `env`.
    pub fn from_env(env: &dyn EnvSource) -> Self {
        Self::default().apply_env(env)
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(input: &str) -> StoreResult<Self> {
        let config: StoreConfig = toml::from_str(input)
            .map_err(|e| StoreError::config(format!("failed to parse store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(mut self, env: &dyn EnvSource) -> Self {
        if let Some(region) = env.get(AWS_REGION_ENV_KEY) {
            self.region = region;
        }
        if let Some(endpoint) = env.get(S3_ENDPOINT_ENV_KEY) {
            self.endpoint = Some(endpoint);
        }
        if let Some(host) = env.get(INFLUXDB_HOST_ENV_KEY) {
            self.influx_host = host;
        }
        if let Some(database) = env.get(INFLUXDB_DATABASE_ENV_KEY) {
            self.influx_database = database;
        }
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::config("bucket cannot be empty"));
        }
        if !self
            .key_prefix
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .all(is_safe_spectrometer_id)
        {
            return Err(StoreError::config(format!(
                "key_prefix '{}' may only contain ASCII letters, digits, '-', '_' and '/'",
                self.key_prefix
            )));
        }
        if self.influx_host.trim().is_empty() {
            return Err(StoreError::config("influx_host cannot be empty"));
        }
        if self.influx_database.trim().is_empty() {
            return Err(StoreError::config("influx_database cannot be empty"));
        }
        if self.measurement.is_empty() || self.spectrometer_tag.is_empty() {
            return Err(StoreError::config(
                "measurement and spectrometer_tag cannot be empty",
            ));
        }
        self.write_policy.validate()
    }
}
