//! Queue, sync and logging configuration
//!
//! Every field has a default, so a config file only needs the keys it overrides.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// File name looked up by [`load_config_from_dir`]
pub const CONFIG_FILE_NAME: &str = "quorum_config.json";

/// Action queue behaviour
///
/// # Examples
///
/// ```rust
/// use quorum_core::QueueConfig;
///
/// let config = QueueConfig {
///     max_attempts: 5,
///     base_retry_delay_ms: 500,
///     ..Default::default()
/// };
/// assert_eq!(config.retry_delay(3).as_millis(), 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Executions allowed before a transiently failing action is abandoned.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds. Doubles with every further attempt.
    ///
    /// Default: 2000 (2 seconds)
    pub base_retry_delay_ms: u64,

    /// Upper bound on the retry delay, in milliseconds.
    ///
    /// Default: 300000 (5 minutes)
    pub max_retry_delay_ms: u64,

    /// Longest the drain worker sleeps before re-checking the queue, in milliseconds.
    ///
    /// Default: 1000 (1 second)
    pub poll_interval_ms: u64,

    /// Record count at which enqueue starts pruning and may refuse new actions.
    ///
    /// Default: 1000
    pub max_queue_size: usize,

    /// Age after which terminal records are pruned, in seconds.
    ///
    /// Default: 604800 (7 days)
    pub max_action_age_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_retry_delay_ms: 2_000,
            max_retry_delay_ms: 300_000, // 5 minutes
            poll_interval_ms: 1_000,
            max_queue_size: 1_000,
            max_action_age_secs: 604_800, // 1 week
        }
    }
}

impl QueueConfig {
    /// Backoff after the `attempts`-th failure: `min(base * 2^(attempts-1), max)`
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay = self
            .base_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(delay)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum terminal record age as a [`Duration`]
    pub fn max_action_age(&self) -> Duration {
        Duration::from_secs(self.max_action_age_secs)
    }
}

/// Sync engine timing and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a sync request collects candidate answers, in milliseconds.
    ///
    /// Default: 30000 (30 seconds)
    pub request_window_ms: u64,

    /// How long a recorded candidate stays usable, in milliseconds.
    ///
    /// Default: 30000 (30 seconds)
    pub candidate_ttl_ms: u64,

    /// How long to wait for a delta after initiating, in milliseconds.
    ///
    /// Default: 60000 (1 minute)
    pub response_timeout_ms: u64,

    /// Maximum serialized size of one delta chunk, in bytes.
    ///
    /// Default: 5242880 (5 MiB)
    pub max_chunk_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_window_ms: 30_000,
            candidate_ttl_ms: 30_000,
            response_timeout_ms: 60_000,
            max_chunk_bytes: 5 * 1024 * 1024,
        }
    }
}

impl SyncConfig {
    /// Request window as a [`Duration`]
    pub fn request_window(&self) -> Duration {
        Duration::from_millis(self.request_window_ms)
    }

    /// Candidate lifetime as a [`Duration`]
    pub fn candidate_ttl(&self) -> Duration {
        Duration::from_millis(self.candidate_ttl_ms)
    }

    /// Response timeout as a [`Duration`]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Action queue settings
    pub queue: QueueConfig,
    /// Sync engine settings
    pub sync: SyncConfig,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
}

/// Load configuration from `path`.
///
/// A missing file yields the defaults. An unreadable or malformed file is an error.
pub fn load_config<P>(path: P) -> Result<CoreConfig, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CoreConfig::default()),
        Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
    };
    serde_json::from_slice(&bytes).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

/// Load `quorum_config.json` from a data directory, falling back to defaults on any problem
pub fn load_config_from_dir<P>(data_dir: P) -> CoreConfig
where
    P: AsRef<Path>,
{
    let path = data_dir.as_ref().join(CONFIG_FILE_NAME);
    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid config file");
            CoreConfig::default()
        }
    }
}
