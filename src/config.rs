//! Configuration for timing reconstruction
//!
//! Every heuristic constant used to reconcile unsynchronized log clocks lives
//! here so a run with a different scheduler or worker wall-time limit can be
//! analysed without recompiling.

use crate::error::{Result, TimingError};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunable heuristics and run-directory layout
///
/// # Example
/// ```
/// use evaltime::config::TimingConfig;
///
/// let config = TimingConfig::default();
/// assert_eq!(config.batch_padding_secs, 1);
/// assert_eq!(config.worker_lifetime_secs, 5 * 3600 + 59 * 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Margin subtracted from batch starts and added to batch ends to absorb
    /// timestamp jitter between the driver and the workers
    pub batch_padding_secs: i64,

    /// Correction added to a worker log's modification time before it is
    /// used as the anchor for that log (worker filesystem clock offset)
    pub worker_clock_skew_secs: i64,

    /// How far the first worker timestamp may run ahead of the anchor
    /// before the anchor is assumed to belong to the following day
    pub worker_anchor_tolerance_secs: i64,

    /// Wall-time budget of a worker; protocols still open at the end of a
    /// log are closed at `anchor + worker_lifetime_secs`
    pub worker_lifetime_secs: i64,

    /// Path segment of the force field path that holds the batch id
    pub force_field_batch_segment: usize,

    /// Extension of the single driver log at the top of a run directory
    pub driver_log_extension: String,

    /// Sub-directory holding one `*.log` file per worker
    pub worker_log_dir: String,

    /// Parent directory of the per-iteration `iter_NNNN/results.json` files
    pub results_dir: String,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            batch_padding_secs: 1,
            worker_clock_skew_secs: 2 * 3600,
            worker_anchor_tolerance_secs: 2,
            worker_lifetime_secs: 5 * 3600 + 59 * 60,
            force_field_batch_segment: 2,
            driver_log_extension: "o".to_string(),
            worker_log_dir: "worker-logs".to_string(),
            results_dir: "optimize.tmp/phys-prop".to_string(),
        }
    }
}

impl TimingConfig {
    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: TimingConfig = toml::from_str(&content).map_err(|e| {
            TimingError::Config(format!(
                "failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the heuristics meaningless
    pub fn validate(&self) -> Result<()> {
        if self.batch_padding_secs < 0 {
            return Err(TimingError::Config(format!(
                "batch_padding_secs must be >= 0, got {}",
                self.batch_padding_secs
            )));
        }
        if self.worker_anchor_tolerance_secs < 0 {
            return Err(TimingError::Config(format!(
                "worker_anchor_tolerance_secs must be >= 0, got {}",
                self.worker_anchor_tolerance_secs
            )));
        }
        if self.worker_lifetime_secs <= 0 {
            return Err(TimingError::Config(format!(
                "worker_lifetime_secs must be > 0, got {}",
                self.worker_lifetime_secs
            )));
        }
        if self.driver_log_extension.is_empty()
            || self.worker_log_dir.is_empty()
            || self.results_dir.is_empty()
        {
            return Err(TimingError::Config(
                "driver_log_extension, worker_log_dir and results_dir must not be empty"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn batch_padding(&self) -> Duration {
        Duration::seconds(self.batch_padding_secs)
    }

    pub fn worker_clock_skew(&self) -> Duration {
        Duration::seconds(self.worker_clock_skew_secs)
    }

    pub fn worker_anchor_tolerance(&self) -> Duration {
        Duration::seconds(self.worker_anchor_tolerance_secs)
    }

    pub fn worker_lifetime(&self) -> Duration {
        Duration::seconds(self.worker_lifetime_secs)
    }
}
