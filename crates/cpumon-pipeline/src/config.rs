//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use cpumon_watchdog::WatchdogConfig;

use crate::error::{PipelineError, PipelineResult};
use crate::source::DEFAULT_STAT_PATH;

/// Number of watches the pipeline registers: reader, analyzer, printer.
pub const STAGE_COUNT: usize = 3;

/// Watchdog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogSettings {
    /// Whether enforcement is switched on after the grace period.
    pub enabled: bool,
    /// Time between two liveness evaluations.
    pub poll_interval_ms: u64,
    /// Delay between starting the stages and enabling enforcement.
    pub grace_period_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 2000,
            grace_period_ms: 3000,
        }
    }
}

impl WatchdogSettings {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Grace period as a `Duration`.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Sampling pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Counter file read by the default source.
    pub stat_path: PathBuf,
    /// Time between two reads.
    pub sampling_interval_ms: u64,
    /// Capacity of the reader to analyzer queue.
    pub raw_queue_capacity: usize,
    /// Capacity of the analyzer to printer queue.
    pub usage_queue_capacity: usize,
    /// Watchdog settings.
    pub watchdog: WatchdogSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stat_path: PathBuf::from(DEFAULT_STAT_PATH),
            sampling_interval_ms: 1000,
            raw_queue_capacity: 10,
            usage_queue_capacity: 10,
            watchdog: WatchdogSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Sampling interval as a `Duration`.
    #[must_use]
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Watchdog configuration for one watch per stage.
    #[must_use]
    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            capacity: STAGE_COUNT,
            poll_interval: self.watchdog.poll_interval(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] describing the first
    /// invalid field.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.stat_path.as_os_str().is_empty() {
            return Err(PipelineError::invalid_configuration(
                "stat_path must not be empty",
            ));
        }
        if self.sampling_interval_ms == 0 {
            return Err(PipelineError::invalid_configuration(
                "sampling_interval_ms must be greater than 0",
            ));
        }
        if self.raw_queue_capacity == 0 {
            return Err(PipelineError::invalid_configuration(
                "raw_queue_capacity must be greater than 0",
            ));
        }
        if self.usage_queue_capacity == 0 {
            return Err(PipelineError::invalid_configuration(
                "usage_queue_capacity must be greater than 0",
            ));
        }
        if self.watchdog.poll_interval_ms == 0 {
            return Err(PipelineError::invalid_configuration(
                "watchdog.poll_interval_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}
