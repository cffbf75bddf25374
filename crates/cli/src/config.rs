//! Effective configuration: YAML file, then command-line overrides.

use std::path::{Path, PathBuf};

use cpumon_pipeline::PipelineConfig;

use crate::error::CliError;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub stat_path: Option<PathBuf>,
    pub interval_ms: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub grace_period_ms: Option<u64>,
    pub no_watchdog: bool,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.stat_path {
            config.stat_path.clone_from(path);
        }
        if let Some(interval) = self.interval_ms {
            config.sampling_interval_ms = interval;
        }
        if let Some(capacity) = self.queue_capacity {
            config.raw_queue_capacity = capacity;
            config.usage_queue_capacity = capacity;
        }
        if let Some(poll) = self.poll_interval_ms {
            config.watchdog.poll_interval_ms = poll;
        }
        if let Some(grace) = self.grace_period_ms {
            config.watchdog.grace_period_ms = grace;
        }
        if self.no_watchdog {
            config.watchdog.enabled = false;
        }
    }
}

/// Read a YAML config file. Missing keys take their defaults.
pub fn load_file(path: &Path) -> Result<PipelineConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build and validate the effective configuration.
pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig, CliError> {
    let mut config = match file {
        Some(path) => load_file(path)?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().map_err(CliError::InvalidConfiguration)?;

    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}
