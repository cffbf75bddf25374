//! Error types for the cpumon binary

use std::path::PathBuf;

use cpumon_pipeline::PipelineReport;
use cpumon_pipeline::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[source] PipelineError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("{0}")]
    LivenessFault(String),

    #[error("{count} stage(s) failed, first: {first}")]
    StagesFailed { count: usize, first: String },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigRead { .. } | Self::ConfigParse { .. } | Self::InvalidConfiguration(_) => 4,
            Self::LivenessFault(_) => 2,
            Self::StagesFailed { .. } => 3,
            Self::Logging(_) => 1,
        }
    }

    /// Turn an unclean report into an error.
    pub fn from_report(report: &PipelineReport) -> Option<Self> {
        if let Some(fault) = &report.fault {
            return Some(Self::LivenessFault(fault.to_string()));
        }
        report.failures.first().map(|first| Self::StagesFailed {
            count: report.failures.len(),
            first: format!("{}: {}", first.stage, first.error),
        })
    }
}
