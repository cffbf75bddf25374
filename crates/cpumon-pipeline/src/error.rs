//! Error types for the sampling pipeline.

use cpumon_sync::QueueError;
use cpumon_watchdog::WatchdogError;
use thiserror::Error;

/// Reasons a `/proc/stat` snapshot could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatParseError {
    /// The snapshot contained no `cpu` lines.
    #[error("no cpu lines in snapshot")]
    NoCpuLines,

    /// A `cpu` line had fewer than the four required counters.
    #[error("line {line}: expected at least 4 counters, found {found}")]
    MissingCounters {
        /// 1-based line number within the snapshot.
        line: usize,
        /// Number of counters present.
        found: usize,
    },

    /// A counter was not an unsigned integer.
    #[error("line {line}: invalid counter {token:?}")]
    InvalidCounter {
        /// 1-based line number within the snapshot.
        line: usize,
        /// The offending token.
        token: String,
    },
}

/// Errors raised while configuring, building or running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Queue construction failed.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Watchdog setup failed.
    #[error("Watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),

    /// The counter source could not be read.
    #[error("Counter source read failed: {0}")]
    SourceRead(#[source] std::io::Error),

    /// A snapshot could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] StatParseError),

    /// The number of `cpu` lines changed after the baseline was taken.
    #[error("Core count changed from {expected} to {found}")]
    CoreCountChanged {
        /// Core count detected from the first snapshot.
        expected: usize,
        /// Core count in the offending snapshot.
        found: usize,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required collaborator was not supplied to the builder.
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// A stage thread could not be spawned.
    #[error("Failed to spawn {stage} thread: {message}")]
    SpawnFailed {
        /// Stage name.
        stage: &'static str,
        /// Underlying I/O error message.
        message: String,
    },

    /// A stage thread panicked.
    #[error("Stage {0} panicked")]
    StagePanicked(&'static str),
}

impl PipelineError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a spawn failure for `stage`.
    #[must_use]
    pub fn spawn_failed(stage: &'static str, source: &std::io::Error) -> Self {
        Self::SpawnFailed {
            stage,
            message: source.to_string(),
        }
    }

    /// Whether this error ends the stage that raised it.
    ///
    /// Parse errors only discard one interval; everything else is fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Parse(_))
    }
}

/// A specialized `Result` type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
