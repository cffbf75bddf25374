//! Error types for the watchdog.
//!
//! This module provides error handling for watchdog operations with
//! proper error classification and context.

use thiserror::Error;

use crate::watchdog::WatchId;

/// Errors that can occur during watchdog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchdogError {
    /// Every watch slot is already taken.
    #[error("Watch registry full: capacity {capacity}")]
    CapacityExceeded {
        /// Fixed number of watch slots.
        capacity: usize,
    },

    /// The id does not belong to this watchdog.
    #[error("Unknown watch: {0}")]
    UnknownWatch(WatchId),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The monitor thread could not be spawned.
    #[error("Failed to spawn monitor thread: {0}")]
    SpawnFailed(String),

    /// The monitor thread panicked.
    #[error("Monitor thread panicked")]
    MonitorPanicked,
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a spawn failure from the underlying I/O error.
    #[must_use]
    pub fn spawn_failed(source: &std::io::Error) -> Self {
        Self::SpawnFailed(source.to_string())
    }
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = std::result::Result<T, WatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WatchdogError::CapacityExceeded { capacity: 3 };
        assert!(err.to_string().contains('3'));

        let err = WatchdogError::invalid_configuration("poll_interval must be non-zero");
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn test_spawn_failed_keeps_message() {
        let io = std::io::Error::other("no threads left");
        let err = WatchdogError::spawn_failed(&io);
        assert!(matches!(err, WatchdogError::SpawnFailed(ref msg) if msg.contains("no threads")));
    }
}
