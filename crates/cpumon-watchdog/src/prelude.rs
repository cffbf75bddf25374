//! Prelude for cpumon-watchdog.
//!
//! This module re-exports the most commonly used types for convenient importing.

pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::watchdog::{LivenessFault, WatchId, Watchdog, WatchdogConfig, WatchdogConfigBuilder};
