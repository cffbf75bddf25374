//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use cpumon_test_helpers::prelude::*;
//! ```

pub use crate::fixtures::{CoreTimes, half_busy_step, old_kernel_stat, stat_line, stat_text};
pub use crate::mock::{Recording, RecordingSink, ScriptedSource, TickingSource, WhenExhausted};
pub use crate::must::{must, must_some, must_with};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
