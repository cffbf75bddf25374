//! Prelude for cpumon-pipeline.
//!
//! This module re-exports the most commonly used types for convenient importing.

pub use crate::config::{PipelineConfig, WatchdogSettings};
pub use crate::error::{PipelineError, PipelineResult, StatParseError};
pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineReport, ShutdownHandle};
pub use crate::render::{RenderSink, TerminalRenderer};
pub use crate::sample::{RawSnapshot, UsageSnapshot};
pub use crate::source::{CounterSource, ProcStatSource};
pub use crate::stage::StageState;
