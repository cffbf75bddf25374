//! # cpumon-pipeline
//!
//! Three-stage CPU usage sampling pipeline.
//!
//! - **Reader**: reads a [`CounterSource`] once per sampling interval and
//!   pushes the raw snapshot onto the raw queue.
//! - **Analyzer**: parses snapshots, keeps the previous one as baseline and
//!   pushes per-core usage fractions onto the usage queue.
//! - **Printer**: pops usage snapshots and hands them to a [`RenderSink`].
//!
//! Every stage heartbeats a watch on a shared
//! [`Watchdog`](cpumon_watchdog::Watchdog). If any stage goes silent while
//! enforcement is on, the watchdog stops all three.
//!
//! ## Architecture
//!
//! - [`config`] - Pipeline configuration
//! - [`sample`] - Raw snapshots, counter samples and usage snapshots
//! - [`parse`] - `/proc/stat` parsing
//! - [`source`] - Counter sources
//! - [`render`] - Render sinks
//! - [`stage`] - Stage thread lifecycle
//! - [`reader`], [`analyzer`], [`printer`] - The stages
//! - [`pipeline`] - Builder, orchestration and shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use cpumon_pipeline::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::builder(config.clone())
//!     .source(ProcStatSource::new(&config.stat_path))
//!     .sink(TerminalRenderer::stdout())
//!     .build()?;
//!
//! std::thread::sleep(config.watchdog.grace_period());
//! pipeline.start_enforcing();
//!
//! let shutdown = pipeline.shutdown_handle();
//! # shutdown.shutdown();
//! let report = pipeline.join()?;
//! assert!(report.is_clean());
//! # Ok::<(), PipelineError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod printer;
pub mod reader;
pub mod render;
pub mod sample;
pub mod source;
pub mod stage;

pub mod prelude;

pub use analyzer::{Analyzer, UsageTracker};
pub use config::{PipelineConfig, WatchdogSettings};
pub use error::{PipelineError, PipelineResult, StatParseError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport, ShutdownHandle, StageFailure};
pub use printer::Printer;
pub use reader::Reader;
pub use render::{RenderSink, TerminalRenderer};
pub use sample::{CpuSample, RawSnapshot, SampleSet, UsageSnapshot};
pub use source::{CounterSource, ProcStatSource};
pub use stage::{Liveness, StageControl, StageHandle, StageState};
