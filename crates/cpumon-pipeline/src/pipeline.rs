//! Pipeline wiring and orchestration.
//!
//! ```text
//! CounterSource -> Reader -> raw queue -> Analyzer -> usage queue -> Printer -> RenderSink
//!                     \                      |                         /
//!                      +------------- Watchdog heartbeats ------------+
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpumon_sync::{BoundedQueue, StopToken, Wake};
use cpumon_watchdog::{LivenessFault, Watchdog};

use crate::analyzer::{ANALYZER, Analyzer};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::printer::{PRINTER, Printer};
use crate::reader::{READER, Reader};
use crate::render::RenderSink;
use crate::sample::{RawSnapshot, UsageSnapshot};
use crate::source::CounterSource;
use crate::stage::{Liveness, StageControl, StageHandle, StageState};

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Option<Box<dyn CounterSource>>,
    sink: Option<Box<dyn RenderSink>>,
}

impl PipelineBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            sink: None,
        }
    }

    /// Set the counter source read by the reader.
    #[must_use]
    pub fn source(mut self, source: impl CounterSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set the render sink driven by the printer.
    #[must_use]
    pub fn sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Create the queues and the watchdog, register one watch per stage and
    /// start the stages.
    ///
    /// Enforcement starts paused.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::MissingCollaborator`] if no source or sink was set.
    /// - [`PipelineError::InvalidConfiguration`] if the configuration is invalid.
    /// - Watchdog or spawn errors; stages already started are stopped.
    pub fn build(self) -> PipelineResult<Pipeline> {
        let source = self
            .source
            .ok_or(PipelineError::MissingCollaborator("counter source"))?;
        let sink = self
            .sink
            .ok_or(PipelineError::MissingCollaborator("render sink"))?;
        self.config.validate()?;
        let config = self.config;

        let raw = Arc::new(BoundedQueue::<RawSnapshot>::new(config.raw_queue_capacity)?);
        let usage = Arc::new(BoundedQueue::<UsageSnapshot>::new(
            config.usage_queue_capacity,
        )?);
        let raw_wake = Arc::clone(&raw) as Arc<dyn Wake>;
        let usage_wake = Arc::clone(&usage) as Arc<dyn Wake>;

        let reader_token = StopToken::new([Arc::clone(&raw_wake)]);
        let analyzer_token = StopToken::new([Arc::clone(&raw_wake), Arc::clone(&usage_wake)]);
        let printer_token = StopToken::new([usage_wake]);

        let watchdog = Arc::new(Watchdog::start(config.watchdog_config())?);
        let reader_id = watchdog.register_watch(READER, reader_token.clone())?;
        let analyzer_id = watchdog.register_watch(ANALYZER, analyzer_token.clone())?;
        let printer_id = watchdog.register_watch(PRINTER, printer_token.clone())?;

        let reader = Reader::new(
            source,
            config.sampling_interval(),
            Arc::clone(&raw),
            Liveness::new(Arc::clone(&watchdog), reader_id),
        )
        .spawn(reader_token)?;

        let analyzer = Analyzer::new(
            Arc::clone(&raw),
            Arc::clone(&usage),
            Liveness::new(Arc::clone(&watchdog), analyzer_id),
        )
        .spawn(analyzer_token)
        .inspect_err(|_| reader.request_stop())?;

        let printer = Printer::new(
            Arc::clone(&usage),
            sink,
            Liveness::new(Arc::clone(&watchdog), printer_id),
        )
        .spawn(printer_token)
        .inspect_err(|_| {
            reader.request_stop();
            analyzer.request_stop();
        })?;

        tracing::info!(
            stat_path = %config.stat_path.display(),
            interval_ms = config.sampling_interval_ms,
            "pipeline started"
        );

        let shutdown = ShutdownHandle {
            inner: Arc::new(ShutdownInner {
                fired: AtomicBool::new(false),
                watchdog: Arc::clone(&watchdog),
                stages: [reader.control(), analyzer.control(), printer.control()],
            }),
        };

        Ok(Pipeline {
            config,
            watchdog,
            raw,
            usage,
            stages: [reader, analyzer, printer],
            shutdown,
        })
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("source", &self.source.is_some())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// A running pipeline.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    watchdog: Arc<Watchdog>,
    raw: Arc<BoundedQueue<RawSnapshot>>,
    usage: Arc<BoundedQueue<UsageSnapshot>>,
    stages: [StageHandle; 3],
    shutdown: ShutdownHandle,
}

impl Pipeline {
    /// Shorthand for [`PipelineBuilder::new`].
    #[must_use]
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// The configuration the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Make missed heartbeats fatal.
    pub fn start_enforcing(&self) {
        self.watchdog.start_enforcing();
    }

    /// Stop treating missed heartbeats as faults.
    pub fn pause_enforcing(&self) {
        self.watchdog.pause_enforcing();
    }

    /// The pipeline's watchdog.
    #[must_use]
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// A cloneable handle that stops the whole pipeline.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Name and state of every stage, in pipeline order.
    #[must_use]
    pub fn stage_states(&self) -> [(&'static str, StageState); 3] {
        self.stages.each_ref().map(|stage| (stage.name(), stage.state()))
    }

    /// Wait for every stage and the watchdog to finish, then drain both queues.
    ///
    /// Blocks until the pipeline is shut down or the watchdog declares a fault.
    ///
    /// # Errors
    ///
    /// Returns an error only if the watchdog monitor thread panicked. Stage
    /// failures are collected in the report.
    pub fn join(self) -> PipelineResult<PipelineReport> {
        let mut failures = Vec::new();
        for stage in &self.stages {
            if let Err(error) = stage.join() {
                failures.push(StageFailure {
                    stage: stage.name(),
                    error,
                });
            }
        }

        self.watchdog.request_stop();
        self.watchdog.join()?;

        let residual_raw = self.raw.drain().len();
        let residual_usage = self.usage.drain().len();

        let report = PipelineReport {
            fault: self.watchdog.fault(),
            failures,
            residual_raw,
            residual_usage,
            watchdog_cycles: self.watchdog.cycles(),
        };
        tracing::info!(
            clean = report.is_clean(),
            residual_raw,
            residual_usage,
            "pipeline finished"
        );
        Ok(report)
    }
}

struct ShutdownInner {
    fired: AtomicBool,
    watchdog: Arc<Watchdog>,
    stages: [StageControl; 3],
}

/// Stops the pipeline from any thread, exactly once.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownInner>,
}

impl ShutdownHandle {
    /// Pause enforcement, stop reader, analyzer and printer in that order,
    /// then stop the watchdog.
    ///
    /// Returns `true` for the call that performed the shutdown.
    pub fn shutdown(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("shutting down pipeline");
        self.inner.watchdog.pause_enforcing();
        for stage in &self.inner.stages {
            stage.request_stop();
        }
        self.inner.watchdog.request_stop();
        true
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("fired", &self.is_shutdown())
            .finish()
    }
}

/// A stage that ended with an error.
#[derive(Debug)]
pub struct StageFailure {
    /// Stage name.
    pub stage: &'static str,
    /// The error that ended the stage.
    pub error: PipelineError,
}

/// Outcome of [`Pipeline::join`].
#[derive(Debug)]
pub struct PipelineReport {
    /// The liveness fault that stopped the pipeline, if any.
    pub fault: Option<LivenessFault>,
    /// Stages that ended with an error.
    pub failures: Vec<StageFailure>,
    /// Snapshots left in the raw queue.
    pub residual_raw: usize,
    /// Usage snapshots left in the usage queue.
    pub residual_usage: usize,
    /// Poll cycles the watchdog evaluated.
    pub watchdog_cycles: u64,
}

impl PipelineReport {
    /// No fault and no failed stage.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fault.is_none() && self.failures.is_empty()
    }
}
