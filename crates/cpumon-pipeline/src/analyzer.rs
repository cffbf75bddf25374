//! Analyzer stage: turns consecutive snapshots into usage fractions.

use std::sync::Arc;

use cpumon_sync::{BoundedQueue, StopToken};

use crate::error::{PipelineError, PipelineResult};
use crate::parse::parse_stat;
use crate::sample::{RawSnapshot, SampleSet, UsageSnapshot};
use crate::stage::{Liveness, StageHandle, spawn_stage};

/// Stage name used in diagnostics and watch registration.
pub const ANALYZER: &str = "analyzer";

/// Baseline bookkeeping between two snapshots.
///
/// The core count is fixed by the first snapshot that parses.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    core_count: Option<usize>,
    baseline: Option<SampleSet>,
}

impl UsageTracker {
    /// Create a tracker with no baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detected number of `cpu` lines, aggregate included.
    #[must_use]
    pub fn core_count(&self) -> Option<usize> {
        self.core_count
    }

    /// Whether a baseline has been recorded.
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Feed one snapshot.
    ///
    /// Returns the usage since the previous snapshot, or `None` for the first
    /// snapshot and for intervals where some core's counters did not advance.
    /// The baseline is replaced in both cases.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Parse`] if the snapshot is malformed; the baseline is
    ///   kept and the interval is lost.
    /// - [`PipelineError::CoreCountChanged`] if the number of `cpu` lines
    ///   differs from the first snapshot.
    pub fn observe(&mut self, raw: &str) -> PipelineResult<Option<UsageSnapshot>> {
        let current = parse_stat(raw)?;

        let expected = *self.core_count.get_or_insert_with(|| {
            tracing::info!(stage = ANALYZER, cores = current.len(), "core count detected");
            current.len()
        });
        if current.len() != expected {
            return Err(PipelineError::CoreCountChanged {
                expected,
                found: current.len(),
            });
        }

        let usage = match &self.baseline {
            None => None,
            Some(baseline) => match current.usage_since(baseline) {
                Ok(usage) => Some(usage),
                Err(stalled) => {
                    tracing::warn!(
                        stage = ANALYZER,
                        line = stalled.index,
                        "counters did not advance, discarding interval; try a longer sampling interval"
                    );
                    None
                }
            },
        };

        self.baseline = Some(current);
        Ok(usage)
    }
}

/// Pops raw snapshots, computes usage and pushes it to the usage queue.
#[derive(Debug)]
pub struct Analyzer {
    input: Arc<BoundedQueue<RawSnapshot>>,
    output: Arc<BoundedQueue<UsageSnapshot>>,
    liveness: Liveness,
    tracker: UsageTracker,
}

impl Analyzer {
    /// Create an analyzer.
    #[must_use]
    pub fn new(
        input: Arc<BoundedQueue<RawSnapshot>>,
        output: Arc<BoundedQueue<UsageSnapshot>>,
        liveness: Liveness,
    ) -> Self {
        Self {
            input,
            output,
            liveness,
            tracker: UsageTracker::new(),
        }
    }

    /// Run the loop on the current thread until `token` is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CoreCountChanged`] if the machine's `cpu`
    /// lines change mid-run.
    pub fn run(mut self, token: &StopToken) -> PipelineResult<()> {
        while !token.is_stop_requested() {
            self.liveness.beat();

            let Some(raw) = self.liveness.pop(&self.input, token) else {
                break;
            };

            let usage = match self.tracker.observe(raw.as_str()) {
                Ok(Some(usage)) => usage,
                Ok(None) => continue,
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(stage = ANALYZER, error = %e, "discarding malformed snapshot");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if self.liveness.push(&self.output, usage, token).is_err() {
                tracing::debug!(stage = ANALYZER, "dropping in-flight usage");
                break;
            }
        }
        Ok(())
    }

    /// Run the loop on a new thread.
    ///
    /// `token` has to wake both queues.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, token: StopToken) -> PipelineResult<StageHandle> {
        spawn_stage(ANALYZER, token, move |token| self.run(token))
    }
}
