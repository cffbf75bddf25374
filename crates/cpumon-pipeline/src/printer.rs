//! Printer stage: hands every usage snapshot to the render sink.

use std::sync::Arc;

use cpumon_sync::{BoundedQueue, StopToken};

use crate::error::PipelineResult;
use crate::render::RenderSink;
use crate::sample::UsageSnapshot;
use crate::stage::{Liveness, StageHandle, spawn_stage};

/// Stage name used in diagnostics and watch registration.
pub const PRINTER: &str = "printer";

/// Pops usage snapshots and renders them.
pub struct Printer<R> {
    input: Arc<BoundedQueue<UsageSnapshot>>,
    sink: R,
    liveness: Liveness,
}

impl<R: RenderSink> Printer<R> {
    /// Create a printer.
    pub fn new(input: Arc<BoundedQueue<UsageSnapshot>>, sink: R, liveness: Liveness) -> Self {
        Self {
            input,
            sink,
            liveness,
        }
    }

    /// Run the loop on the current thread until `token` is stopped.
    ///
    /// Render errors are logged and the snapshot dropped.
    ///
    /// # Errors
    ///
    /// Currently never fails; the signature matches the other stages.
    pub fn run(mut self, token: &StopToken) -> PipelineResult<()> {
        let mut frames: u64 = 0;
        while !token.is_stop_requested() {
            self.liveness.beat();

            let Some(usage) = self.liveness.pop(&self.input, token) else {
                break;
            };

            match self.sink.render(&usage) {
                Ok(()) => frames += 1,
                Err(e) => tracing::warn!(stage = PRINTER, error = %e, "render failed"),
            }
        }
        tracing::debug!(stage = PRINTER, frames, "printer loop finished");
        Ok(())
    }
}

impl<R: RenderSink + 'static> Printer<R> {
    /// Run the loop on a new thread.
    ///
    /// `token` has to wake the input queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, token: StopToken) -> PipelineResult<StageHandle> {
        spawn_stage(PRINTER, token, move |token| self.run(token))
    }
}

impl<R> std::fmt::Debug for Printer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Printer")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}
