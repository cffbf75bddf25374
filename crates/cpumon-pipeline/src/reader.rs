//! Reader stage: samples the counter source at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use cpumon_sync::{BoundedQueue, StopToken};

use crate::error::{PipelineError, PipelineResult};
use crate::sample::RawSnapshot;
use crate::source::CounterSource;
use crate::stage::{Liveness, StageHandle, spawn_stage};

/// Stage name used in diagnostics and watch registration.
pub const READER: &str = "reader";

/// Reads one snapshot per interval and pushes it to the raw queue.
pub struct Reader<S> {
    source: S,
    interval: Duration,
    output: Arc<BoundedQueue<RawSnapshot>>,
    liveness: Liveness,
}

impl<S: CounterSource> Reader<S> {
    /// Create a reader.
    pub fn new(
        source: S,
        interval: Duration,
        output: Arc<BoundedQueue<RawSnapshot>>,
        liveness: Liveness,
    ) -> Self {
        Self {
            source,
            interval,
            output,
            liveness,
        }
    }

    /// Run the loop on the current thread until `token` is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SourceRead`] if the source fails; the reader
    /// does not retry.
    pub fn run(mut self, token: &StopToken) -> PipelineResult<()> {
        let mut reads: u64 = 0;
        while !token.is_stop_requested() {
            self.liveness.beat();

            let snapshot = self
                .source
                .read_snapshot()
                .map_err(PipelineError::SourceRead)?;
            reads += 1;
            tracing::trace!(stage = READER, bytes = snapshot.len(), reads, "snapshot read");

            if self.liveness.push(&self.output, snapshot, token).is_err() {
                tracing::debug!(stage = READER, "dropping in-flight snapshot");
                break;
            }

            if self.liveness.sleep(token, self.interval) {
                break;
            }
        }
        tracing::debug!(stage = READER, reads, "reader loop finished");
        Ok(())
    }
}

impl<S: CounterSource + 'static> Reader<S> {
    /// Run the loop on a new thread.
    ///
    /// `token` has to wake the output queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, token: StopToken) -> PipelineResult<StageHandle> {
        spawn_stage(READER, token, move |token| self.run(token))
    }
}

impl<S> std::fmt::Debug for Reader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("interval", &self.interval)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
