//! Scripted counter sources and recording render sinks.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cpumon_pipeline::{CounterSource, RawSnapshot, RenderSink, UsageSnapshot};

use crate::fixtures::half_busy_step;

/// What a [`ScriptedSource`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhenExhausted {
    /// Return an I/O error.
    #[default]
    Fail,
    /// Keep returning the last snapshot.
    RepeatLast,
}

/// Returns a fixed sequence of snapshots.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<io::Result<RawSnapshot>>,
    last: Option<RawSnapshot>,
    when_exhausted: WhenExhausted,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Return each of `snapshots` once, then fail.
    pub fn new<I, S>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: snapshots
                .into_iter()
                .map(|s| Ok(RawSnapshot::new(s)))
                .collect(),
            ..Self::default()
        }
    }

    /// Append an error to the script.
    #[must_use]
    pub fn then_fail(mut self, kind: io::ErrorKind) -> Self {
        self.script
            .push_back(Err(io::Error::new(kind, "scripted failure")));
        self
    }

    /// Change what happens after the last scripted step.
    #[must_use]
    pub fn when_exhausted(mut self, behaviour: WhenExhausted) -> Self {
        self.when_exhausted = behaviour;
        self
    }

    /// Shared counter of completed reads.
    #[must_use]
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl CounterSource for ScriptedSource {
    fn read_snapshot(&mut self) -> io::Result<RawSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(snapshot)) => {
                self.last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => match (&self.last, self.when_exhausted) {
                (Some(last), WhenExhausted::RepeatLast) => Ok(last.clone()),
                _ => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "script exhausted",
                )),
            },
        }
    }
}

/// Generates ever-advancing counters: every core at 50% on every interval.
#[derive(Debug, Clone)]
pub struct TickingSource {
    cores: usize,
    step: u64,
}

impl TickingSource {
    /// Source for a machine with `cores` cores.
    #[must_use]
    pub fn new(cores: usize) -> Self {
        Self { cores, step: 0 }
    }
}

impl CounterSource for TickingSource {
    fn read_snapshot(&mut self) -> io::Result<RawSnapshot> {
        self.step += 1;
        Ok(RawSnapshot::new(half_busy_step(self.cores, self.step, 10)))
    }
}

/// Shared view of the frames a [`RecordingSink`] received.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    frames: Arc<Mutex<Vec<UsageSnapshot>>>,
}

impl Recording {
    /// Frames received so far.
    #[must_use]
    pub fn frames(&self) -> Vec<UsageSnapshot> {
        self.frames.lock().clone()
    }

    /// Number of frames received so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether no frame was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }
}

/// Records every snapshot it renders. Optionally fails every call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    recording: Recording,
    fail: bool,
}

impl RecordingSink {
    /// A sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every snapshot but reports a write error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Handle to inspect received frames after the sink has been moved.
    #[must_use]
    pub fn recording(&self) -> Recording {
        self.recording.clone()
    }
}

impl RenderSink for RecordingSink {
    fn render(&mut self, snapshot: &UsageSnapshot) -> io::Result<()> {
        self.recording.frames.lock().push(snapshot.clone());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        Ok(())
    }
}
