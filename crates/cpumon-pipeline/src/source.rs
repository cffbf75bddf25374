//! Counter sources read by the reader stage.

use std::io;
use std::path::{Path, PathBuf};

use crate::sample::RawSnapshot;

/// Default location of the kernel CPU counters.
pub const DEFAULT_STAT_PATH: &str = "/proc/stat";

/// Produces one raw counter snapshot per call.
pub trait CounterSource: Send {
    /// Read a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Any I/O error is fatal to the reader stage.
    fn read_snapshot(&mut self) -> io::Result<RawSnapshot>;
}

impl<S: CounterSource + ?Sized> CounterSource for Box<S> {
    fn read_snapshot(&mut self) -> io::Result<RawSnapshot> {
        (**self).read_snapshot()
    }
}

/// Reads a `/proc/stat`-formatted file from scratch on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStatSource {
    path: PathBuf,
}

impl ProcStatSource {
    /// Read counters from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self::new(DEFAULT_STAT_PATH)
    }
}

impl CounterSource for ProcStatSource {
    fn read_snapshot(&mut self) -> io::Result<RawSnapshot> {
        std::fs::read_to_string(&self.path).map(RawSnapshot::from)
    }
}
