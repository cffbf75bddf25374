//! Value types carried between the stages.

/// One text snapshot returned by a counter source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSnapshot {
    text: String,
}

impl RawSnapshot {
    /// Wrap snapshot text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The snapshot text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Size of the snapshot in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<String> for RawSnapshot {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for RawSnapshot {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Cumulative counters of one `cpu` line, in jiffies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    /// user + nice + system + idle + iowait + irq + softirq + steal
    pub total: u64,
    /// idle + iowait
    pub idle: u64,
}

impl CpuSample {
    /// Create a sample.
    #[must_use]
    pub const fn new(total: u64, idle: u64) -> Self {
        Self { total, idle }
    }

    /// Usage fraction between `earlier` and `self`.
    ///
    /// Returns `None` when no time elapsed or a counter went backwards.
    #[must_use]
    pub fn usage_since(&self, earlier: &Self) -> Option<f64> {
        let total = self.total.checked_sub(earlier.total)?;
        let idle = self.idle.checked_sub(earlier.idle)?;
        if total == 0 {
            return None;
        }
        let busy = total.saturating_sub(idle);
        #[allow(clippy::cast_precision_loss)]
        let fraction = busy as f64 / total as f64;
        Some(fraction.clamp(0.0, 1.0))
    }
}

/// All `cpu` lines of one snapshot, aggregate first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleSet {
    samples: Vec<CpuSample>,
}

/// The first core whose counters did not advance over an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalledCore {
    /// Index into the sample set (0 is the aggregate line).
    pub index: usize,
}

impl SampleSet {
    /// Create a set from ordered samples.
    #[must_use]
    pub fn new(samples: Vec<CpuSample>) -> Self {
        Self { samples }
    }

    /// Number of `cpu` lines, including the aggregate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples, aggregate first.
    #[must_use]
    pub fn samples(&self) -> &[CpuSample] {
        &self.samples
    }

    /// Per-line usage over the interval from `baseline` to `self`.
    ///
    /// Lines are paired by position; callers check that both sets have the
    /// same length.
    ///
    /// # Errors
    ///
    /// Returns the first line whose counters did not advance, in which case
    /// the whole interval has to be discarded.
    pub fn usage_since(&self, baseline: &Self) -> Result<UsageSnapshot, StalledCore> {
        let fractions = self
            .samples
            .iter()
            .zip(&baseline.samples)
            .enumerate()
            .map(|(index, (now, then))| now.usage_since(then).ok_or(StalledCore { index }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UsageSnapshot::new(fractions))
    }
}

impl FromIterator<CpuSample> for SampleSet {
    fn from_iter<I: IntoIterator<Item = CpuSample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Usage fractions in `[0, 1]` for one interval, aggregate first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageSnapshot {
    fractions: Vec<f64>,
}

impl UsageSnapshot {
    /// Create a snapshot from ordered fractions.
    #[must_use]
    pub fn new(fractions: Vec<f64>) -> Self {
        Self { fractions }
    }

    /// All fractions, aggregate first.
    #[must_use]
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    /// The aggregate usage, if present.
    #[must_use]
    pub fn aggregate(&self) -> Option<f64> {
        self.fractions.first().copied()
    }

    /// Per-core usage, excluding the aggregate.
    #[must_use]
    pub fn cores(&self) -> &[f64] {
        self.fractions.get(1..).unwrap_or_default()
    }

    /// Number of entries, including the aggregate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_busy_interval() {
        let then = CpuSample::new(100, 50);
        let now = CpuSample::new(200, 100);
        assert_eq!(now.usage_since(&then), Some(0.5));
    }

    #[test]
    fn test_zero_elapsed_is_none() {
        let sample = CpuSample::new(100, 50);
        assert_eq!(sample.usage_since(&sample), None);
    }

    #[test]
    fn test_counter_regression_is_none() {
        let then = CpuSample::new(200, 100);
        let now = CpuSample::new(150, 120);
        assert_eq!(now.usage_since(&then), None);

        let now = CpuSample::new(300, 90);
        assert_eq!(now.usage_since(&then), None);
    }

    #[test]
    fn test_fully_idle_and_fully_busy() {
        let then = CpuSample::new(0, 0);
        assert_eq!(CpuSample::new(100, 100).usage_since(&then), Some(0.0));
        assert_eq!(CpuSample::new(100, 0).usage_since(&then), Some(1.0));
    }

    #[test]
    fn test_set_usage_reports_first_stalled_line() {
        let baseline = SampleSet::new(vec![CpuSample::new(100, 50), CpuSample::new(40, 20)]);
        let current = SampleSet::new(vec![CpuSample::new(200, 100), CpuSample::new(40, 20)]);
        assert_eq!(current.usage_since(&baseline), Err(StalledCore { index: 1 }));
    }

    #[test]
    fn test_set_usage_in_order() {
        let baseline = SampleSet::new(vec![CpuSample::new(100, 50), CpuSample::new(50, 50)]);
        let current = SampleSet::new(vec![CpuSample::new(200, 100), CpuSample::new(100, 50)]);
        let usage = current.usage_since(&baseline);
        assert_eq!(usage, Ok(UsageSnapshot::new(vec![0.5, 1.0])));
    }

    #[test]
    fn test_snapshot_accessors() {
        let usage = UsageSnapshot::new(vec![0.25, 0.5, 0.0]);
        assert_eq!(usage.aggregate(), Some(0.25));
        assert_eq!(usage.cores(), &[0.5, 0.0]);
        assert_eq!(usage.len(), 3);

        let empty = UsageSnapshot::default();
        assert!(empty.cores().is_empty());
        assert_eq!(empty.aggregate(), None);
    }

    #[test]
    fn test_raw_snapshot_conversions() {
        let raw = RawSnapshot::from("cpu 1 2 3 4");
        assert_eq!(raw.as_str(), "cpu 1 2 3 4");
        assert_eq!(raw.len(), 11);
        assert!(RawSnapshot::default().is_empty());
    }
}
