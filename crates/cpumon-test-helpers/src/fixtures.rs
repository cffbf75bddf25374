//! `/proc/stat` text builders.

/// Busy and idle jiffies for one `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreTimes {
    /// Jiffies spent in user mode.
    pub busy: u64,
    /// Jiffies spent idle.
    pub idle: u64,
}

impl CoreTimes {
    /// Create core times.
    #[must_use]
    pub const fn new(busy: u64, idle: u64) -> Self {
        Self { busy, idle }
    }
}

/// One full-width `cpu` line: busy time as `user`, idle time as `idle`.
#[must_use]
pub fn stat_line(label: &str, times: CoreTimes) -> String {
    format!("{label} {} 0 0 {} 0 0 0 0 0 0", times.busy, times.idle)
}

/// A `/proc/stat` snapshot: aggregate line summing `cores`, one line per core,
/// then the usual non-CPU lines.
#[must_use]
pub fn stat_text(cores: &[CoreTimes]) -> String {
    let aggregate = cores.iter().fold(CoreTimes::default(), |acc, c| CoreTimes {
        busy: acc.busy + c.busy,
        idle: acc.idle + c.idle,
    });

    let mut text = stat_line("cpu ", aggregate);
    text.push('\n');
    for (index, times) in cores.iter().enumerate() {
        text.push_str(&stat_line(&format!("cpu{index}"), *times));
        text.push('\n');
    }
    text.push_str(TRAILER);
    text
}

/// A snapshot where every one of `cores` cores has advanced by `tick` busy
/// and `tick` idle jiffies per step, i.e. 50% usage between any two steps.
#[must_use]
pub fn half_busy_step(cores: usize, step: u64, tick: u64) -> String {
    let times = CoreTimes::new(step * tick, step * tick);
    stat_text(&vec![times; cores])
}

/// Snapshot captured on an older kernel with only four counters per line.
#[must_use]
pub fn old_kernel_stat(cores: &[CoreTimes]) -> String {
    let mut text = String::new();
    let total = cores.iter().fold(CoreTimes::default(), |acc, c| CoreTimes {
        busy: acc.busy + c.busy,
        idle: acc.idle + c.idle,
    });
    text.push_str(&format!("cpu  {} 0 0 {}\n", total.busy, total.idle));
    for (index, times) in cores.iter().enumerate() {
        text.push_str(&format!("cpu{index} {} 0 0 {}\n", times.busy, times.idle));
    }
    text
}

const TRAILER: &str = "\
intr 1184 27 0 0 0 0 0 0 0 1 0
ctxt 240514
btime 1700000000
processes 5123
procs_running 2
procs_blocked 0
softirq 4870 0 1090 3 150 0 0 12 1600 0 2015
";
