//! `/proc/stat` parsing.
//!
//! Only lines whose label starts with `cpu` are considered. Each line is
//! `<label> user nice system idle iowait irq softirq steal guest guest_nice`.
//! Older kernels omit trailing fields; those count as zero, but the first four
//! are required. Guest time is already part of user and nice, so the guest
//! columns are ignored.

use crate::error::StatParseError;
use crate::sample::{CpuSample, SampleSet};

const REQUIRED_COUNTERS: usize = 4;
const USED_COUNTERS: usize = 8;

const IDLE: usize = 3;
const IOWAIT: usize = 4;

/// Whether a line is a per-CPU counter line.
fn is_cpu_line(line: &str) -> bool {
    line.starts_with("cpu")
}

/// Count the `cpu` lines of a snapshot, aggregate included.
#[must_use]
pub fn count_cpu_lines(text: &str) -> usize {
    text.lines().filter(|line| is_cpu_line(line)).count()
}

/// Parse one `cpu` line's counters.
///
/// `line_no` is only used for error reporting.
///
/// # Errors
///
/// Returns an error when fewer than four counters are present or a used
/// counter is not an unsigned integer.
pub fn parse_cpu_line(line: &str, line_no: usize) -> Result<CpuSample, StatParseError> {
    let mut counters = [0u64; USED_COUNTERS];
    let mut found = 0;

    for token in line.split_whitespace().skip(1).take(USED_COUNTERS) {
        let value = token.parse().map_err(|_| StatParseError::InvalidCounter {
            line: line_no,
            token: token.to_string(),
        })?;
        if let Some(slot) = counters.get_mut(found) {
            *slot = value;
        }
        found += 1;
    }

    if found < REQUIRED_COUNTERS {
        return Err(StatParseError::MissingCounters {
            line: line_no,
            found,
        });
    }

    let total = counters.iter().fold(0u64, |acc, v| acc.saturating_add(*v));
    let idle = counters[IDLE].saturating_add(counters[IOWAIT]);
    Ok(CpuSample::new(total, idle))
}

/// Parse every `cpu` line of a snapshot, in order.
///
/// # Errors
///
/// Returns an error if there are no `cpu` lines or any of them is malformed.
pub fn parse_stat(text: &str) -> Result<SampleSet, StatParseError> {
    let samples = text
        .lines()
        .enumerate()
        .filter(|(_, line)| is_cpu_line(line))
        .map(|(index, line)| parse_cpu_line(line, index + 1))
        .collect::<Result<Vec<_>, _>>()?;

    if samples.is_empty() {
        return Err(StatParseError::NoCpuLines);
    }
    Ok(SampleSet::new(samples))
}
