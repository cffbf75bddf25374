//! cpumon - per-core CPU usage monitor
//!
//! Samples `/proc/stat`, renders per-core usage to the terminal once per
//! interval and stops every stage if one of them stops making progress.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod config;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cpumon_pipeline::prelude::*;

use crate::config::Overrides;
use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "cpumon")]
#[command(about = "Per-core CPU usage monitor")]
#[command(version)]
#[command(long_about = "
cpumon reads the kernel CPU counters once per interval and redraws a table of
per-core usage on standard output. A watchdog stops the whole pipeline if any
stage stops heartbeating; the process then exits with status 2.

Send SIGTERM or press Ctrl-C to stop.
")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "CPUMON_CONFIG")]
    config: Option<PathBuf>,

    /// Counter file to sample
    #[arg(long)]
    stat_path: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Capacity of both stage queues
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Watchdog poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Delay before the watchdog starts enforcing, in milliseconds
    #[arg(long)]
    grace_period_ms: Option<u64>,

    /// Never enforce liveness (the monitor thread still runs)
    #[arg(long)]
    no_watchdog: bool,

    /// Append diagnostics to this file instead of standard error
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            stat_path: self.stat_path.clone(),
            interval_ms: self.interval_ms,
            queue_capacity: self.queue_capacity,
            poll_interval_ms: self.poll_interval_ms,
            grace_period_ms: self.grace_period_ms,
            no_watchdog: self.no_watchdog,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config = config::resolve(cli.config.as_deref(), &cli.overrides())?;
    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let pipeline = Pipeline::builder(config.clone())
        .source(ProcStatSource::new(&config.stat_path))
        .sink(TerminalRenderer::stdout())
        .build()
        .context("failed to start pipeline")?;
    let shutdown = pipeline.shutdown_handle();

    let terminated = termination();
    tokio::pin!(terminated);

    // Stages need one interval to produce a baseline before they can be held
    // to the watchdog.
    if config.watchdog.enabled {
        tokio::select! {
            () = tokio::time::sleep(config.watchdog.grace_period()) => {
                pipeline.start_enforcing();
            }
            signal = &mut terminated => {
                signal.context("failed to listen for termination signals")?;
                shutdown.shutdown();
            }
        }
    }

    let mut joined = tokio::task::spawn_blocking(move || pipeline.join());
    let report = tokio::select! {
        result = &mut joined => result,
        signal = &mut terminated, if !shutdown.is_shutdown() => {
            signal.context("failed to listen for termination signals")?;
            shutdown.shutdown();
            (&mut joined).await
        }
    }
    .context("pipeline join task failed")??;

    tracing::info!(
        residual_raw = report.residual_raw,
        residual_usage = report.residual_usage,
        watchdog_cycles = report.watchdog_cycles,
        "cpumon exiting"
    );
    for failure in &report.failures {
        tracing::error!(stage = failure.stage, error = %failure.error, "stage failed");
    }

    match CliError::from_report(&report) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Resolves on SIGTERM or Ctrl-C.
async fn termination() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = term.recv() => tracing::info!("received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("received Ctrl-C");
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl-C");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["cpumon"])?;
        assert!(cli.config.is_none());
        assert!(!cli.no_watchdog);
        assert!(!cli.print_config);
        assert_eq!(cli.verbose, 0);

        let overrides = cli.overrides();
        assert!(overrides.interval_ms.is_none());
        assert!(overrides.stat_path.is_none());
        Ok(())
    }

    #[test]
    fn parse_overrides() -> TestResult {
        let cli = Cli::try_parse_from([
            "cpumon",
            "--stat-path",
            "/tmp/stat",
            "--interval-ms",
            "250",
            "--queue-capacity",
            "4",
            "--no-watchdog",
            "-vv",
        ])?;
        let overrides = cli.overrides();

        assert_eq!(overrides.stat_path, Some(PathBuf::from("/tmp/stat")));
        assert_eq!(overrides.interval_ms, Some(250));
        assert_eq!(overrides.queue_capacity, Some(4));
        assert!(overrides.no_watchdog);
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn rejects_non_numeric_interval() {
        let result = Cli::try_parse_from(["cpumon", "--interval-ms", "soon"]);
        assert!(result.is_err());
    }
}
