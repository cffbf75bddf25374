//! Watch registry and monitor loop.
//!
//! This module provides the [`Watchdog`] that owns every registered watch and
//! the background thread that evaluates them once per poll interval.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpumon_sync::StopToken;

use crate::error::{WatchdogError, WatchdogResult};

/// Default time between two liveness evaluations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of watch slots: one per pipeline stage.
pub const DEFAULT_CAPACITY: usize = 3;

/// Watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Maximum number of watches that can be registered.
    pub capacity: usize,
    /// Time between two liveness evaluations.
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WatchdogConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity or the poll interval is zero.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.capacity == 0 {
            return Err(WatchdogError::invalid_configuration(
                "capacity must be greater than 0",
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(WatchdogError::invalid_configuration(
                "poll_interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }
}

/// Builder for `WatchdogConfig`.
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Set the number of watch slots.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Handle to a registered watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(usize);

impl WatchId {
    /// Registration index of this watch.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// A poll cycle at which at least one watch had not heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessFault {
    /// Poll cycle (1-based) at which the fault was declared.
    pub cycle: u64,
    /// Names of the silent watches, in registration order.
    pub missed: Vec<String>,
}

impl std::fmt::Display for LivenessFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "liveness fault at cycle {}: no heartbeat from {}",
            self.cycle,
            self.missed.join(", ")
        )
    }
}

struct Watch {
    name: String,
    token: StopToken,
    alive: bool,
}

struct Registry {
    watches: Vec<Watch>,
    capacity: usize,
    enforcing: bool,
    stop: bool,
    cycle: u64,
    fault: Option<LivenessFault>,
}

impl Registry {
    /// Scan, then reset, every liveness flag. Returns the silent watches.
    fn evaluate(&mut self) -> Vec<String> {
        let enforcing = self.enforcing;
        let mut missed = Vec::new();
        for watch in &mut self.watches {
            if enforcing && !watch.alive {
                missed.push(watch.name.clone());
            }
            watch.alive = false;
        }
        missed
    }
}

struct Shared {
    registry: Mutex<Registry>,
    tick: Condvar,
    poll_interval: Duration,
}

/// Liveness watchdog with a background monitor thread.
///
/// # Thread Safety
///
/// All methods take `&self`; share the watchdog behind an `Arc`. The registry
/// lock is never held while waiting on anything but the monitor's own tick,
/// and stop tokens are only fired by the monitor thread.
pub struct Watchdog {
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    /// Create the watchdog and spawn its monitor thread.
    ///
    /// Enforcement starts paused; call [`start_enforcing`](Self::start_enforcing)
    /// once the watched stages are up.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the monitor thread
    /// cannot be spawned.
    pub fn start(config: WatchdogConfig) -> WatchdogResult<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry {
                watches: Vec::with_capacity(config.capacity),
                capacity: config.capacity,
                enforcing: false,
                stop: false,
                cycle: 0,
                fault: None,
            }),
            tick: Condvar::new(),
            poll_interval: config.poll_interval,
        });

        let monitor = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("cpumon-watchdog".to_string())
                .spawn(move || monitor_loop(&shared))
                .map_err(|e| WatchdogError::spawn_failed(&e))?
        };

        tracing::debug!(
            capacity = config.capacity,
            poll_interval_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "watchdog started"
        );

        Ok(Self {
            shared,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// Register a watch.
    ///
    /// The watchdog keeps `token` and fires it if a liveness fault is declared.
    /// A new watch counts as alive until the first poll after registration.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::CapacityExceeded`] if every slot is taken.
    pub fn register_watch(&self, name: impl Into<String>, token: StopToken) -> WatchdogResult<WatchId> {
        let name = name.into();
        let mut registry = self.shared.registry.lock();
        if registry.watches.len() >= registry.capacity {
            tracing::warn!(watch = %name, capacity = registry.capacity, "watch registry full");
            return Err(WatchdogError::CapacityExceeded {
                capacity: registry.capacity,
            });
        }

        let id = WatchId(registry.watches.len());
        tracing::debug!(watch = %name, %id, "watch registered");
        registry.watches.push(Watch {
            name,
            token,
            alive: true,
        });
        Ok(id)
    }

    /// Mark a watch alive for the current poll cycle.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::UnknownWatch`] if `id` was not issued by this
    /// watchdog.
    pub fn heartbeat(&self, id: WatchId) -> WatchdogResult<()> {
        let mut registry = self.shared.registry.lock();
        let watch = registry
            .watches
            .get_mut(id.0)
            .ok_or(WatchdogError::UnknownWatch(id))?;
        watch.alive = true;
        Ok(())
    }

    /// Time between two liveness evaluations.
    ///
    /// A watch has to heartbeat at least this often to stay alive.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Make missed heartbeats count as faults.
    pub fn start_enforcing(&self) {
        self.shared.registry.lock().enforcing = true;
        tracing::info!("watchdog enforcing");
    }

    /// Stop treating missed heartbeats as faults.
    pub fn pause_enforcing(&self) {
        self.shared.registry.lock().enforcing = false;
        tracing::info!("watchdog paused");
    }

    /// Ask the monitor thread to exit.
    ///
    /// Does not fire any watch's stop token.
    pub fn request_stop(&self) {
        let mut registry = self.shared.registry.lock();
        registry.stop = true;
        self.shared.tick.notify_all();
        tracing::debug!("watchdog stop requested");
    }

    /// Wait for the monitor thread to exit.
    ///
    /// Returns immediately if it has already been joined.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::MonitorPanicked`] if the monitor thread
    /// panicked.
    pub fn join(&self) -> WatchdogResult<()> {
        let handle = self.monitor.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.join() {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::error!("watchdog monitor panicked");
                Err(WatchdogError::MonitorPanicked)
            }
        }
    }

    /// Whether enforcement is on.
    #[must_use]
    pub fn is_enforcing(&self) -> bool {
        self.shared.registry.lock().enforcing
    }

    /// Whether the monitor has been asked to stop, or stopped itself on a fault.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.shared.registry.lock().stop
    }

    /// The fault that stopped the pipeline, if any.
    #[must_use]
    pub fn fault(&self) -> Option<LivenessFault> {
        self.shared.registry.lock().fault.clone()
    }

    /// Number of registered watches.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.shared.registry.lock().watches.len()
    }

    /// Number of poll cycles evaluated so far.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.registry.lock().cycle
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.request_stop();
        if let Err(e) = self.join() {
            tracing::error!(error = %e, "watchdog monitor ended abnormally");
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.shared.registry.lock();
        f.debug_struct("Watchdog")
            .field("poll_interval", &self.shared.poll_interval)
            .field("watches", &registry.watches.len())
            .field("capacity", &registry.capacity)
            .field("enforcing", &registry.enforcing)
            .field("stop", &registry.stop)
            .field("cycle", &registry.cycle)
            .finish()
    }
}

fn monitor_loop(shared: &Shared) {
    tracing::debug!("watchdog monitor running");
    let mut registry = shared.registry.lock();

    while !registry.stop {
        registry.cycle = registry.cycle.saturating_add(1);
        let missed = registry.evaluate();

        if !missed.is_empty() {
            registry.stop = true;
            let fault = LivenessFault {
                cycle: registry.cycle,
                missed,
            };
            tracing::warn!(
                cycle = fault.cycle,
                missed = ?fault.missed,
                "liveness fault, stopping every watch"
            );
            // Fired in registration order, with the registry lock held.
            for watch in &registry.watches {
                watch.token.request_stop();
            }
            registry.fault = Some(fault);
            break;
        }

        let Some(deadline) = Instant::now().checked_add(shared.poll_interval) else {
            break;
        };
        while !registry.stop {
            if shared.tick.wait_until(&mut registry, deadline).timed_out() {
                break;
            }
        }
    }

    tracing::debug!(cycles = registry.cycle, "watchdog monitor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> WatchdogConfig {
        WatchdogConfig {
            capacity: 2,
            poll_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_config_builder() -> WatchdogResult<()> {
        let config = WatchdogConfig::builder()
            .capacity(5)
            .poll_interval(Duration::from_millis(250))
            .build()?;

        assert_eq!(config.capacity, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn test_config_validation() {
        let config = WatchdogConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WatchdogConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(WatchdogConfig::default().validate().is_ok());
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let result = Watchdog::start(WatchdogConfig {
            capacity: 0,
            ..quick_config()
        });
        assert!(matches!(result, Err(WatchdogError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_registration_respects_capacity() -> WatchdogResult<()> {
        let watchdog = Watchdog::start(quick_config())?;

        let first = watchdog.register_watch("reader", StopToken::default())?;
        let second = watchdog.register_watch("analyzer", StopToken::default())?;
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);

        let third = watchdog.register_watch("printer", StopToken::default());
        assert_eq!(third, Err(WatchdogError::CapacityExceeded { capacity: 2 }));
        assert_eq!(watchdog.watch_count(), 2);
        Ok(())
    }

    #[test]
    fn test_heartbeat_unknown_watch() -> WatchdogResult<()> {
        let watchdog = Watchdog::start(quick_config())?;
        let result = watchdog.heartbeat(WatchId(7));
        assert_eq!(result, Err(WatchdogError::UnknownWatch(WatchId(7))));
        Ok(())
    }

    #[test]
    fn test_enforcing_toggle() -> WatchdogResult<()> {
        let watchdog = Watchdog::start(quick_config())?;
        assert_eq!(watchdog.poll_interval(), Duration::from_secs(60));
        assert!(!watchdog.is_enforcing());
        watchdog.start_enforcing();
        assert!(watchdog.is_enforcing());
        watchdog.pause_enforcing();
        assert!(!watchdog.is_enforcing());
        Ok(())
    }

    #[test]
    fn test_evaluate_scans_then_resets() {
        let mut registry = Registry {
            watches: vec![
                Watch {
                    name: "alive".into(),
                    token: StopToken::default(),
                    alive: true,
                },
                Watch {
                    name: "silent".into(),
                    token: StopToken::default(),
                    alive: false,
                },
            ],
            capacity: 2,
            enforcing: false,
            stop: false,
            cycle: 0,
            fault: None,
        };

        assert!(registry.evaluate().is_empty());
        assert!(registry.watches.iter().all(|w| !w.alive));

        registry.enforcing = true;
        if let Some(watch) = registry.watches.first_mut() {
            watch.alive = true;
        }
        assert_eq!(registry.evaluate(), vec!["silent".to_string()]);
        assert!(registry.watches.iter().all(|w| !w.alive));
    }

    #[test]
    fn test_stop_is_sticky_and_join_is_idempotent() -> WatchdogResult<()> {
        let watchdog = Watchdog::start(quick_config())?;
        watchdog.request_stop();
        watchdog.join()?;
        assert!(watchdog.is_stop_requested());
        watchdog.join()?;
        assert!(watchdog.is_stop_requested());
        Ok(())
    }

    #[test]
    fn test_fault_display_lists_watches() {
        let fault = LivenessFault {
            cycle: 4,
            missed: vec!["analyzer".into(), "printer".into()],
        };
        assert_eq!(
            fault.to_string(),
            "liveness fault at cycle 4: no heartbeat from analyzer, printer"
        );
    }
}
