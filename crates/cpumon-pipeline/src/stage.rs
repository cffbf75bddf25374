//! Stage thread lifecycle.
//!
//! Every stage runs its loop on a dedicated thread and owns a [`StopToken`]
//! attached to the queues it blocks on. Termination is cooperative: a stop
//! request sets the token and wakes those queues, and the loop returns at its
//! next check.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpumon_sync::{BoundedQueue, PopOutcome, PushOutcome, StopToken};
use cpumon_watchdog::{WatchId, Watchdog};

use crate::error::{PipelineError, PipelineResult};

/// Lifecycle state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageState {
    /// The loop is running.
    Running,
    /// A stop was requested but the loop has not returned yet.
    StopRequested,
    /// The loop has returned.
    Stopped,
}

impl StageState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::StopRequested => 1,
            Self::Stopped => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::StopRequested,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::StopRequested => "stop-requested",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct AtomicStageState(AtomicU8);

impl AtomicStageState {
    fn new() -> Self {
        Self(AtomicU8::new(StageState::Running.as_u8()))
    }

    fn load(&self) -> StageState {
        StageState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Running -> `StopRequested`; never moves a stopped stage backwards.
    fn mark_stop_requested(&self) {
        if let Err(current) = self.0.compare_exchange(
            StageState::Running.as_u8(),
            StageState::StopRequested.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            tracing::trace!(state = %StageState::from_u8(current), "stop requested on a stage that is not running");
        }
    }

    fn mark_stopped(&self) {
        self.0.store(StageState::Stopped.as_u8(), Ordering::Release);
    }
}

/// Marks the stage stopped when the thread leaves its body, panics included.
struct StoppedOnExit(Arc<AtomicStageState>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Cloneable stop/state view of a stage, usable from any thread.
#[derive(Debug, Clone)]
pub struct StageControl {
    name: &'static str,
    token: StopToken,
    state: Arc<AtomicStageState>,
}

impl StageControl {
    /// Stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current lifecycle state.
    ///
    /// A stage stopped by the watchdog reports `StopRequested` until its loop
    /// returns.
    #[must_use]
    pub fn state(&self) -> StageState {
        match self.state.load() {
            StageState::Running if self.token.is_stop_requested() => StageState::StopRequested,
            state => state,
        }
    }

    /// Ask the stage to stop and wake the queues it may block on.
    pub fn request_stop(&self) {
        self.state.mark_stop_requested();
        if self.token.request_stop() {
            tracing::debug!(stage = self.name, "stop requested");
        }
    }
}

/// Owner handle of a running stage.
#[derive(Debug)]
pub struct StageHandle {
    control: StageControl,
    thread: Mutex<Option<JoinHandle<PipelineResult<()>>>>,
}

impl StageHandle {
    /// Stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.control.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.control.state()
    }

    /// Ask the stage to stop.
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    /// A cloneable control for this stage.
    #[must_use]
    pub fn control(&self) -> StageControl {
        self.control.clone()
    }

    /// Wait for the stage thread and return how its loop ended.
    ///
    /// Joining twice returns `Ok(())` the second time.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop, or
    /// [`PipelineError::StagePanicked`] if the thread panicked.
    pub fn join(&self) -> PipelineResult<()> {
        let handle = self.thread.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(stage = self.control.name, "stage thread panicked");
                Err(PipelineError::StagePanicked(self.control.name))
            }
        }
    }
}

/// Heartbeats per watchdog poll interval while a stage is otherwise idle.
const BEATS_PER_POLL: u32 = 4;

/// Heartbeat binding between a stage and its watch.
///
/// The blocking helpers wait in slices of [`period`](Self::period) and beat
/// between slices, so a stage parked on an empty or full queue, or sleeping
/// between samples, still reports alive every poll cycle.
#[derive(Debug, Clone)]
pub struct Liveness {
    watchdog: Arc<Watchdog>,
    id: WatchId,
    period: Duration,
}

impl Liveness {
    /// Bind `id` on `watchdog`.
    #[must_use]
    pub fn new(watchdog: Arc<Watchdog>, id: WatchId) -> Self {
        let period = (watchdog.poll_interval() / BEATS_PER_POLL).max(Duration::from_millis(1));
        Self {
            watchdog,
            id,
            period,
        }
    }

    /// Longest wait between two heartbeats.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Report the stage alive for the current poll cycle.
    ///
    /// Must not be called while holding a queue lock.
    pub fn beat(&self) {
        if let Err(e) = self.watchdog.heartbeat(self.id) {
            tracing::warn!(watch = %self.id, error = %e, "heartbeat rejected");
        }
    }

    /// Pop from `queue`, heartbeating while it stays empty.
    ///
    /// Returns `None` once `token` is stopped.
    pub fn pop<T>(&self, queue: &BoundedQueue<T>, token: &StopToken) -> Option<T> {
        loop {
            match queue.pop_blocking_for(token, self.period) {
                PopOutcome::Item(item) => return Some(item),
                PopOutcome::TimedOut => self.beat(),
                PopOutcome::Stopped => return None,
            }
        }
    }

    /// Push onto `queue`, heartbeating while it stays full.
    ///
    /// # Errors
    ///
    /// Hands the item back once `token` is stopped.
    pub fn push<T>(&self, queue: &BoundedQueue<T>, item: T, token: &StopToken) -> Result<(), T> {
        let mut pending = item;
        loop {
            match queue.push_blocking_for(pending, token, self.period) {
                PushOutcome::Inserted => return Ok(()),
                PushOutcome::TimedOut(item) => {
                    self.beat();
                    pending = item;
                }
                PushOutcome::Stopped(item) => return Err(item),
            }
        }
    }

    /// Sleep for `duration` on `token`, heartbeating every period.
    ///
    /// Returns `true` if `token` was stopped before or during the sleep.
    pub fn sleep(&self, token: &StopToken, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            while !token.sleep(self.period) {
                self.beat();
            }
            return true;
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return token.is_stop_requested();
            }
            if token.sleep(remaining.min(self.period)) {
                return true;
            }
            if Instant::now() < deadline {
                self.beat();
            }
        }
    }
}

/// Spawn `body` on a named thread as stage `name`.
///
/// # Errors
///
/// Returns [`PipelineError::SpawnFailed`] if the thread cannot be created.
pub(crate) fn spawn_stage<F>(
    name: &'static str,
    token: StopToken,
    body: F,
) -> PipelineResult<StageHandle>
where
    F: FnOnce(&StopToken) -> PipelineResult<()> + Send + 'static,
{
    let state = Arc::new(AtomicStageState::new());
    let control = StageControl {
        name,
        token: token.clone(),
        state: Arc::clone(&state),
    };

    let thread = std::thread::Builder::new()
        .name(format!("cpumon-{name}"))
        .spawn(move || {
            let _stopped = StoppedOnExit(state);
            tracing::debug!(stage = name, "stage started");
            let result = body(&token);
            match &result {
                Ok(()) => tracing::debug!(stage = name, "stage ending"),
                Err(e) => tracing::error!(stage = name, error = %e, "stage failed"),
            }
            result
        })
        .map_err(|e| PipelineError::spawn_failed(name, &e))?;

    Ok(StageHandle {
        control,
        thread: Mutex::new(Some(thread)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpumon_sync::Wake;
    use cpumon_watchdog::WatchdogConfig;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn enforced_watch(token: &StopToken) -> Result<(Arc<Watchdog>, Liveness), Box<dyn std::error::Error>> {
        let watchdog = Arc::new(Watchdog::start(WatchdogConfig {
            capacity: 1,
            poll_interval: Duration::from_millis(200),
        })?);
        let id = watchdog.register_watch("idle", token.clone())?;
        let liveness = Liveness::new(Arc::clone(&watchdog), id);
        watchdog.start_enforcing();
        Ok((watchdog, liveness))
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            StageState::Running,
            StageState::StopRequested,
            StageState::Stopped,
        ] {
            assert_eq!(StageState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_stage_lifecycle() -> PipelineResult<()> {
        let handle = spawn_stage("idle", StopToken::default(), |token| {
            while !token.sleep(Duration::from_secs(30)) {}
            Ok(())
        })?;

        assert_eq!(handle.name(), "idle");
        assert_eq!(handle.state(), StageState::Running);

        handle.request_stop();
        assert_ne!(handle.state(), StageState::Running);

        handle.join()?;
        assert_eq!(handle.state(), StageState::Stopped);
        handle.join()?;
        Ok(())
    }

    #[test]
    fn test_external_token_stop_is_visible() -> PipelineResult<()> {
        let token = StopToken::default();
        let handle = spawn_stage("watched", token.clone(), |token| {
            while !token.sleep(Duration::from_secs(30)) {}
            Ok(())
        })?;

        token.request_stop();
        handle.join()?;
        assert_eq!(handle.state(), StageState::Stopped);
        Ok(())
    }

    #[test]
    fn test_stage_error_is_returned_by_join() -> PipelineResult<()> {
        let handle = spawn_stage("failing", StopToken::default(), |_| {
            Err(PipelineError::MissingCollaborator("source"))
        })?;
        assert!(matches!(
            handle.join(),
            Err(PipelineError::MissingCollaborator("source"))
        ));
        assert_eq!(handle.state(), StageState::Stopped);
        Ok(())
    }

    #[test]
    fn test_request_stop_after_exit_keeps_stopped() -> PipelineResult<()> {
        let handle = spawn_stage("quick", StopToken::default(), |_| Ok(()))?;
        handle.join()?;
        handle.request_stop();
        assert_eq!(handle.state(), StageState::Stopped);
        Ok(())
    }

    #[test]
    fn test_period_is_a_quarter_of_the_poll_interval() -> TestResult {
        let token = StopToken::default();
        let (watchdog, liveness) = enforced_watch(&token)?;
        watchdog.pause_enforcing();
        assert_eq!(liveness.period(), Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn test_waiting_on_empty_queue_keeps_watch_alive() -> TestResult {
        let queue = Arc::new(BoundedQueue::<u8>::new(1)?);
        let token = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);
        let (watchdog, liveness) = enforced_watch(&token)?;

        let handle = spawn_stage("idle", token, move |token| {
            assert_eq!(liveness.pop(&queue, token), None);
            Ok(())
        })?;

        std::thread::sleep(Duration::from_millis(700));
        assert!(watchdog.fault().is_none(), "idle consumer missed a cycle");

        handle.request_stop();
        handle.join()?;
        Ok(())
    }

    #[test]
    fn test_waiting_on_full_queue_keeps_watch_alive() -> TestResult {
        let queue = Arc::new(BoundedQueue::<u8>::new(1)?);
        let token = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);
        let (watchdog, liveness) = enforced_watch(&token)?;
        assert!(queue.push_blocking(1, &token).is_ok());

        let blocked = Arc::clone(&queue);
        let handle = spawn_stage("idle", token, move |token| {
            assert_eq!(liveness.push(&blocked, 2, token), Err(2));
            Ok(())
        })?;

        std::thread::sleep(Duration::from_millis(700));
        assert!(watchdog.fault().is_none(), "blocked producer missed a cycle");

        handle.request_stop();
        handle.join()?;
        assert_eq!(queue.drain(), vec![1]);
        Ok(())
    }

    #[test]
    fn test_long_sleep_keeps_watch_alive() -> TestResult {
        let token = StopToken::default();
        let (watchdog, liveness) = enforced_watch(&token)?;

        let stopped = liveness.sleep(&token, Duration::from_millis(700));
        assert!(!stopped);
        assert!(watchdog.fault().is_none(), "sleeping stage missed a cycle");
        Ok(())
    }
}
