//! Cooperative stop tokens.
//!
//! A [`StopToken`] is shared between a pipeline stage and whoever may ask it to
//! stop (the orchestrator, the watchdog). Requesting a stop sets a flag that is
//! never cleared and then wakes every [`Wake`] target the stage may be blocked
//! on, so the stage observes the flag at its next predicate check.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Something a stopped thread may be blocked on.
///
/// Implementors must wake every waiter, and must do so while holding the same
/// lock the waiters check their predicates under. Otherwise a waiter that has
/// checked the stop flag but not yet started waiting can miss the wakeup.
pub trait Wake: Send + Sync {
    /// Wake all threads currently blocked on this target.
    fn wake_all(&self);
}

struct StopInner {
    requested: AtomicBool,
    targets: Vec<Arc<dyn Wake>>,
    sleep_lock: Mutex<()>,
    sleep_signal: Condvar,
}

/// Cloneable, set-once cancellation token.
///
/// Clones share state: stopping any clone stops them all.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

impl StopToken {
    /// Create a token that wakes `targets` when stopped.
    pub fn new<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Wake>>,
    {
        Self {
            inner: Arc::new(StopInner {
                requested: AtomicBool::new(false),
                targets: targets.into_iter().collect(),
                sleep_lock: Mutex::new(()),
                sleep_signal: Condvar::new(),
            }),
        }
    }

    /// Request a stop.
    ///
    /// Sets the flag, then wakes threads sleeping in [`sleep`](Self::sleep)
    /// and every registered target. Returns `true` only for the call that
    /// actually performed the transition; later calls are no-ops.
    pub fn request_stop(&self) -> bool {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            return false;
        }

        {
            let _guard = self.inner.sleep_lock.lock();
            self.inner.sleep_signal.notify_all();
        }
        for target in &self.inner.targets {
            target.wake_all();
        }
        true
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `true` if the token was stopped before or during the sleep.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut guard = self.inner.sleep_lock.lock();
        let Some(deadline) = Instant::now().checked_add(duration) else {
            while !self.is_stop_requested() {
                self.inner.sleep_signal.wait(&mut guard);
            }
            return true;
        };

        while !self.is_stop_requested() {
            if self
                .inner
                .sleep_signal
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.is_stop_requested();
            }
        }
        true
    }

    /// Number of wake targets attached to this token.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.inner.targets.len()
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("requested", &self.is_stop_requested())
            .field("targets", &self.inner.targets.len())
            .finish()
    }
}
