//! Fixed-capacity blocking FIFO.
//!
//! [`BoundedQueue`] is a ring buffer behind a single mutex with two condition
//! variables, one signalled when space frees up and one when an item arrives.
//! Callers take the lock explicitly with [`BoundedQueue::lock`] and drive the
//! wait/check sequence through the returned [`QueueGuard`]:
//!
//! ```rust
//! use cpumon_sync::BoundedQueue;
//!
//! let queue = BoundedQueue::new(1)?;
//! {
//!     let mut guard = queue.lock();
//!     while guard.is_full() {
//!         guard.wait_to_insert();
//!     }
//!     assert!(guard.insert("sample").is_ok());
//!     guard.notify_extract();
//! }
//! assert_eq!(queue.lock().extract(), Some("sample"));
//! # Ok::<(), cpumon_sync::QueueError>(())
//! ```
//!
//! Inserting into a full queue or extracting from an empty one is a caller
//! error. Both are rejected without touching the ring: the item is handed back
//! from [`QueueGuard::insert`] and [`QueueGuard::extract`] yields `None`.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{QueueError, QueueResult};
use crate::stop::{StopToken, Wake};

/// Ring storage. `head` is the next slot to extract, `tail` the next slot to fill.
struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn advance(&self, index: usize) -> usize {
        index.wrapping_add(1) % self.capacity()
    }

    fn push(&mut self, item: T) -> Result<(), T> {
        if self.len >= self.capacity() {
            return Err(item);
        }
        let tail = self.tail;
        let Some(slot) = self.slots.get_mut(tail) else {
            return Err(item);
        };
        if slot.is_some() {
            return Err(item);
        }
        *slot = Some(item);
        self.tail = self.advance(tail);
        self.len = self.len.saturating_add(1);
        Ok(())
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let head = self.head;
        let item = self.slots.get_mut(head)?.take()?;
        self.head = self.advance(head);
        self.len = self.len.saturating_sub(1);
        Some(item)
    }
}

/// Fixed-capacity FIFO with blocking insert/extract.
///
/// Capacity is immutable after creation. Ordering is strict FIFO across any
/// number of producers and consumers contending on the same queue.
///
/// # Thread Safety
///
/// `BoundedQueue<T>` is `Sync` whenever `T: Send`; share it behind an `Arc`.
/// Items move into the queue on insert and out to the caller on extract, so
/// ownership always lies with exactly one side.
pub struct BoundedQueue<T> {
    capacity: usize,
    ring: Mutex<Ring<T>>,
    can_insert: Condvar,
    can_extract: Condvar,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> QueueResult<Self> {
        if capacity == 0 {
            tracing::warn!("rejected queue creation with zero capacity");
            return Err(QueueError::ZeroCapacity);
        }

        Ok(Self {
            capacity,
            ring: Mutex::new(Ring::with_capacity(capacity)),
            can_insert: Condvar::new(),
            can_extract: Condvar::new(),
        })
    }

    /// The fixed capacity chosen at creation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the queue lock.
    ///
    /// The lock is released when the returned guard is dropped. Hold it across
    /// a whole check-wait-act sequence, never across calls into other
    /// components.
    pub fn lock(&self) -> QueueGuard<'_, T> {
        QueueGuard {
            queue: self,
            ring: self.ring.lock(),
        }
    }

    /// Insert `item`, blocking while the queue is full.
    ///
    /// The stop token is checked under the lock before every wait and after
    /// every wake, so a stop request issued while the caller is blocked (or
    /// about to block) always ends the wait.
    ///
    /// # Errors
    ///
    /// Returns the item back if `stop` was requested before it could be
    /// inserted.
    pub fn push_blocking(&self, item: T, stop: &StopToken) -> Result<(), T> {
        let mut guard = self.lock();
        loop {
            if stop.is_stop_requested() {
                return Err(item);
            }
            if !guard.is_full() {
                break;
            }
            guard.wait_to_insert();
        }

        guard.insert(item)?;
        guard.notify_extract();
        Ok(())
    }

    /// Extract the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once `stop` has been requested. Items still queued at
    /// that point stay in the queue for the owner to [`drain`](Self::drain).
    pub fn pop_blocking(&self, stop: &StopToken) -> Option<T> {
        let mut guard = self.lock();
        loop {
            if stop.is_stop_requested() {
                return None;
            }
            if !guard.is_empty() {
                break;
            }
            guard.wait_to_extract();
        }

        let item = guard.extract();
        guard.notify_insert();
        item
    }

    /// Remove every queued item, oldest first.
    ///
    /// Used once all producers and consumers have terminated to reclaim
    /// residual items.
    pub fn drain(&self) -> Vec<T> {
        let mut guard = self.lock();
        let mut items = Vec::with_capacity(guard.len());
        while let Some(item) = guard.extract() {
            items.push(item);
        }
        guard.notify_insert();
        items
    }
}

impl<T> BoundedQueue<T> {
    /// Insert `item`, waiting at most `timeout` for space.
    ///
    /// Same stop contract as [`push_blocking`](Self::push_blocking). On
    /// timeout or stop the item is handed back so the caller can retry.
    pub fn push_blocking_for(&self, item: T, stop: &StopToken, timeout: Duration) -> PushOutcome<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock();
        loop {
            if stop.is_stop_requested() {
                return PushOutcome::Stopped(item);
            }
            if !guard.is_full() {
                break;
            }
            let remaining = remaining_until(deadline, timeout);
            if remaining.is_zero() {
                return PushOutcome::TimedOut(item);
            }
            guard.wait_to_insert_for(remaining);
        }

        match guard.insert(item) {
            Ok(()) => {
                guard.notify_extract();
                PushOutcome::Inserted
            }
            Err(item) => PushOutcome::TimedOut(item),
        }
    }

    /// Extract the oldest item, waiting at most `timeout` for one to arrive.
    ///
    /// Same stop contract as [`pop_blocking`](Self::pop_blocking).
    pub fn pop_blocking_for(&self, stop: &StopToken, timeout: Duration) -> PopOutcome<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock();
        loop {
            if stop.is_stop_requested() {
                return PopOutcome::Stopped;
            }
            if !guard.is_empty() {
                break;
            }
            let remaining = remaining_until(deadline, timeout);
            if remaining.is_zero() {
                return PopOutcome::TimedOut;
            }
            guard.wait_to_extract_for(remaining);
        }

        match guard.extract() {
            Some(item) => {
                guard.notify_insert();
                PopOutcome::Item(item)
            }
            None => PopOutcome::TimedOut,
        }
    }
}

/// Time left before `deadline`; an unrepresentable deadline never expires.
fn remaining_until(deadline: Option<Instant>, timeout: Duration) -> Duration {
    deadline.map_or(timeout, |deadline| {
        deadline.saturating_duration_since(Instant::now())
    })
}

/// Result of [`BoundedQueue::push_blocking_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PushOutcome<T> {
    /// The item is in the queue.
    Inserted,
    /// The queue stayed full for the whole timeout.
    TimedOut(T),
    /// A stop was requested before the item could be inserted.
    Stopped(T),
}

/// Result of [`BoundedQueue::pop_blocking_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PopOutcome<T> {
    /// The oldest queued item.
    Item(T),
    /// The queue stayed empty for the whole timeout.
    TimedOut,
    /// A stop was requested.
    Stopped,
}

impl<T: Send> Wake for BoundedQueue<T> {
    fn wake_all(&self) {
        let _guard = self.ring.lock();
        self.can_insert.notify_all();
        self.can_extract.notify_all();
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.ring.try_lock().map(|ring| ring.len))
            .finish()
    }
}

/// Exclusive access to a [`BoundedQueue`] while the lock is held.
///
/// All predicates and mutations go through the guard so that a check and the
/// action depending on it happen under the same lock acquisition.
pub struct QueueGuard<'a, T> {
    queue: &'a BoundedQueue<T>,
    ring: MutexGuard<'a, Ring<T>>,
}

impl<T> QueueGuard<'_, T> {
    /// Whether no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len == 0
    }

    /// Whether every slot is occupied.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.len >= self.queue.capacity
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len
    }

    /// The queue's fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }

    /// Append `item` at the tail.
    ///
    /// # Errors
    ///
    /// Returns the item back, leaving the queue untouched, if the queue is
    /// full.
    pub fn insert(&mut self, item: T) -> Result<(), T> {
        self.ring.push(item).inspect_err(|_| {
            tracing::warn!(
                capacity = self.queue.capacity,
                "rejected insert into full queue"
            );
        })
    }

    /// Remove the item at the head, or `None` if the queue is empty.
    pub fn extract(&mut self) -> Option<T> {
        self.ring.pop()
    }

    /// Block until space may be available.
    ///
    /// The lock is released while waiting and re-acquired before returning.
    /// Wakeups may be spurious or coalesced, so always call this inside a
    /// `while guard.is_full()` loop.
    pub fn wait_to_insert(&mut self) {
        self.queue.can_insert.wait(&mut self.ring);
    }

    /// Block until an item may be available.
    ///
    /// Same contract as [`wait_to_insert`](Self::wait_to_insert), for
    /// `while guard.is_empty()` loops.
    pub fn wait_to_extract(&mut self) {
        self.queue.can_extract.wait(&mut self.ring);
    }

    /// [`wait_to_insert`](Self::wait_to_insert) that gives up after `timeout`.
    ///
    /// Returns `true` if the wait timed out. Callers still re-check
    /// [`is_full`](Self::is_full) either way.
    pub fn wait_to_insert_for(&mut self, timeout: Duration) -> bool {
        self.queue.can_insert.wait_for(&mut self.ring, timeout).timed_out()
    }

    /// [`wait_to_extract`](Self::wait_to_extract) that gives up after `timeout`.
    ///
    /// Returns `true` if the wait timed out.
    pub fn wait_to_extract_for(&mut self, timeout: Duration) -> bool {
        self.queue.can_extract.wait_for(&mut self.ring, timeout).timed_out()
    }

    /// Wake one thread blocked in [`wait_to_insert`](Self::wait_to_insert).
    pub fn notify_insert(&self) {
        self.queue.can_insert.notify_one();
    }

    /// Wake one thread blocked in [`wait_to_extract`](Self::wait_to_extract).
    pub fn notify_extract(&self) {
        self.queue.can_extract.notify_one();
    }
}

impl<T> std::fmt::Debug for QueueGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueGuard")
            .field("capacity", &self.queue.capacity)
            .field("len", &self.ring.len)
            .field("head", &self.ring.head)
            .field("tail", &self.ring.tail)
            .finish()
    }
}
