//! Prelude for cpumon-sync.
//!
//! ```rust
//! use cpumon_sync::prelude::*;
//!
//! let queue: BoundedQueue<u8> = BoundedQueue::new(4)?;
//! assert!(queue.lock().is_empty());
//! # Ok::<(), QueueError>(())
//! ```

pub use crate::error::{QueueError, QueueResult};
pub use crate::queue::{BoundedQueue, PopOutcome, PushOutcome, QueueGuard};
pub use crate::stop::{StopToken, Wake};
