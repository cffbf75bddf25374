//! # cpumon-sync
//!
//! Synchronization primitives shared by every stage of the cpumon pipeline.
//!
//! ## Architecture
//!
//! - [`queue`] - Fixed-capacity FIFO with blocking insert/extract and explicit
//!   lock/wait/notify primitives
//! - [`stop`] - Cooperative stop tokens that wake blocked queue waiters
//! - [`error`] - Error types for queue construction
//!
//! ## Blocking Model
//!
//! All blocking happens inside [`QueueGuard::wait_to_insert`] or
//! [`QueueGuard::wait_to_extract`], always with the queue lock held and always
//! inside a loop that re-checks both the queue predicate and the caller's
//! [`StopToken`]. [`BoundedQueue::push_blocking`] and
//! [`BoundedQueue::pop_blocking`] package that loop.
//!
//! ## Example
//!
//! ```rust
//! use cpumon_sync::prelude::*;
//! use std::sync::Arc;
//!
//! let queue = Arc::new(BoundedQueue::<u32>::new(2)?);
//! let stop = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);
//!
//! assert!(queue.push_blocking(1, &stop).is_ok());
//! assert_eq!(queue.pop_blocking(&stop), Some(1));
//!
//! stop.request_stop();
//! assert_eq!(queue.pop_blocking(&stop), None);
//! # Ok::<(), QueueError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic
)]
#![warn(missing_docs, missing_debug_implementations, clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod queue;
pub mod stop;

pub mod prelude;

pub use error::{QueueError, QueueResult};
pub use queue::{BoundedQueue, PopOutcome, PushOutcome, QueueGuard};
pub use stop::{StopToken, Wake};
