//! # cpumon-watchdog
//!
//! Liveness watchdog for the cpumon sampling pipeline.
//!
//! Each pipeline stage registers a watch, handing the watchdog a clone of its
//! [`StopToken`](cpumon_sync::StopToken), and heartbeats that watch once per
//! iteration. A background monitor thread polls at a fixed interval. While
//! enforcement is enabled, any watch that did not heartbeat since the previous
//! poll is a liveness fault, and a fault stops *every* registered watch, not
//! just the silent one.
//!
//! ## Architecture
//!
//! - [`watchdog`] - Watch registry, monitor loop and configuration
//! - [`error`] - Watchdog-specific error types
//!
//! ## Why polling
//!
//! A single poll point gives one consistent evaluation of all watches, which
//! is what allows a fault to be declared for the whole pipeline at once.
//!
//! ## Example
//!
//! ```rust
//! use cpumon_sync::StopToken;
//! use cpumon_watchdog::prelude::*;
//! use std::time::Duration;
//!
//! let config = WatchdogConfig::builder()
//!     .capacity(1)
//!     .poll_interval(Duration::from_millis(50))
//!     .build()?;
//! let watchdog = Watchdog::start(config)?;
//!
//! let token = StopToken::default();
//! let id = watchdog.register_watch("reader", token.clone())?;
//! watchdog.heartbeat(id)?;
//!
//! watchdog.request_stop();
//! watchdog.join()?;
//! assert!(watchdog.fault().is_none());
//! assert!(!token.is_stop_requested());
//! # Ok::<(), WatchdogError>(())
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
pub mod watchdog;

pub mod prelude;

pub use error::{WatchdogError, WatchdogResult};
pub use watchdog::{
    LivenessFault, WatchId, Watchdog, WatchdogConfig, WatchdogConfigBuilder,
    DEFAULT_CAPACITY, DEFAULT_POLL_INTERVAL,
};
