//! Jiffywheel: a hierarchical timing-wheel scheduler for in-process,
//! coarse-grained timers.
//!
//! # Overview
//!
//! Client code registers one-shot and repeating callbacks with
//! millisecond-scale delays; an external driver advances the scheduler by
//! feeding it elapsed wall time, and the scheduler dispatches expired
//! callbacks in increasing expiry order. Time is counted in *jiffies*
//! (`1000 / HZ` milliseconds each, `HZ` fixed at compile time), and timers
//! live in a nine-level cascading wheel: a compact bitwise index scheme
//! gives O(1) amortised insert and expiry across expiry horizons from one
//! tick to several days, for populations from a handful of timers to about
//! a million.
//!
//! # Core Guarantees
//!
//! - **Never early**: delays round up to whole jiffies, and a timer is
//!   dispatched no sooner than its requested delay has elapsed
//! - **Exact jiffy dispatch**: a timer due at jiffy `k` runs in the pass
//!   for jiffy `k`, before anything due at `k + 1`
//! - **O(1) everything on the hot path**: insert, cancel, and per-jiffy
//!   advance are constant-time; cancellation is lazy and never scans
//! - **Isolated callbacks**: a panicking callback is retired and logged;
//!   the rest of the bucket and all future ticks keep running
//! - **Single-threaded by design**: one logical thread owns all state; no
//!   locks, no suspension points
//!
//! # Module Structure
//!
//! - [`clock`]: jiffy counter and millisecond conversions
//! - [`record`]: timer ids, repeat policy, callback type
//! - [`wheel`]: wheel geometry constants
//! - [`scheduler`]: the scheduler, its configuration, and the callback seam
//! - [`error`]: registration error type
//! - [`test_utils`]: logging init and assertion macros for tests
//!
//! # Example
//!
//! ```
//! use jiffywheel::{Repeat, TimerScheduler};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut scheduler: TimerScheduler = TimerScheduler::new();
//! let fired: Rc<RefCell<Vec<u64>>> = Rc::default();
//!
//! let log = Rc::clone(&fired);
//! scheduler
//!     .add_loop(3, 0, Repeat::Times(4), 0, 0, Box::new(move |ops, _id, _p1, _p2| {
//!         log.borrow_mut().push(ops.jiffies());
//!     }))
//!     .unwrap();
//!
//! for _ in 0..13 {
//!     scheduler.tick(1.0); // one millisecond per frame at the default 1000 Hz
//! }
//! assert_eq!(*fired.borrow(), vec![3, 6, 9, 12]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod clock;
pub mod error;
mod pool;
pub mod record;
pub mod scheduler;
pub mod test_utils;
pub mod wheel;

// Re-exports for convenient access to the core types
pub use clock::TickClock;
pub use error::TimerError;
pub use record::{Repeat, TimerCallback, TimerId};
pub use scheduler::{SchedulerConfig, TimerOps, TimerScheduler};
