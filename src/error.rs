//! Error types for timer registration.
//!
//! The scheduler follows a report-and-continue model: bad arguments and
//! unknown ids on the mutator surface are logged and answered with `false`,
//! never a panic. Only registration returns a typed error, because the
//! caller needs to know that no timer id was allocated.

use crate::record::TimerId;

/// Error returned when a timer registration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// A repeating timer was requested with a zero interval.
    #[error("repeating timers require a non-zero interval")]
    InvalidInterval,

    /// A repeat count of zero fires never and is rejected.
    #[error("repeat count must be at least 1 (or Forever)")]
    InvalidLoops,

    /// The freshly allocated id was already registered.
    ///
    /// Ids are allocated monotonically, so this indicates internal state
    /// corruption; the acquired record is released before reporting.
    #[error("timer id {id} is already registered")]
    IdCollision {
        /// The colliding id.
        id: TimerId,
    },
}
