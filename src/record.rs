//! Per-timer state: ids, repeat policy, callback type, and the record that
//! lives inside the wheel.
//!
//! A [`TimerRecord`] carries its own doubly-linked-list links plus a
//! back-reference to the bucket it currently occupies, so mutation and
//! cancellation unlink in O(1) instead of scanning a bucket. Records are
//! owned by the pool; the wheel and registry refer to them by pool index.

use core::fmt;

use crate::pool::PoolIndex;
use crate::scheduler::TimerOps;

/// Stable identifier for a registered timer.
///
/// Ids are allocated monotonically starting at 1 and are never reused while
/// the timer is registered.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerId({})", self.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// How many times a repeating timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Fire on every interval until removed.
    Forever,
    /// Fire exactly this many times, then retire. Zero means spent.
    Times(u32),
}

impl Repeat {
    /// Returns true if no fires remain.
    #[must_use]
    pub const fn is_spent(self) -> bool {
        matches!(self, Self::Times(0))
    }

    /// Consumes one fire. Returns true if the timer survives for another.
    pub(crate) fn consume(&mut self) -> bool {
        match self {
            Self::Forever => true,
            Self::Times(n) => {
                *n = n.saturating_sub(1);
                *n > 0
            }
        }
    }
}

/// Callback invoked when a timer expires.
///
/// The callback receives the scheduler through the [`TimerOps`] seam (it may
/// register new timers, mutate existing ones, or remove itself), plus its own
/// id and the two opaque parameter slots installed at registration. The tick
/// entry point is deliberately absent from [`TimerOps`], so a callback cannot
/// re-enter the dispatch loop.
pub type TimerCallback = Box<dyn FnMut(&mut dyn TimerOps, TimerId, u64, u64)>;

/// A timer record as stored in the pool.
///
/// Lifecycle: unscheduled → pending (linked into exactly one bucket) →
/// firing (popped, `bucket == None`, still in the registry) → pending again
/// or retired. `cancelled` marks a lazy removal: the record stays linked
/// until the dispatcher or the cascade next touches its bucket.
pub(crate) struct TimerRecord {
    /// Registry id. Meaningless while the record sits on the free list.
    pub id: TimerId,
    /// Period between repeats, in jiffies. Zero for one-shots.
    pub interval: u64,
    /// Absolute jiffy at which the timer fires next.
    pub expires: u64,
    /// Remaining fires.
    pub repeat: Repeat,
    /// Index of the bucket this record is linked into, if any.
    pub bucket: Option<usize>,
    /// Previous record in the bucket list.
    pub prev: Option<PoolIndex>,
    /// Next record in the bucket list.
    pub next: Option<PoolIndex>,
    /// Lazily cancelled; unlinked and released on next encounter.
    pub cancelled: bool,
    /// `expires` was rewritten by a mutator while the record was firing;
    /// the dispatcher must not recompute it for the re-insert.
    pub retargeted: bool,
    /// The callback, taken out of the record for the duration of a fire.
    pub callback: Option<TimerCallback>,
    /// First opaque parameter slot.
    pub p1: u64,
    /// Second opaque parameter slot.
    pub p2: u64,
}

impl TimerRecord {
    /// A record in its pool-reset state.
    pub(crate) fn unscheduled() -> Self {
        Self {
            id: TimerId::new(0),
            interval: 0,
            expires: 0,
            repeat: Repeat::Forever,
            bucket: None,
            prev: None,
            next: None,
            cancelled: false,
            retargeted: false,
            callback: None,
            p1: 0,
            p2: 0,
        }
    }

    /// Resets the record to its pool defaults, dropping the callback.
    pub(crate) fn reset(&mut self) {
        *self = Self::unscheduled();
    }

    /// A record is runnable if it still has a callback and fires remaining.
    pub(crate) fn is_runnable(&self) -> bool {
        !self.cancelled && self.callback.is_some() && !self.repeat.is_spent()
    }
}

impl fmt::Debug for TimerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRecord")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("expires", &self.expires)
            .field("repeat", &self.repeat)
            .field("bucket", &self.bucket)
            .field("cancelled", &self.cancelled)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_consume_counts_down() {
        let mut repeat = Repeat::Times(2);
        assert!(repeat.consume());
        assert!(!repeat.consume());
        assert!(repeat.is_spent());

        let mut forever = Repeat::Forever;
        for _ in 0..100 {
            assert!(forever.consume());
        }
    }

    #[test]
    fn reset_restores_pool_defaults() {
        let mut record = TimerRecord::unscheduled();
        record.interval = 7;
        record.expires = 99;
        record.repeat = Repeat::Times(3);
        record.cancelled = true;
        record.callback = Some(Box::new(|_, _, _, _| {}));

        record.reset();
        assert_eq!(record.interval, 0);
        assert_eq!(record.expires, 0);
        assert_eq!(record.repeat, Repeat::Forever);
        assert!(!record.cancelled);
        assert!(record.callback.is_none());
        assert!(record.bucket.is_none());
    }
}
