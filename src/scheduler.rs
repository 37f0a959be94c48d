//! The scheduler: timer registry, public registration/mutation API, and the
//! dispatch loop driven by `tick`.
//!
//! # Driving the scheduler
//!
//! The host calls [`TimerScheduler::tick`] once per frame with the elapsed
//! wall time in milliseconds. The delta is converted to a whole number of
//! owed jiffies; for each owed jiffy the dispatcher advances the counter,
//! executes that jiffy's level-0 slot in FIFO order, and runs the cascade.
//! Expired callbacks run inline on the driver thread, with the counter
//! reading exactly the jiffy they were due in.
//!
//! # Re-entrancy
//!
//! Callbacks receive the scheduler through the [`TimerOps`] trait and may
//! register, mutate, or remove timers, including themselves. New timers
//! land relative to the live, still-advancing jiffy counter, so nothing
//! registered during a tick fires within that same pass over its slot.
//! `tick` itself is deliberately absent from [`TimerOps`], so a callback
//! cannot re-enter the dispatch loop.
//!
//! # Cancellation
//!
//! [`remove`](TimerScheduler::remove) is O(1): it drops the registry entry
//! and marks the record, which stays linked until the dispatcher or cascade
//! next touches its bucket. When the scheduler goes idle the jiffy counter
//! resets to zero; any still-linked cancelled records are swept first so the
//! reset leaves a truly empty wheel.
//!
//! # Example
//!
//! ```
//! use jiffywheel::{TimerScheduler, Repeat};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut scheduler: TimerScheduler = TimerScheduler::new();
//! let fired = Rc::new(Cell::new(0u32));
//!
//! let seen = Rc::clone(&fired);
//! scheduler
//!     .add_delay(5, 0, 0, Box::new(move |_ops, _id, _p1, _p2| {
//!         seen.set(seen.get() + 1);
//!     }))
//!     .unwrap();
//!
//! scheduler.tick(5.0);
//! assert_eq!(fired.get(), 1);
//! ```

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::clock::TickClock;
use crate::error::TimerError;
use crate::pool::{PoolIndex, RecordPool};
use crate::record::{Repeat, TimerCallback, TimerId};
use crate::wheel::{self, Wheel, SLOT_MASK};

/// Behavioural knobs for the dispatch loop.
///
/// # Example
///
/// ```
/// use jiffywheel::SchedulerConfig;
///
/// let config = SchedulerConfig::new().tick_smoothing(true);
/// assert!(config.tick_smoothing);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerConfig {
    /// Halve the owed jiffy budget each tick (`n = (n >> 1) + 1`).
    ///
    /// Under load this amortises catch-up across several frames instead of
    /// bursting every owed jiffy at once. Not required for correctness;
    /// disabled by default.
    pub tick_smoothing: bool,
}

impl SchedulerConfig {
    /// Creates the default configuration (smoothing off).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick smoothing knob.
    #[must_use]
    pub fn tick_smoothing(mut self, enabled: bool) -> Self {
        self.tick_smoothing = enabled;
        self
    }
}

/// The scheduler operations available to a running timer callback.
///
/// This is the full registry-facing surface; everything here may be called
/// from inside a callback, including [`remove`](TimerOps::remove) on the
/// timer currently executing (which suppresses all of its future fires).
pub trait TimerOps {
    /// Registers a one-shot timer firing `delay_ms` from now (rounded up to
    /// whole jiffies). A zero delay fires on the next dispatch pass through
    /// the current slot, never within the registering tick.
    fn add_delay(
        &mut self,
        delay_ms: u64,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError>;

    /// Registers a repeating timer.
    ///
    /// The first fire happens `interval_ms + delay_ms` from now; subsequent
    /// fires every `interval_ms`. `interval_ms` must be non-zero and
    /// `repeat` must not be spent. Deltas beyond the wheel range are clamped
    /// silently.
    fn add_loop(
        &mut self,
        interval_ms: u64,
        delay_ms: u64,
        repeat: Repeat,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError>;

    /// Replaces the interval and resets the phase: the timer next fires
    /// `interval_ms` from now. Returns false for unknown ids or a zero
    /// interval.
    fn modify_interval(&mut self, id: TimerId, interval_ms: u64) -> bool;

    /// Re-arms the timer to fire `interval + delay_ms` from now.
    fn modify_delay(&mut self, id: TimerId, delay_ms: u64) -> bool;

    /// Replaces the remaining fire count in place; no re-bucketing.
    fn modify_loops(&mut self, id: TimerId, repeat: Repeat) -> bool;

    /// Replaces the callback in place; parameters are untouched. When called
    /// from inside the timer's own callback, the replacement takes effect
    /// for the next fire.
    fn modify_callback(&mut self, id: TimerId, callback: TimerCallback) -> bool;

    /// Replaces the two opaque parameter slots in place.
    fn modify_params(&mut self, id: TimerId, p1: u64, p2: u64) -> bool;

    /// Cancels a timer. O(1) and lazy: the record is marked and reclaimed
    /// the next time its bucket is touched. Returns whether the id was
    /// known.
    fn remove(&mut self, id: TimerId) -> bool;

    /// Current jiffy count.
    fn jiffies(&self) -> u64;

    /// Number of live registered timers.
    fn len(&self) -> usize;

    /// True if no timers are registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` is registered and not cancelled.
    fn contains(&self, id: TimerId) -> bool;
}

/// Hierarchical timing-wheel scheduler.
///
/// `HZ` is the tick frequency (jiffies per second), fixed at compile time;
/// the default of 1000 gives millisecond jiffies and a range of roughly 12
/// days. All state is owned by the one logical thread that drives
/// [`tick`](Self::tick); there are no locks and no suspension points.
pub struct TimerScheduler<const HZ: u64 = 1000> {
    clock: TickClock<HZ>,
    wheel: Wheel,
    pool: RecordPool,
    registry: HashMap<TimerId, PoolIndex>,
    next_id: u64,
    config: SchedulerConfig,
}

impl<const HZ: u64> Default for TimerScheduler<HZ> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const HZ: u64> TimerScheduler<HZ> {
    /// Creates a scheduler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with the given configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            clock: TickClock::new(),
            wheel: Wheel::new(),
            pool: RecordPool::new(),
            registry: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advances the scheduler by `delta_ms` milliseconds of wall time,
    /// dispatching every timer that comes due.
    ///
    /// Negative or NaN deltas count as zero. While no timers are registered
    /// the jiffy counter resets to zero instead of advancing, which bounds
    /// the counter across idle periods.
    pub fn tick(&mut self, delta_ms: f32) {
        if self.registry.is_empty() {
            if !self.pool.is_empty() {
                // Only lazily-cancelled records can remain linked here.
                self.wheel.clear();
                self.pool.clear();
            }
            self.clock.reset();
            return;
        }

        let mut owed = TickClock::<HZ>::delta_to_jiffies(delta_ms);
        if self.config.tick_smoothing && owed > 0 {
            owed = (owed >> 1) + 1;
        }
        for _ in 0..owed {
            self.run_jiffy();
        }
    }

    /// Drops every timer and resets the jiffy counter.
    pub fn clear(&mut self) {
        self.wheel.clear();
        self.pool.clear();
        self.registry.clear();
        self.clock.reset();
    }

    /// Current jiffy count.
    #[must_use]
    pub fn jiffies(&self) -> u64 {
        self.clock.now()
    }

    /// Number of live registered timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// True if no timers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// True if `id` is registered and not cancelled.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.registry.contains_key(&id)
    }

    /// See [`TimerOps::add_delay`].
    pub fn add_delay(
        &mut self,
        delay_ms: u64,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        let jiffies = self.clock.now();
        let expires = jiffies.saturating_add(TickClock::<HZ>::ms_to_jiffies(delay_ms));
        self.register(0, expires, Repeat::Times(1), p1, p2, callback)
    }

    /// See [`TimerOps::add_loop`].
    pub fn add_loop(
        &mut self,
        interval_ms: u64,
        delay_ms: u64,
        repeat: Repeat,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        if interval_ms == 0 {
            tracing::warn!("rejecting repeating timer with zero interval");
            return Err(TimerError::InvalidInterval);
        }
        if repeat.is_spent() {
            tracing::warn!("rejecting repeating timer with zero fires");
            return Err(TimerError::InvalidLoops);
        }
        let jiffies = self.clock.now();
        let interval = TickClock::<HZ>::ms_to_jiffies(interval_ms);
        let first = TickClock::<HZ>::ms_to_jiffies(interval_ms.saturating_add(delay_ms));
        let expires = jiffies.saturating_add(first);
        self.register(interval, expires, repeat, p1, p2, callback)
    }

    /// See [`TimerOps::modify_interval`].
    pub fn modify_interval(&mut self, id: TimerId, interval_ms: u64) -> bool {
        if interval_ms == 0 {
            tracing::warn!(timer = %id, "rejecting zero interval");
            return false;
        }
        let Some(handle) = self.lookup(id, "modify_interval") else {
            return false;
        };
        let jiffies = self.clock.now();
        let interval = TickClock::<HZ>::ms_to_jiffies(interval_ms);
        if let Some(record) = self.pool.get_mut(handle) {
            record.interval = interval;
        }
        self.rebucket(handle, jiffies.saturating_add(interval), jiffies);
        true
    }

    /// See [`TimerOps::modify_delay`].
    pub fn modify_delay(&mut self, id: TimerId, delay_ms: u64) -> bool {
        let Some(handle) = self.lookup(id, "modify_delay") else {
            return false;
        };
        let jiffies = self.clock.now();
        let delay = TickClock::<HZ>::ms_to_jiffies(delay_ms);
        let interval = self.pool.get(handle).map_or(0, |record| record.interval);
        let expires = jiffies.saturating_add(interval).saturating_add(delay);
        self.rebucket(handle, expires, jiffies);
        true
    }

    /// See [`TimerOps::modify_loops`].
    pub fn modify_loops(&mut self, id: TimerId, repeat: Repeat) -> bool {
        if repeat.is_spent() {
            tracing::warn!(timer = %id, "rejecting zero fire count");
            return false;
        }
        let Some(handle) = self.lookup(id, "modify_loops") else {
            return false;
        };
        if let Some(record) = self.pool.get_mut(handle) {
            record.repeat = repeat;
        }
        true
    }

    /// See [`TimerOps::modify_callback`].
    pub fn modify_callback(&mut self, id: TimerId, callback: TimerCallback) -> bool {
        let Some(handle) = self.lookup(id, "modify_callback") else {
            return false;
        };
        if let Some(record) = self.pool.get_mut(handle) {
            record.callback = Some(callback);
        }
        true
    }

    /// See [`TimerOps::modify_params`].
    pub fn modify_params(&mut self, id: TimerId, p1: u64, p2: u64) -> bool {
        let Some(handle) = self.lookup(id, "modify_params") else {
            return false;
        };
        if let Some(record) = self.pool.get_mut(handle) {
            record.p1 = p1;
            record.p2 = p2;
        }
        true
    }

    /// See [`TimerOps::remove`].
    pub fn remove(&mut self, id: TimerId) -> bool {
        let Some(handle) = self.registry.remove(&id) else {
            return false;
        };
        if let Some(record) = self.pool.get_mut(handle) {
            record.cancelled = true;
        }
        true
    }

    fn register(
        &mut self,
        interval: u64,
        expires: u64,
        repeat: Repeat,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        let id = TimerId::new(self.next_id);
        self.next_id += 1;
        let jiffies = self.clock.now();

        let handle = self.pool.acquire();
        {
            let record = self.pool.get_mut(handle).expect("freshly acquired record");
            record.id = id;
            record.interval = interval;
            record.expires = expires;
            record.repeat = repeat;
            record.p1 = p1;
            record.p2 = p2;
            record.callback = Some(callback);
        }

        match self.registry.entry(id) {
            Entry::Occupied(_) => {
                self.pool.release(handle);
                tracing::warn!(timer = %id, "id collision on registration");
                return Err(TimerError::IdCollision { id });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
            }
        }

        self.link(handle, expires, jiffies);
        Ok(id)
    }

    fn lookup(&self, id: TimerId, operation: &'static str) -> Option<PoolIndex> {
        let handle = self.registry.get(&id).copied();
        if handle.is_none() {
            tracing::warn!(timer = %id, operation, "mutating unknown timer id");
        }
        handle
    }

    /// Inserts an unlinked record into the bucket for `expires`.
    fn link(&mut self, handle: PoolIndex, expires: u64, jiffies: u64) {
        let (bucket, stored) = wheel::slot_for(expires, jiffies);
        if let Some(record) = self.pool.get_mut(handle) {
            record.expires = stored;
        }
        self.wheel.push_back(bucket, handle, &mut self.pool);
    }

    /// Moves a record to the bucket for its new expiry. A record that is
    /// mid-fire stays unlinked; the dispatcher honours the rewritten expiry
    /// when it re-inserts.
    fn rebucket(&mut self, handle: PoolIndex, expires: u64, jiffies: u64) {
        let linked = {
            let Some(record) = self.pool.get_mut(handle) else {
                return;
            };
            record.expires = expires;
            if record.bucket.is_some() {
                true
            } else {
                record.retargeted = true;
                false
            }
        };
        if linked {
            self.wheel.unlink(handle, &mut self.pool);
            self.link(handle, expires, jiffies);
        }
    }

    /// One dispatch pass: advance the jiffy counter, execute that jiffy's
    /// level-0 slot, then cascade.
    fn run_jiffy(&mut self) {
        self.clock.advance(1);
        let jiffies = self.clock.now();
        let slot = (jiffies & SLOT_MASK) as usize;

        // Bound the drain by the length at pass start; timers that land in
        // this slot during the pass wait for its next turn.
        let due = self.wheel.bucket_len(slot);
        for _ in 0..due {
            match self.wheel.pop_front(slot, &mut self.pool) {
                Some(handle) => self.fire(handle),
                None => break,
            }
        }

        self.wheel.cascade(jiffies, &mut self.pool);
    }

    /// Executes one popped record: validity check, callback, reschedule or
    /// retire.
    fn fire(&mut self, handle: PoolIndex) {
        let prepared = match self.pool.get_mut(handle) {
            None => return,
            Some(record) if !record.is_runnable() => None,
            Some(record) => record
                .callback
                .take()
                .map(|callback| (record.id, record.p1, record.p2, callback)),
        };
        let Some((id, p1, p2, mut callback)) = prepared else {
            self.retire(handle);
            return;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| callback(&mut *self, id, p1, p2)));
        if let Err(payload) = outcome {
            tracing::error!(
                timer = %id,
                panic = panic_message(payload.as_ref()),
                "timer callback panicked; retiring timer"
            );
            self.retire(handle);
            return;
        }

        self.finish_fire(handle, callback);
    }

    /// Post-callback bookkeeping: restore the callback unless it was
    /// replaced mid-fire, consume one repeat, then re-insert or retire.
    fn finish_fire(&mut self, handle: PoolIndex, callback: TimerCallback) {
        let jiffies = self.clock.now();
        let next_expiry = {
            let Some(record) = self.pool.get_mut(handle) else {
                return;
            };
            if record.callback.is_none() {
                record.callback = Some(callback);
            }
            if record.cancelled {
                None
            } else if record.repeat.consume() {
                if !record.retargeted {
                    record.expires = jiffies.saturating_add(record.interval);
                }
                record.retargeted = false;
                Some(record.expires)
            } else {
                None
            }
        };
        match next_expiry {
            Some(expires) => self.link(handle, expires, jiffies),
            None => self.retire(handle),
        }
    }

    /// Unregisters and releases a record along every exit path.
    fn retire(&mut self, handle: PoolIndex) {
        let Some(record) = self.pool.get(handle) else {
            return;
        };
        let id = record.id;
        if record.bucket.is_some() {
            self.wheel.unlink(handle, &mut self.pool);
        }
        self.registry.remove(&id);
        self.pool.release(handle);
    }
}

impl<const HZ: u64> TimerOps for TimerScheduler<HZ> {
    fn add_delay(
        &mut self,
        delay_ms: u64,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        Self::add_delay(self, delay_ms, p1, p2, callback)
    }

    fn add_loop(
        &mut self,
        interval_ms: u64,
        delay_ms: u64,
        repeat: Repeat,
        p1: u64,
        p2: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        Self::add_loop(self, interval_ms, delay_ms, repeat, p1, p2, callback)
    }

    fn modify_interval(&mut self, id: TimerId, interval_ms: u64) -> bool {
        Self::modify_interval(self, id, interval_ms)
    }

    fn modify_delay(&mut self, id: TimerId, delay_ms: u64) -> bool {
        Self::modify_delay(self, id, delay_ms)
    }

    fn modify_loops(&mut self, id: TimerId, repeat: Repeat) -> bool {
        Self::modify_loops(self, id, repeat)
    }

    fn modify_callback(&mut self, id: TimerId, callback: TimerCallback) -> bool {
        Self::modify_callback(self, id, callback)
    }

    fn modify_params(&mut self, id: TimerId, p1: u64, p2: u64) -> bool {
        Self::modify_params(self, id, p1, p2)
    }

    fn remove(&mut self, id: TimerId) -> bool {
        Self::remove(self, id)
    }

    fn jiffies(&self) -> u64 {
        Self::jiffies(self)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn contains(&self, id: TimerId) -> bool {
        Self::contains(self, id)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
