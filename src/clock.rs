//! Tick clock: the scheduler's monotonic jiffy counter and unit conversions.
//!
//! A *jiffy* is the scheduler's internal time unit. The tick frequency `HZ`
//! (jiffies per second) is a compile-time parameter, so one jiffy spans
//! `1000 / HZ` milliseconds. All public durations are expressed in
//! milliseconds and rounded **up** to whole jiffies on entry; the ceiling
//! guarantees that a requested delay never fires early due to rounding.
//!
//! The counter only moves when the driver advances it, which is what makes
//! time-dependent behaviour deterministic under test.
//!
//! # Example
//!
//! ```
//! use jiffywheel::clock::TickClock;
//!
//! let mut clock: TickClock<1000> = TickClock::new();
//! assert_eq!(clock.now(), 0);
//!
//! clock.advance(5);
//! assert_eq!(clock.now(), 5);
//!
//! assert_eq!(TickClock::<250>::ms_to_jiffies(10), 3); // 4ms jiffies, rounded up
//! ```

/// Monotonic jiffy counter parameterised by the tick frequency.
///
/// `HZ` is the number of jiffies per second and must lie in `1..=1000`
/// (a jiffy is never shorter than a millisecond, the public time unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickClock<const HZ: u64> {
    jiffies: u64,
}

impl<const HZ: u64> TickClock<HZ> {
    const HZ_VALID: () = assert!(HZ >= 1 && HZ <= 1000, "HZ must lie in 1..=1000");

    /// Creates a clock starting at jiffy zero.
    #[must_use]
    pub const fn new() -> Self {
        let _hz_checked: () = Self::HZ_VALID;
        Self { jiffies: 0 }
    }

    /// Returns the current jiffy count.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.jiffies
    }

    /// Advances the counter by `n` jiffies, saturating on overflow.
    pub fn advance(&mut self, n: u64) {
        self.jiffies = self.jiffies.saturating_add(n);
    }

    /// Resets the counter to zero.
    ///
    /// Only sound while no timers are registered; the scheduler uses this to
    /// bound the counter across idle periods.
    pub fn reset(&mut self) {
        self.jiffies = 0;
    }

    /// Converts milliseconds to jiffies, rounding up.
    #[must_use]
    pub const fn ms_to_jiffies(ms: u64) -> u64 {
        let scaled = ms.saturating_mul(HZ);
        scaled / 1000 + (scaled % 1000 != 0) as u64
    }

    /// Converts jiffies to milliseconds, rounding up.
    ///
    /// The ceiling keeps the round-trip law
    /// `jiffies_to_ms(ms_to_jiffies(ms)) >= ms` intact for every `HZ`.
    #[must_use]
    pub const fn jiffies_to_ms(jiffies: u64) -> u64 {
        let scaled = jiffies.saturating_mul(1000);
        scaled / HZ + (scaled % HZ != 0) as u64
    }

    /// Converts a raw frame delta in fractional milliseconds to a whole
    /// number of owed jiffies, truncating.
    ///
    /// Negative, NaN, and infinite deltas are treated as zero elapsed time.
    #[must_use]
    pub fn delta_to_jiffies(delta_ms: f32) -> u64 {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return 0;
        }
        let owed = f64::from(delta_ms) * (HZ as f64) / 1000.0;
        owed.floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn clock_starts_at_zero_and_advances() {
        init_test("clock_starts_at_zero_and_advances");
        let mut clock: TickClock<1000> = TickClock::new();
        crate::assert_with_log!(clock.now() == 0, "starts at zero", 0, clock.now());

        clock.advance(3);
        clock.advance(4);
        crate::assert_with_log!(clock.now() == 7, "advances", 7, clock.now());

        clock.reset();
        crate::assert_with_log!(clock.now() == 0, "resets", 0, clock.now());
        crate::test_complete!("clock_starts_at_zero_and_advances");
    }

    #[test]
    fn ms_to_jiffies_rounds_up() {
        init_test("ms_to_jiffies_rounds_up");
        // 1000 Hz: one jiffy per millisecond.
        assert_eq!(TickClock::<1000>::ms_to_jiffies(0), 0);
        assert_eq!(TickClock::<1000>::ms_to_jiffies(1), 1);
        assert_eq!(TickClock::<1000>::ms_to_jiffies(250), 250);

        // 250 Hz: 4ms jiffies.
        assert_eq!(TickClock::<250>::ms_to_jiffies(1), 1);
        assert_eq!(TickClock::<250>::ms_to_jiffies(4), 1);
        assert_eq!(TickClock::<250>::ms_to_jiffies(5), 2);

        // 60 Hz: ~16.67ms jiffies.
        assert_eq!(TickClock::<60>::ms_to_jiffies(1), 1);
        assert_eq!(TickClock::<60>::ms_to_jiffies(16), 1);
        assert_eq!(TickClock::<60>::ms_to_jiffies(17), 2);
        crate::test_complete!("ms_to_jiffies_rounds_up");
    }

    #[test]
    fn round_trip_never_shortens() {
        init_test("round_trip_never_shortens");
        for ms in [0u64, 1, 3, 16, 17, 999, 1000, 1001, 86_400_000] {
            let j = TickClock::<60>::ms_to_jiffies(ms);
            let back = TickClock::<60>::jiffies_to_ms(j);
            crate::assert_with_log!(back >= ms, "round trip is no shorter", ms, back);
        }
        crate::test_complete!("round_trip_never_shortens");
    }

    #[test]
    fn delta_to_jiffies_handles_garbage() {
        init_test("delta_to_jiffies_handles_garbage");
        assert_eq!(TickClock::<1000>::delta_to_jiffies(5.0), 5);
        assert_eq!(TickClock::<1000>::delta_to_jiffies(4.9), 4);
        assert_eq!(TickClock::<1000>::delta_to_jiffies(0.0), 0);
        assert_eq!(TickClock::<1000>::delta_to_jiffies(-3.0), 0);
        assert_eq!(TickClock::<1000>::delta_to_jiffies(f32::NAN), 0);
        assert_eq!(TickClock::<1000>::delta_to_jiffies(f32::INFINITY), 0);
        assert_eq!(TickClock::<60>::delta_to_jiffies(16.67), 1);
        crate::test_complete!("delta_to_jiffies_handles_garbage");
    }
}
