//! Property-based laws for the clock conversions and the dispatch path.
//!
//! # Laws Tested
//!
//! - `ms_to_jiffies` is monotone non-decreasing in `ms`
//! - `jiffies_to_ms(ms_to_jiffies(ms)) >= ms` (rounding never shortens a
//!   requested delay), at several tick frequencies
//! - Dispatch exactness: a one-shot registered with delay `d` jiffies fires
//!   in exactly the pass for jiffy `d`, neither early nor late, across the
//!   first three wheel levels

use jiffywheel::{TickClock, TimerScheduler};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn conversion_laws_all(a: u64, b: u64) {
    fn check<const HZ: u64>(a: u64, b: u64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        assert!(
            TickClock::<HZ>::ms_to_jiffies(lo) <= TickClock::<HZ>::ms_to_jiffies(hi),
            "ms_to_jiffies not monotone at HZ={HZ} for {lo}..{hi}"
        );
        for ms in [lo, hi] {
            let round_trip = TickClock::<HZ>::jiffies_to_ms(TickClock::<HZ>::ms_to_jiffies(ms));
            assert!(round_trip >= ms, "round trip shortened {ms}ms to {round_trip}ms at HZ={HZ}");
        }
    }
    check::<60>(a, b);
    check::<250>(a, b);
    check::<1000>(a, b);
}

proptest! {
    #[test]
    fn conversions_are_monotone_and_never_shorten(a in 0u64..=10_000_000, b in 0u64..=10_000_000) {
        conversion_laws_all(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // At 1000 Hz a millisecond is a jiffy, so the requested delay doubles as
    // the expected fire jiffy.
    #[test]
    fn one_shot_dispatch_is_exact(delay in 1u64..=4096) {
        let mut scheduler: TimerScheduler = TimerScheduler::new();
        let fired: Rc<RefCell<Vec<u64>>> = Rc::default();

        let log = Rc::clone(&fired);
        scheduler
            .add_delay(delay, 0, 0, Box::new(move |ops, _, _, _| {
                log.borrow_mut().push(ops.jiffies());
            }))
            .unwrap();

        for elapsed in 1..=delay {
            scheduler.tick(1.0);
            if elapsed < delay {
                prop_assert!(fired.borrow().is_empty(), "fired early at jiffy {elapsed}");
            }
        }
        let observed = fired.borrow().clone();
        prop_assert_eq!(observed, vec![delay]);
        prop_assert!(scheduler.is_empty());
    }

    // Repeating timers keep the same exactness across reschedules.
    #[test]
    fn loop_dispatch_is_exact(interval in 1u64..=600, fires in 1u32..=4) {
        let mut scheduler: TimerScheduler = TimerScheduler::new();
        let fired: Rc<RefCell<Vec<u64>>> = Rc::default();

        let log = Rc::clone(&fired);
        scheduler
            .add_loop(interval, 0, jiffywheel::Repeat::Times(fires), 0, 0, Box::new(move |ops, _, _, _| {
                log.borrow_mut().push(ops.jiffies());
            }))
            .unwrap();

        let horizon = interval * u64::from(fires);
        for _ in 0..horizon {
            scheduler.tick(1.0);
        }

        let expected: Vec<u64> = (1..=u64::from(fires)).map(|k| k * interval).collect();
        let observed = fired.borrow().clone();
        prop_assert_eq!(observed, expected);
        prop_assert!(scheduler.is_empty());
    }
}
