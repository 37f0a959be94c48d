//! Timer wheel benchmarks for jiffywheel.
//!
//! These benchmarks measure performance of the cascading timing wheel:
//! - Timer insertion into each level (O(1) expected)
//! - Timer cancellation (O(1) expected)
//! - Tick/advance (O(expired) expected)
//! - Large-scale scenarios (10K timers)
//!
//! Performance targets:
//! - Insert: < 150ns per timer
//! - Cancel: < 50ns per timer
//! - Tick (no expiry): < 50ns per jiffy

#![allow(missing_docs)]
#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use jiffywheel::{Repeat, TimerCallback, TimerScheduler};

fn noop() -> TimerCallback {
    Box::new(|_, _, _, _| {})
}

// =============================================================================
// INSERTION BENCHMARKS
// =============================================================================

fn bench_timer_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_wheel/insert");

    // Insert into different levels (delays in ms at the default 1000 Hz).
    for (name, delay_ms) in [
        ("level0_10ms", 10u64),
        ("level1_100ms", 100),
        ("level2_1s", 1_000),
        ("level4_1min", 60_000),
        ("level6_1h", 3_600_000),
        ("level8_1d", 86_400_000),
        ("clamped_30d", 30 * 86_400_000),
    ] {
        group.bench_function(name, |b| {
            let mut scheduler: TimerScheduler = TimerScheduler::new();
            b.iter(|| {
                let id = scheduler.add_delay(delay_ms, 0, 0, noop()).unwrap();
                black_box(id);
            });
        });
    }

    group.finish();
}

// =============================================================================
// CANCELLATION BENCHMARKS
// =============================================================================

fn bench_timer_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_wheel/cancel");

    group.bench_function("single", |b| {
        b.iter_custom(|iters| {
            let mut scheduler: TimerScheduler = TimerScheduler::new();
            let ids: Vec<_> = (0..iters)
                .map(|i| scheduler.add_delay(100 + i, 0, 0, noop()).unwrap())
                .collect();

            let start = std::time::Instant::now();
            for id in ids {
                black_box(scheduler.remove(id));
            }
            start.elapsed()
        });
    });

    // Removing an unknown id is just a map lookup.
    group.bench_function("already_removed", |b| {
        let mut scheduler: TimerScheduler = TimerScheduler::new();
        let keep = scheduler.add_delay(1_000_000, 0, 0, noop()).unwrap();
        let id = scheduler.add_delay(100, 0, 0, noop()).unwrap();
        scheduler.remove(id);
        let _ = keep;

        b.iter(|| {
            black_box(scheduler.remove(id));
        });
    });

    group.finish();
}

// =============================================================================
// TICK/EXPIRY BENCHMARKS
// =============================================================================

fn bench_timer_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_wheel/tick");

    // Single-jiffy tick with timers present but none expiring.
    group.bench_function("no_expiry_100_timers", |b| {
        let mut scheduler: TimerScheduler = TimerScheduler::new();
        for _ in 0..100 {
            scheduler.add_loop(3_600_000, 0, Repeat::Forever, 0, 0, noop()).unwrap();
        }
        b.iter(|| {
            scheduler.tick(1.0);
            black_box(scheduler.jiffies());
        });
    });

    group.bench_function("single_expiry", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;
            for _ in 0..iters {
                let mut scheduler: TimerScheduler = TimerScheduler::new();
                scheduler.add_delay(1, 0, 0, noop()).unwrap();

                let start = std::time::Instant::now();
                scheduler.tick(1.0);
                total += start.elapsed();
            }
            total
        });
    });

    // One large catch-up tick that crosses several cascade boundaries.
    group.bench_function("large_jump_1min", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;
            for _ in 0..iters {
                let mut scheduler: TimerScheduler = TimerScheduler::new();
                scheduler.add_delay(60_000, 0, 0, noop()).unwrap();

                let start = std::time::Instant::now();
                scheduler.tick(60_000.0);
                total += start.elapsed();
            }
            total
        });
    });

    group.finish();
}

// =============================================================================
// THROUGHPUT BENCHMARKS
// =============================================================================

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_wheel/throughput");

    for &size in &[1_000usize, 10_000usize] {
        let size_u64 = u64::try_from(size).expect("size fits u64");
        group.throughput(Throughput::Elements(size_u64));

        group.bench_with_input(BenchmarkId::new("insert", size), &size, |b, _| {
            b.iter(|| {
                let mut scheduler: TimerScheduler = TimerScheduler::new();
                for i in 0..size_u64 {
                    scheduler.add_delay(i + 1, 0, 0, noop()).unwrap();
                }
                black_box(scheduler.len());
            });
        });

        group.bench_with_input(BenchmarkId::new("drain", size), &size, |b, _| {
            b.iter_custom(|iters| {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let mut scheduler: TimerScheduler = TimerScheduler::new();
                    for i in 0..size_u64 {
                        scheduler.add_delay(i + 1, 0, 0, noop()).unwrap();
                    }

                    let start = std::time::Instant::now();
                    scheduler.tick(size as f32);
                    total += start.elapsed();
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_timer_insert,
    bench_timer_cancel,
    bench_timer_tick,
    bench_throughput
);
criterion_main!(benches);
