//! The cascading multi-level wheel: bucket layout, index derivation, and the
//! shift that moves timers from coarse levels down to fine ones.
//!
//! # Geometry
//!
//! Nine levels of 64 buckets each, every level 8× coarser than the one
//! below. Level `L` has bucket granularity `8^L` jiffies and covers expiry
//! deltas in `[64·8^(L−1), 64·8^L)`, with level 0 covering `[0, 64)`. The
//! flat array therefore holds `9 × 64 = 576` buckets, sized once and never
//! reallocated.
//!
//! # Index derivation
//!
//! A delta selects the first level whose span contains it. Within level `L`,
//! the bucket is `((expires − level_start(L)) >> (L·SHIFT)) & 63`: the right
//! shift discards the low bits the finer levels will absorb, and the
//! subtraction of `level_start(L)` accounts for the range those finer levels
//! already cover. Level 0 subtracts nothing, so its slot is simply
//! `expires & 63`.
//!
//! # Cascade
//!
//! Once per jiffy, after the level-0 slot has been executed, every level
//! whose granularity divides the current jiffy drains the bucket at its
//! cyclic position `((jiffies − 1) >> L·SHIFT) & 63`, coarsest level first,
//! and re-inserts each timer through the normal index derivation. Because
//! `jiffies` has advanced since insertion, every drained timer lands exactly
//! one level finer, so nothing is shifted twice in one pass and a timer
//! always reaches level 0 no later than the jiffy it expires in.

use crate::pool::{PoolIndex, RecordPool};

/// Number of wheel levels.
pub const DEPTH: usize = 9;

/// log2 of the per-level bucket count.
pub const LEVEL_BITS: u32 = 6;

/// Buckets per level.
pub const SLOTS_PER_LEVEL: usize = 1 << LEVEL_BITS;

/// Mask extracting the in-level slot from a jiffy value.
pub const SLOT_MASK: u64 = SLOTS_PER_LEVEL as u64 - 1;

/// log2 of the coarsening factor between adjacent levels.
pub const LEVEL_SHIFT: u32 = 3;

/// Total bucket count across all levels.
pub const WHEEL_BUCKETS: usize = DEPTH * SLOTS_PER_LEVEL;

/// Largest representable expiry delta, exclusive.
pub const CUTOFF: u64 = ((SLOTS_PER_LEVEL as u64) << ((DEPTH as u32 - 1) * LEVEL_SHIFT)) - 1;

/// Bucket granularity of the coarsest level, in jiffies.
pub const LAST_GRANULARITY: u64 = 1 << ((DEPTH as u32 - 1) * LEVEL_SHIFT);

/// Deltas at or beyond [`CUTOFF`] are clamped to this value.
pub const MAX_DELTA: u64 = CUTOFF - LAST_GRANULARITY;

/// First delta covered by `level`, i.e. the span of all finer levels.
const fn level_start(level: usize) -> u64 {
    if level == 0 {
        0
    } else {
        (SLOTS_PER_LEVEL as u64) << ((level as u32 - 1) * LEVEL_SHIFT)
    }
}

/// Derives the flat bucket index for `expires` as seen from `jiffies`.
///
/// Returns the index and the expiry actually stored, which differs from the
/// request only when the delta was clamped to [`MAX_DELTA`]. An expiry at or
/// before `jiffies` is due now and maps to the slot of the next dispatch
/// pass: it fires one jiffy from now, never inside the pass that is already
/// running.
pub(crate) fn slot_for(expires: u64, jiffies: u64) -> (usize, u64) {
    if expires <= jiffies {
        return ((jiffies.wrapping_add(1) & SLOT_MASK) as usize, expires);
    }

    let mut expires = expires;
    let mut delta = expires - jiffies;
    if delta >= CUTOFF {
        expires = jiffies.saturating_add(MAX_DELTA);
        delta = MAX_DELTA;
    }

    let mut level = DEPTH - 1;
    for candidate in 0..DEPTH {
        if delta < level_start(candidate + 1) {
            level = candidate;
            break;
        }
    }

    let shift = level as u32 * LEVEL_SHIFT;
    let slot = ((expires - level_start(level)) >> shift) & SLOT_MASK;
    (level * SLOTS_PER_LEVEL + slot as usize, expires)
}

/// One bucket: a doubly-linked FIFO of pooled records.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    head: Option<PoolIndex>,
    tail: Option<PoolIndex>,
    len: usize,
}

impl Bucket {
    const EMPTY: Self = Self {
        head: None,
        tail: None,
        len: 0,
    };
}

/// The flat bucket array with intrusive-list plumbing.
///
/// All link fields live in the records themselves; the wheel only stores the
/// list heads and tails, so append, removal of a known node, and head pop
/// are all O(1).
#[derive(Debug)]
pub(crate) struct Wheel {
    buckets: Vec<Bucket>,
}

impl Wheel {
    pub(crate) fn new() -> Self {
        Self {
            buckets: vec![Bucket::EMPTY; WHEEL_BUCKETS],
        }
    }

    /// Number of records in `bucket` right now.
    pub(crate) fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets[bucket].len
    }

    /// Total number of linked records across all buckets.
    #[cfg(test)]
    pub(crate) fn linked_len(&self) -> usize {
        self.buckets.iter().map(|b| b.len).sum()
    }

    /// Appends a record to the tail of `bucket`, recording the back-pointer.
    pub(crate) fn push_back(&mut self, bucket: usize, handle: PoolIndex, pool: &mut RecordPool) {
        let tail = self.buckets[bucket].tail;
        {
            let record = pool.get_mut(handle).expect("pushed a stale record");
            debug_assert!(record.bucket.is_none(), "record is already linked");
            record.bucket = Some(bucket);
            record.prev = tail;
            record.next = None;
        }
        match tail {
            Some(prev) => pool.get_mut(prev).expect("bucket tail is stale").next = Some(handle),
            None => self.buckets[bucket].head = Some(handle),
        }
        self.buckets[bucket].tail = Some(handle);
        self.buckets[bucket].len += 1;
    }

    /// Pops the head of `bucket`, fully unlinking it.
    pub(crate) fn pop_front(&mut self, bucket: usize, pool: &mut RecordPool) -> Option<PoolIndex> {
        let head = self.buckets[bucket].head?;
        self.detach(bucket, head, pool);
        Some(head)
    }

    /// Unlinks a record from whichever bucket it occupies, via its
    /// back-pointer. Returns false if the record is not linked.
    pub(crate) fn unlink(&mut self, handle: PoolIndex, pool: &mut RecordPool) -> bool {
        let Some(bucket) = pool.get(handle).and_then(|record| record.bucket) else {
            return false;
        };
        self.detach(bucket, handle, pool);
        true
    }

    fn detach(&mut self, bucket: usize, handle: PoolIndex, pool: &mut RecordPool) {
        let (prev, next) = {
            let record = pool.get(handle).expect("detached a stale record");
            (record.prev, record.next)
        };
        match prev {
            Some(prev) => pool.get_mut(prev).expect("bucket link is stale").next = next,
            None => self.buckets[bucket].head = next,
        }
        match next {
            Some(next) => pool.get_mut(next).expect("bucket link is stale").prev = prev,
            None => self.buckets[bucket].tail = prev,
        }
        let record = pool.get_mut(handle).expect("detached a stale record");
        record.prev = None;
        record.next = None;
        record.bucket = None;
        self.buckets[bucket].len -= 1;
    }

    /// Shifts coarse-level buckets down after the level-0 slot for `jiffies`
    /// has been executed.
    ///
    /// Levels run `DEPTH−1` down to 1; level 0 is the dispatch target and is
    /// never cascaded. Each drain is bounded by the bucket length at drain
    /// start. Cancelled records found here are released instead of moved.
    pub(crate) fn cascade(&mut self, jiffies: u64, pool: &mut RecordPool) {
        // Level 1 has the finest cascade period; if it does not divide the
        // current jiffy, no level does.
        if jiffies == 0 || jiffies & ((1 << LEVEL_SHIFT) - 1) != 0 {
            return;
        }

        for level in (1..DEPTH).rev() {
            let shift = level as u32 * LEVEL_SHIFT;
            if jiffies & ((1u64 << shift) - 1) != 0 {
                continue;
            }
            let slot = (((jiffies - 1) >> shift) & SLOT_MASK) as usize;
            let bucket = level * SLOTS_PER_LEVEL + slot;

            let budget = self.buckets[bucket].len;
            for _ in 0..budget {
                let Some(handle) = self.pop_front(bucket, pool) else {
                    break;
                };
                let Some(record) = pool.get(handle) else {
                    continue;
                };
                if record.cancelled {
                    pool.release(handle);
                    continue;
                }
                let (target, expires) = slot_for(record.expires, jiffies);
                if let Some(record) = pool.get_mut(handle) {
                    record.expires = expires;
                }
                self.push_back(target, handle, pool);
            }
        }
    }

    /// Empties every bucket without touching the records.
    ///
    /// Callers are responsible for releasing the records; this only resets
    /// the list heads.
    pub(crate) fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::EMPTY;
        }
    }
}
