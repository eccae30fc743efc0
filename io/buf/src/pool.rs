//! Process-wide recycling of segments.
//!
//! The pool is the only global state in this crate. It is purely an
//! allocation cache: its contents carry no data and are safe to discard at
//! any time. Contention is expected to be light, so a single mutex-guarded
//! free list suffices.

use metriken::{metric, Counter};
use parking_lot::Mutex;

use crate::segment::Segment;

/// Maximum bytes retained by the pool. Segments recycled beyond this cap
/// are dropped.
pub const MAX_POOL_BYTES: usize = 64 * Segment::SIZE;

#[metric(
    name = "segment_allocate",
    description = "Segments allocated from the system"
)]
pub static SEGMENT_ALLOCATE: Counter = Counter::new();

#[metric(
    name = "segment_pool_hit",
    description = "Segments served from the free list"
)]
pub static SEGMENT_POOL_HIT: Counter = Counter::new();

#[metric(
    name = "segment_recycle",
    description = "Segments returned to the free list"
)]
pub static SEGMENT_RECYCLE: Counter = Counter::new();

#[metric(
    name = "segment_drop",
    description = "Segments dropped because the pool was full"
)]
pub static SEGMENT_DROP: Counter = Counter::new();

static FREE_LIST: Mutex<Vec<Segment>> = Mutex::new(Vec::new());

/// Takes a segment from the pool, allocating a fresh one if the pool is
/// empty. The returned segment is detached and empty (`pos == limit == 0`).
pub(crate) fn take() -> Segment {
    let recycled = FREE_LIST.lock().pop();
    match recycled {
        Some(mut segment) => {
            segment.reset();
            SEGMENT_POOL_HIT.increment();
            segment
        }
        None => {
            SEGMENT_ALLOCATE.increment();
            Segment::new()
        }
    }
}

/// Returns a segment to the pool, or drops it if the pool is at capacity.
pub(crate) fn recycle(segment: Segment) {
    let mut free_list = FREE_LIST.lock();
    if (free_list.len() + 1) * Segment::SIZE > MAX_POOL_BYTES {
        drop(free_list);
        SEGMENT_DROP.increment();
        return;
    }
    free_list.push(segment);
    drop(free_list);
    SEGMENT_RECYCLE.increment();
}

/// Returns the number of bytes currently held by the pool.
pub fn pooled_bytes() -> usize {
    FREE_LIST.lock().len() * Segment::SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_empty_segment() {
        let segment = take();
        assert_eq!(segment.readable(), 0);
        assert_eq!(segment.writable(), Segment::SIZE);
        recycle(segment);
    }

    #[test]
    fn recycled_segment_is_reset_on_take() {
        let mut segment = take();
        segment.spare_mut()[..4].copy_from_slice(b"data");
        segment.commit(4);
        segment.consume(2);
        recycle(segment);

        // Whatever segment comes back next must be empty.
        let segment = take();
        assert_eq!(segment.readable(), 0);
        assert_eq!(segment.writable(), Segment::SIZE);
        recycle(segment);
    }

    #[test]
    fn pool_never_exceeds_cap() {
        // Push more segments than the pool can hold; the excess is dropped.
        let segments: Vec<Segment> = (0..(MAX_POOL_BYTES / Segment::SIZE + 8))
            .map(|_| Segment::new())
            .collect();
        for segment in segments {
            recycle(segment);
        }
        assert!(pooled_bytes() <= MAX_POOL_BYTES);
    }
}
