//! Bounded, non-blocking free-list of pre-built items.
//!
//! The runner keeps every [`LogMessage`](crate::LogMessage) it will ever hand
//! out in an [`ObjectPool`]. Acquiring never blocks and never allocates: an
//! empty pool simply yields `None`.
//!
//! The item count is tracked with a relaxed atomic next to the lock-free
//! queue. Two concurrent releases may both observe `count < capacity` and
//! both push, so the pool can briefly hold a few more items than its
//! capacity. The overshoot is bounded by the number of racing releasers.

use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity pool of reusable items.
///
/// # Examples
///
/// ```
/// # use segment_logger::ObjectPool;
/// let pool = ObjectPool::new(2, || Vec::<u8>::with_capacity(64));
///
/// let a = pool.try_acquire().unwrap();
/// let b = pool.try_acquire().unwrap();
/// assert!(pool.try_acquire().is_none());
///
/// pool.release(a);
/// pool.release(b);
/// assert_eq!(pool.count(), 2);
/// ```
#[derive(Debug)]
pub struct ObjectPool<T> {
    items: SegQueue<T>,
    count: AtomicUsize,
    capacity: AtomicUsize,
}

impl<T> ObjectPool<T> {
    /// Creates a pool holding `capacity` items built by `factory`.
    pub fn new(capacity: usize, mut factory: impl FnMut() -> T) -> Self {
        let items = SegQueue::new();
        for _ in 0..capacity {
            items.push(factory());
        }

        Self {
            items,
            count: AtomicUsize::new(capacity),
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Takes an item out of the pool, or returns `None` if it is empty.
    #[inline]
    pub fn try_acquire(&self) -> Option<T> {
        let item = self.items.pop()?;
        self.count.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    /// Returns an item to the pool.
    ///
    /// The item is dropped when the pool already holds `capacity` items, or
    /// when the pool has been disposed.
    #[inline]
    pub fn release(&self, item: T) {
        if self.count.load(Ordering::Relaxed) < self.capacity.load(Ordering::Relaxed) {
            self.count.fetch_add(1, Ordering::Relaxed);
            self.items.push(item);
        }
    }

    /// Best-effort number of items currently in the pool.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Empties the pool for good.
    ///
    /// Capacity drops to zero, so later releases are discarded and later
    /// acquisitions return `None`.
    pub fn dispose(&self) {
        self.capacity.store(0, Ordering::Relaxed);
        while self.items.pop().is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
