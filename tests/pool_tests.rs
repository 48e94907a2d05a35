use segment_logger::{BufferSegmentProvider, ConfigError, ObjectPool};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_segments_cover_the_region() {
    let provider = BufferSegmentProvider::new(4, 32).unwrap();
    for _ in 0..4 {
        assert_eq!(provider.get_segment().len(), 32);
    }
    assert_eq!(provider.regions_allocated(), 1);

    provider.get_segment();
    assert_eq!(provider.regions_allocated(), 2);
}

#[test]
fn test_provider_rejects_zero_sizes() {
    assert_eq!(BufferSegmentProvider::new(0, 32).unwrap_err(), ConfigError::ZeroSegmentCount);
    assert_eq!(BufferSegmentProvider::new(4, 0).unwrap_err(), ConfigError::ZeroSegmentSize);
}

#[test]
fn test_region_capped_at_one_gib() {
    let provider = BufferSegmentProvider::new(1 << 20, 4096).unwrap();
    assert_eq!(provider.segment_size(), 4096);
    assert!(provider.segment_count() * provider.segment_size() <= 1024 * 1024 * 1024);
    assert_eq!(provider.segment_count(), 1 << 18);
}

#[test]
fn test_pool_of_two() {
    let next = AtomicUsize::new(0);
    let pool = ObjectPool::new(2, || next.fetch_add(1, Ordering::Relaxed));

    let a = pool.try_acquire().unwrap();
    let b = pool.try_acquire().unwrap();
    assert_ne!(a, b);
    assert!(pool.try_acquire().is_none());
}

#[test]
fn test_release_beyond_capacity_is_dropped() {
    let pool = ObjectPool::new(1, || 0u32);
    pool.release(1);
    pool.release(2);
    assert_eq!(pool.count(), 1);
    assert_eq!(pool.try_acquire(), Some(0));
    assert!(pool.try_acquire().is_none());
}

#[test]
fn test_dispose_is_permanent() {
    let pool = ObjectPool::new(3, String::new);
    let item = pool.try_acquire().unwrap();
    pool.dispose();

    assert_eq!(pool.capacity(), 0);
    assert!(pool.try_acquire().is_none());
    pool.release(item);
    assert!(pool.try_acquire().is_none());
}

#[test]
fn test_concurrent_acquire_release() {
    let next = AtomicUsize::new(0);
    let pool = Arc::new(ObjectPool::new(8, || next.fetch_add(1, Ordering::Relaxed)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    if let Some(item) = pool.try_acquire() {
                        pool.release(item);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seen = HashSet::new();
    while let Some(item) = pool.try_acquire() {
        assert!(seen.insert(item), "item {} handed out twice", item);
    }
    // Relaxed bound: racing releases may overshoot, but never lose items
    assert!(seen.len() >= 8);
}
