//! Dispatch runners: move submitted messages from producer threads to the
//! appenders.
//!
//! Two strategies share the same contract:
//!
//! * [`SyncRunner`] formats and writes on the submitting thread, under a lock
//! * [`AsyncRunner`] queues messages for one background thread
//!
//! Both own the message pool. A producer acquires a record, fills it, and
//! submits it; the consumer formats it, writes it to every appender and
//! puts it back in the pool.

mod async_runner;
mod dispatcher;
mod idle;
mod sync_runner;

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{DispatchStrategy, LogConfig, PoolExhaustionPolicy};
use crate::error::Result;
use crate::message::LogMessage;
use crate::pool::ObjectPool;
use crate::registry::TypeRegistry;
use crate::segment::BufferSegmentProvider;

pub use async_runner::AsyncRunner;
pub use sync_runner::SyncRunner;

/// Contract shared by the dispatch strategies.
pub trait Runner: Send + Sync {
    /// Takes a free record from the pool.
    ///
    /// Returns `None` when the pool is empty; the caller decides what to do
    /// (see [`PoolExhaustionPolicy`]). Once the runner has stopped, returns
    /// an empty record that silently ignores every append.
    fn try_acquire_log_message(&self) -> Option<Box<LogMessage>>;

    /// Builds a record outside the pool, for the `Allocate` policy.
    fn allocate_log_message(&self) -> Box<LogMessage>;

    /// Hands a filled record to the consumer. The caller must not keep it.
    fn submit(&self, message: Box<LogMessage>);

    /// Counts an event dropped because the pool was empty.
    fn notify_dropped(&self);

    fn exhaustion_policy(&self) -> PoolExhaustionPolicy;

    /// Validates and publishes a new configuration.
    ///
    /// Only the render settings, prefix pattern, exhaustion policy and
    /// appenders are replaced; pool and buffer sizes are fixed at startup.
    fn update_config(&self, config: LogConfig) -> Result<()>;

    /// Stops the runner after delivering everything already submitted.
    fn shutdown(&self);

    fn is_running(&self) -> bool;
}

/// Starts a runner using the process-wide type registry.
///
/// # Examples
///
/// ```
/// # use segment_logger::{create_runner, LogConfig, DispatchStrategy, LogLevel};
/// let runner = create_runner(LogConfig {
///     strategy: DispatchStrategy::Sync,
///     ..LogConfig::default()
/// })
/// .unwrap();
///
/// let mut message = runner.try_acquire_log_message().unwrap();
/// message.initialize(None, LogLevel::Info);
/// message.append("ready");
/// runner.submit(message);
/// runner.shutdown();
/// ```
pub fn create_runner(config: LogConfig) -> Result<Arc<dyn Runner>> {
    create_runner_with_registry(config, TypeRegistry::global())
}

/// Starts a runner whose records resolve enums and unmanaged values
/// through `registry`.
pub fn create_runner_with_registry(config: LogConfig, registry: Arc<TypeRegistry>) -> Result<Arc<dyn Runner>> {
    Ok(match config.strategy {
        DispatchStrategy::Sync => Arc::new(SyncRunner::with_registry(config, registry)?),
        DispatchStrategy::Async => Arc::new(AsyncRunner::with_registry(config, registry)?),
    })
}

fn policy_to_u8(policy: PoolExhaustionPolicy) -> u8 {
    match policy {
        PoolExhaustionPolicy::Drop => 0,
        PoolExhaustionPolicy::DropAndNotify => 1,
        PoolExhaustionPolicy::Allocate => 2,
        PoolExhaustionPolicy::Wait => 3,
    }
}

fn policy_from_u8(value: u8) -> PoolExhaustionPolicy {
    match value {
        0 => PoolExhaustionPolicy::Drop,
        2 => PoolExhaustionPolicy::Allocate,
        3 => PoolExhaustionPolicy::Wait,
        _ => PoolExhaustionPolicy::DropAndNotify,
    }
}

/// Pool of records plus the state producers read without locking.
pub(crate) struct MessagePool {
    pool: ObjectPool<Box<LogMessage>>,
    registry: Arc<TypeRegistry>,
    segment_size: usize,
    string_capacity: usize,
    running: AtomicBool,
    dropped: AtomicUsize,
    policy: AtomicU8,
}

impl MessagePool {
    pub(crate) fn new(config: &LogConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        config.validate()?;

        let provider = BufferSegmentProvider::new(config.pool_size, config.segment_size)?;
        let string_capacity = config.string_capacity;
        let pool = ObjectPool::new(config.pool_size, || {
            Box::new(LogMessage::new(
                provider.get_segment(),
                string_capacity,
                Arc::clone(&registry),
            ))
        });

        tracing::debug!(
            pool_size = config.pool_size,
            segment_size = provider.segment_size(),
            regions = provider.regions_allocated(),
            "message pool ready"
        );

        Ok(Self {
            pool,
            registry,
            segment_size: provider.segment_size(),
            string_capacity,
            running: AtomicBool::new(true),
            dropped: AtomicUsize::new(0),
            policy: AtomicU8::new(policy_to_u8(config.exhaustion_policy)),
        })
    }

    pub(crate) fn try_acquire(&self) -> Option<Box<LogMessage>> {
        if !self.is_running() {
            return Some(Box::new(LogMessage::empty(Arc::clone(&self.registry))));
        }
        self.pool.try_acquire()
    }

    pub(crate) fn allocate(&self) -> Box<LogMessage> {
        Box::new(LogMessage::new(
            BufferSegmentProvider::create_standalone_segment(self.segment_size),
            self.string_capacity,
            Arc::clone(&self.registry),
        ))
    }

    #[inline]
    pub(crate) fn release(&self, message: Box<LogMessage>) {
        self.pool.release(message);
    }

    pub(crate) fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flips the running flag. Returns `true` for the call that stopped it.
    pub(crate) fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn notify_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops reported since the last call.
    pub(crate) fn take_dropped(&self) -> usize {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub(crate) fn policy(&self) -> PoolExhaustionPolicy {
        policy_from_u8(self.policy.load(Ordering::Relaxed))
    }

    pub(crate) fn set_policy(&self, policy: PoolExhaustionPolicy) {
        self.policy.store(policy_to_u8(policy), Ordering::Relaxed);
    }

    /// Empties the pool for good.
    pub(crate) fn dispose(&self) {
        self.pool.dispose();
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.pool.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    fn pool(size: usize) -> MessagePool {
        let config = LogConfig {
            pool_size: size,
            segment_size: 32,
            string_capacity: 4,
            ..LogConfig::default()
        };
        MessagePool::new(&config, Arc::new(TypeRegistry::new())).unwrap()
    }

    #[test]
    fn test_policy_round_trip() {
        for policy in [
            PoolExhaustionPolicy::Drop,
            PoolExhaustionPolicy::DropAndNotify,
            PoolExhaustionPolicy::Allocate,
            PoolExhaustionPolicy::Wait,
        ] {
            assert_eq!(policy_from_u8(policy_to_u8(policy)), policy);
        }
    }

    #[test]
    fn test_acquire_until_empty() {
        let pool = pool(2);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        assert_eq!(a.buffer_capacity(), 32);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_sentinel_after_stop() {
        let pool = pool(1);
        assert!(pool.stop());
        assert!(!pool.stop());

        let mut sentinel = pool.try_acquire().unwrap();
        sentinel.initialize(None, LogLevel::Info);
        sentinel.append(1u32);
        assert_eq!(sentinel.buffer_capacity(), 0);
        assert!(sentinel.is_truncated());
    }

    #[test]
    fn test_dropped_counter_resets() {
        let pool = pool(1);
        pool.notify_dropped();
        pool.notify_dropped();
        assert_eq!(pool.take_dropped(), 2);
        assert_eq!(pool.take_dropped(), 0);
    }
}
