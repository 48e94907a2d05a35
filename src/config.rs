use std::fmt;

use crate::appender::SharedAppender;
use crate::error::{ConfigError, Result};
use crate::formatter::PrefixPattern;

/// Largest string table a record can use; indexes are stored in one byte.
pub const MAX_STRING_CAPACITY: usize = u8::MAX as usize;

/// How submitted messages reach the appenders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchStrategy {
    /// Format and write on the submitting thread, under a lock.
    Sync,
    /// Queue for a dedicated background thread.
    #[default]
    Async,
}

/// What the calling layer does when the message pool is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolExhaustionPolicy {
    /// Silently discard the event.
    Drop,
    /// Discard the event and have the consumer report the number of drops.
    #[default]
    DropAndNotify,
    /// Build an unpooled record on demand.
    Allocate,
    /// Spin, then yield, until a record is returned to the pool.
    Wait,
}

/// Text settings used when rendering a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Shown in place of a null value
    pub null_display: String,
    /// Appended when a message or its rendering was cut short
    pub truncated_suffix: String,
    /// Placed between the message text and its key/value block
    pub key_value_separator: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            null_display: "null".to_string(),
            truncated_suffix: " [TRUNCATED]".to_string(),
            key_value_separator: " ~~ ".to_string(),
        }
    }
}

/// Runner configuration.
///
/// `pool_size`, `segment_size`, `string_capacity`, `strategy` and
/// `background_thread_is_daemon` are read once when the runner starts.
/// Every other field can be replaced at runtime through
/// [`Runner::update_config`](crate::Runner::update_config).
///
/// # Examples
///
/// ```
/// # use segment_logger::{LogConfig, DispatchStrategy};
/// let config = LogConfig {
///     pool_size: 64,
///     strategy: DispatchStrategy::Sync,
///     ..LogConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct LogConfig {
    pub pool_size: usize,
    pub segment_size: usize,
    pub string_capacity: usize,
    pub strategy: DispatchStrategy,
    /// When false, dropping the runner joins the background thread.
    pub background_thread_is_daemon: bool,
    pub render: RenderSettings,
    pub prefix_pattern: String,
    pub exhaustion_policy: PoolExhaustionPolicy,
    pub appenders: Vec<SharedAppender>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            pool_size: 1024,
            segment_size: 128,
            string_capacity: 32,
            strategy: DispatchStrategy::default(),
            background_thread_is_daemon: true,
            render: RenderSettings::default(),
            prefix_pattern: "%time - %level - %logger || ".to_string(),
            exhaustion_policy: PoolExhaustionPolicy::default(),
            appenders: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Checks every field, so that an invalid snapshot is never applied.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if self.string_capacity == 0 || self.string_capacity > MAX_STRING_CAPACITY {
            return Err(ConfigError::StringCapacity(self.string_capacity));
        }
        PrefixPattern::parse(&self.prefix_pattern)?;
        Ok(())
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("pool_size", &self.pool_size)
            .field("segment_size", &self.segment_size)
            .field("string_capacity", &self.string_capacity)
            .field("strategy", &self.strategy)
            .field("background_thread_is_daemon", &self.background_thread_is_daemon)
            .field("render", &self.render)
            .field("prefix_pattern", &self.prefix_pattern)
            .field("exhaustion_policy", &self.exhaustion_policy)
            .field("appenders", &self.appenders.len())
            .finish()
    }
}
