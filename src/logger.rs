use crossbeam::utils::Backoff;
use std::sync::Arc;

use crate::config::PoolExhaustionPolicy;
use crate::level::LogLevel;
use crate::message::{Appendable, Formattable, LogMessage, SharedError, SharedStr};
use crate::registry::{LogEnum, Unmanaged};
use crate::runner::Runner;

/// Named entry point producers log through.
///
/// A logger filters by level, acquires a record from its runner, applies
/// the runner's [`PoolExhaustionPolicy`] when the pool is empty, and stamps
/// the record with its name and level.
///
/// # Examples
///
/// ```
/// # use segment_logger::{create_runner, DispatchStrategy, LogConfig, LogLevel, Logger};
/// let runner = create_runner(LogConfig {
///     strategy: DispatchStrategy::Sync,
///     ..LogConfig::default()
/// })
/// .unwrap();
/// let logger = Logger::new("orders", LogLevel::Info, runner.clone());
///
/// logger.info().append("order ").append(42u64).append(" accepted").log();
/// logger.debug().append("not recorded").log();
/// runner.shutdown();
/// ```
#[derive(Clone)]
pub struct Logger {
    name: SharedStr,
    level: LogLevel,
    runner: Arc<dyn Runner>,
}

impl Logger {
    pub fn new(name: impl Into<SharedStr>, level: LogLevel, runner: Arc<dyn Runner>) -> Self {
        Self {
            name: name.into(),
            level,
            runner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Acquires and initializes a record for an event at `level`.
    ///
    /// Returns `None` when the level is filtered out or the pool is empty
    /// under a dropping policy.
    pub fn acquire(&self, level: LogLevel) -> Option<Box<LogMessage>> {
        if !self.is_enabled(level) {
            return None;
        }

        let mut message = match self.runner.try_acquire_log_message() {
            Some(message) => message,
            None => self.on_exhausted()?,
        };
        message.initialize(Some(self.name.clone()), level);
        Some(message)
    }

    fn on_exhausted(&self) -> Option<Box<LogMessage>> {
        match self.runner.exhaustion_policy() {
            PoolExhaustionPolicy::Drop => None,
            PoolExhaustionPolicy::DropAndNotify => {
                self.runner.notify_dropped();
                None
            }
            PoolExhaustionPolicy::Allocate => Some(self.runner.allocate_log_message()),
            PoolExhaustionPolicy::Wait => {
                let backoff = Backoff::new();
                loop {
                    backoff.snooze();
                    if let Some(message) = self.runner.try_acquire_log_message() {
                        return Some(message);
                    }
                }
            }
        }
    }

    /// Hands a filled record to the runner.
    #[inline]
    pub fn submit(&self, message: Box<LogMessage>) {
        self.runner.submit(message);
    }

    pub fn log(&self, level: LogLevel) -> MessageBuilder<'_> {
        MessageBuilder {
            runner: self.runner.as_ref(),
            message: self.acquire(level),
        }
    }

    pub fn trace(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Trace)
    }

    pub fn debug(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Debug)
    }

    pub fn info(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Info)
    }

    pub fn warn(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Warn)
    }

    pub fn error(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Error)
    }

    pub fn fatal(&self) -> MessageBuilder<'_> {
        self.log(LogLevel::Fatal)
    }
}

/// Builds one event and submits it on [`log`](Self::log) or when dropped.
///
/// When the event is filtered out or dropped, every call is a no-op.
#[must_use = "the event is submitted when the builder is dropped; call `log()` to make that explicit"]
pub struct MessageBuilder<'a> {
    runner: &'a dyn Runner,
    message: Option<Box<LogMessage>>,
}

impl MessageBuilder<'_> {
    /// Whether this builder holds a record.
    pub fn is_enabled(&self) -> bool {
        self.message.is_some()
    }

    pub fn append<T: Appendable>(mut self, value: T) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.append(value);
        }
        self
    }

    pub fn append_formatted<T: Formattable>(mut self, value: T, format: &'static str) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.append_formatted(value, format);
        }
        self
    }

    pub fn append_str_span(mut self, text: &str) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.append_str_span(text);
        }
        self
    }

    pub fn append_enum<T: LogEnum>(mut self, value: T) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.append_enum(value);
        }
        self
    }

    pub fn append_unmanaged<T: Unmanaged>(mut self, value: &T) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.append_unmanaged(value);
        }
        self
    }

    pub fn append_key_value<K, T>(mut self, key: K, value: T) -> Self
    where
        K: Into<SharedStr>,
        T: Appendable,
    {
        if let Some(message) = self.message.as_mut() {
            message.append_key_value(key, value);
        }
        self
    }

    pub fn with_exception(mut self, error: SharedError) -> Self {
        if let Some(message) = self.message.as_mut() {
            message.with_exception(error);
        }
        self
    }

    /// Submits the event.
    pub fn log(self) {}
}

impl Drop for MessageBuilder<'_> {
    fn drop(&mut self) {
        if let Some(message) = self.message.take() {
            self.runner.submit(message);
        }
    }
}

/// Logs one event built from a list of values.
///
/// Expands to an acquire, one `append` per argument and a submit. Nothing
/// is evaluated past the level check when the level is filtered out.
///
/// # Examples
///
/// ```
/// # use segment_logger::{create_runner, log_message, DispatchStrategy, LogConfig, LogLevel, Logger};
/// # let runner = create_runner(LogConfig { strategy: DispatchStrategy::Sync, ..LogConfig::default() }).unwrap();
/// let logger = Logger::new("cache", LogLevel::Debug, runner);
/// let hits = 17u32;
/// log_message!(logger, LogLevel::Info, "hits: ", hits, ", ratio: ", 0.85f64);
/// ```
#[macro_export]
macro_rules! log_message {
    ($logger:expr, $level:expr, $($arg:expr),+ $(,)?) => {{
        let logger = &$logger;
        if let Some(mut message) = logger.acquire($level) {
            $( message.append($arg); )+
            logger.submit(message);
        }
    }};
}
