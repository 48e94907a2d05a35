use std::sync::Arc;

use crate::appender::SharedAppender;
use crate::config::LogConfig;
use crate::error::Result;
use crate::formatter::LineFormatter;
use crate::level::LogLevel;
use crate::message::LogMessage;
use crate::segment::BufferSegmentProvider;

use super::MessagePool;

/// Room for the pool exhaustion notice.
const OVERFLOW_SEGMENT_SIZE: usize = 64;

/// Consumer-side state: formatter, current appenders and the record used
/// for the pool exhaustion notice.
///
/// Only ever touched from the consumer context.
pub(crate) struct Dispatcher {
    formatter: LineFormatter,
    appenders: Vec<SharedAppender>,
    overflow: LogMessage,
}

impl Dispatcher {
    /// Builds the consumer state and initializes the appenders.
    pub(crate) fn new(config: &LogConfig, pool: &MessagePool) -> Result<Self> {
        let formatter = LineFormatter::new(config)?;
        for appender in &config.appenders {
            appender.initialize();
        }

        Ok(Self {
            formatter,
            appenders: config.appenders.clone(),
            overflow: LogMessage::new(
                BufferSegmentProvider::create_standalone_segment(OVERFLOW_SEGMENT_SIZE),
                4,
                Arc::clone(pool.registry()),
            ),
        })
    }

    /// Formats `message` and writes it to every appender.
    pub(crate) fn dispatch(&mut self, message: &LogMessage) {
        write_line(&mut self.formatter, &self.appenders, message);
    }

    /// Reports pool drops, then flushes every appender.
    pub(crate) fn flush(&mut self, pool: &MessagePool) {
        let dropped = pool.take_dropped();
        if dropped > 0 {
            self.overflow.initialize(None, LogLevel::Warn);
            self.overflow
                .append("Log message skipped due to pool exhaustion (")
                .append(dropped)
                .append(" dropped)");
            write_line(&mut self.formatter, &self.appenders, &self.overflow);
        }

        for appender in &self.appenders {
            appender.flush();
        }
    }

    /// Switches to a validated configuration.
    ///
    /// Appenders that are no longer configured are flushed and disposed;
    /// new ones are initialized.
    pub(crate) fn apply(&mut self, config: &LogConfig, pool: &MessagePool) {
        if let Err(err) = self.formatter.reconfigure(config) {
            tracing::error!(error = %err, "rejected configuration reached the consumer");
            return;
        }

        for old in &self.appenders {
            if !config.appenders.iter().any(|new| new.same_appender(old)) {
                old.flush();
                old.dispose();
            }
        }
        for new in &config.appenders {
            if !self.appenders.iter().any(|old| old.same_appender(new)) {
                new.initialize();
            }
        }

        self.appenders = config.appenders.clone();
        pool.set_policy(config.exhaustion_policy);
        tracing::debug!(appenders = self.appenders.len(), "configuration applied");
    }

    /// Final flush, then disposes every appender.
    pub(crate) fn close(&mut self, pool: &MessagePool) {
        self.flush(pool);
        for appender in self.appenders.drain(..) {
            appender.dispose();
        }
    }
}

fn write_line(formatter: &mut LineFormatter, appenders: &[SharedAppender], message: &LogMessage) {
    if appenders.is_empty() {
        return;
    }
    let line = formatter.format(message);
    for appender in appenders {
        appender.write(&line);
    }
}
