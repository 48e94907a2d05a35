//! Sinks for formatted log lines.
//!
//! Appenders are only ever called from the consumer side of a runner: the
//! background thread, or the submitting thread while it holds the sync
//! runner's lock. They can keep unsynchronized state of their own; the
//! mutex in [`SharedAppender`] exists so that the same appender can appear
//! in several configuration snapshots.

use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::formatter::FormattedMessage;
use crate::level::LogLevel;

/// Destination for formatted log lines.
///
/// An appender must not block indefinitely: it runs on the single consumer
/// context, so a stalled appender stalls all logging on that runner.
pub trait Appender: Send {
    /// Called once before the first message.
    fn initialize(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_message(&mut self, message: &FormattedMessage<'_>) -> io::Result<()>;

    /// Called once after each burst of messages.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called once when the appender leaves the configuration.
    fn dispose(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A named, cloneable handle to an [`Appender`], with an optional minimum
/// level.
///
/// Errors returned by the appender are reported through `tracing` and do
/// not affect the other appenders.
#[derive(Clone)]
pub struct SharedAppender {
    name: Arc<str>,
    min_level: LogLevel,
    inner: Arc<Mutex<dyn Appender>>,
}

impl SharedAppender {
    pub fn new<A: Appender + 'static>(name: &str, appender: A) -> Self {
        Self {
            name: Arc::from(name),
            min_level: LogLevel::Trace,
            inner: Arc::new(Mutex::new(appender)),
        }
    }

    /// Skips messages below `level`.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Whether both handles point to the same appender.
    pub fn same_appender(&self, other: &SharedAppender) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn initialize(&self) {
        let result = self.inner.lock().initialize();
        self.report("initialize", result);
    }

    pub(crate) fn write(&self, message: &FormattedMessage<'_>) {
        if message.level < self.min_level {
            return;
        }
        let result = self.inner.lock().write_message(message);
        self.report("write", result);
    }

    pub(crate) fn flush(&self) {
        let result = self.inner.lock().flush();
        self.report("flush", result);
    }

    pub(crate) fn dispose(&self) {
        let result = self.inner.lock().dispose();
        self.report("dispose", result);
    }

    fn report(&self, operation: &str, result: io::Result<()>) {
        if let Err(err) = result {
            tracing::warn!(appender = %self.name, operation, error = %err, "appender failed");
        }
    }
}

impl fmt::Debug for SharedAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAppender")
            .field("name", &self.name)
            .field("min_level", &self.min_level)
            .finish()
    }
}

/// Writes one line per message to any `io::Write`.
///
/// # Examples
///
/// ```
/// # use segment_logger::{SharedAppender, WriterAppender};
/// let console = SharedAppender::new("console", WriterAppender::stdout());
/// ```
pub struct WriterAppender<W: Write + Send> {
    writer: BufWriter<W>,
}

impl<W: Write + Send> WriterAppender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

impl WriterAppender<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterAppender<File> {
    /// Appends to `path`, creating the file if needed.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> Appender for WriterAppender<W> {
    fn write_message(&mut self, message: &FormattedMessage<'_>) -> io::Result<()> {
        self.writer.write_all(message.text.as_bytes())?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lines: Vec<String>,
    initialized: bool,
    flushes: usize,
    disposed: bool,
}

/// Keeps every line in memory. Clones share the same storage.
///
/// # Examples
///
/// ```
/// # use segment_logger::{MemoryAppender, SharedAppender};
/// let memory = MemoryAppender::new();
/// let appender = SharedAppender::new("memory", memory.clone());
/// assert!(memory.lines().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAppender {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.state.lock().lines.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Appender for MemoryAppender {
    fn initialize(&mut self) -> io::Result<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn write_message(&mut self, message: &FormattedMessage<'_>) -> io::Result<()> {
        self.state.lock().lines.push(message.text.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn dispose(&mut self) -> io::Result<()> {
        self.state.lock().disposed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(text: &str, level: LogLevel) -> FormattedMessage<'_> {
        FormattedMessage {
            text,
            level,
            timestamp: Utc::now(),
            logger_name: None,
            thread: None,
        }
    }

    #[test]
    fn test_min_level_filter() {
        let memory = MemoryAppender::new();
        let appender = SharedAppender::new("memory", memory.clone()).with_min_level(LogLevel::Warn);

        appender.write(&line("quiet", LogLevel::Info));
        appender.write(&line("loud", LogLevel::Error));

        assert_eq!(memory.lines(), vec!["loud".to_string()]);
    }

    #[test]
    fn test_writer_appender() {
        let mut appender = WriterAppender::new(Vec::new());
        appender.write_message(&line("one", LogLevel::Info)).unwrap();
        appender.write_message(&line("two", LogLevel::Info)).unwrap();
        let bytes = appender.into_inner().unwrap();
        assert_eq!(bytes, b"one\ntwo\n");
    }

    #[test]
    fn test_file_appender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        let mut appender = WriterAppender::file(&path).unwrap();
        appender.write_message(&line("persisted", LogLevel::Info)).unwrap();
        appender.dispose().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "persisted\n");
    }

    #[test]
    fn test_same_appender() {
        let a = SharedAppender::new("a", MemoryAppender::new());
        let b = a.clone();
        let c = SharedAppender::new("a", MemoryAppender::new());
        assert!(a.same_appender(&b));
        assert!(!a.same_appender(&c));
    }

    #[test]
    fn test_lifecycle_flags() {
        let memory = MemoryAppender::new();
        let appender = SharedAppender::new("memory", memory.clone());
        appender.initialize();
        appender.flush();
        appender.dispose();
        assert!(memory.is_initialized());
        assert_eq!(memory.flush_count(), 1);
        assert!(memory.is_disposed());
    }
}
