//! Log message records: the append-only encoder used by producer threads and
//! the matching renderer used by the consumer.
//!
//! A [`LogMessage`] owns one [`BufferSegment`] for its whole life. Producers
//! append typed values as tagged binary entries; nothing is formatted and
//! nothing is allocated until the consumer renders the record into text.
//!
//! # Lifecycle
//!
//! 1. **Idle**: just initialized, cursor at the start of the buffer
//! 2. **Appending**: entries written, cursor advanced
//! 3. **Truncated**: the buffer or the string table ran out; further appends
//!    are ignored
//! 4. **Submitted**: handed to a runner; the producer must not touch it
//!
//! [`LogMessage::initialize`] brings a record back to Idle from any state.

mod arg_type;
mod decoder;
mod encoder;
mod key_values;
mod number_format;
pub(crate) mod output;

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::thread::{self, Thread};

use crate::config::{RenderSettings, MAX_STRING_CAPACITY};
use crate::level::LogLevel;
use crate::registry::TypeRegistry;
use crate::segment::{BufferSegment, BufferSegmentProvider};

#[doc(hidden)]
pub use encoder::{EntryWriter, Footprint};
pub use encoder::{Appendable, AsciiChars, AsciiSpan, EnumArg, Formattable, StrSpan, UnmanagedArg};
pub use key_values::KeyValueList;

/// A string referenced from the string table.
///
/// Both variants are cheap to clone: a static reference, or a reference
/// count bump.
#[derive(Debug, Clone)]
pub enum SharedStr {
    Static(&'static str),
    Shared(Arc<str>),
}

impl SharedStr {
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            SharedStr::Static(s) => s,
            SharedStr::Shared(s) => s,
        }
    }
}

impl Deref for SharedStr {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for SharedStr {
    fn from(value: &'static str) -> Self {
        SharedStr::Static(value)
    }
}

impl From<Arc<str>> for SharedStr {
    fn from(value: Arc<str>) -> Self {
        SharedStr::Shared(value)
    }
}

impl fmt::Display for SharedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a message, rendered after the message text.
pub type SharedError = Arc<dyn Error + Send + Sync>;

/// Options for a rendering pass.
#[derive(Debug, Default)]
pub struct RenderOptions<'a> {
    /// Collects the key/value entries seen during the pass
    pub key_values: Option<&'a mut KeyValueList>,
    /// Ignore per-value format strings
    pub skip_format_strings: bool,
}

/// One log event, encoded in a fixed-size buffer.
///
/// # Thread Safety
///
/// A record has a single owner at a time: the producer that acquired it,
/// then the runner it was submitted to. It is `Send` but never shared.
///
/// # Examples
///
/// ```
/// # use segment_logger::{LogMessage, LogLevel};
/// let mut message = LogMessage::with_capacity(128, 4);
/// message.initialize(None, LogLevel::Info);
/// message.append("Temperature: ").append(25.5).append(" C");
///
/// assert_eq!(message.to_string(), "Temperature: 25.5 C");
/// ```
pub struct LogMessage {
    buffer: BufferSegment,
    position: usize,
    strings: Vec<SharedStr>,
    string_capacity: usize,
    truncated: bool,
    level: LogLevel,
    timestamp: DateTime<Utc>,
    thread: Option<Thread>,
    logger_name: Option<SharedStr>,
    exception: Option<SharedError>,
    registry: Arc<TypeRegistry>,
}

impl LogMessage {
    /// Creates a record over `buffer` with room for `string_capacity`
    /// string table entries (at most 255).
    pub fn new(buffer: BufferSegment, string_capacity: usize, registry: Arc<TypeRegistry>) -> Self {
        let string_capacity = string_capacity.min(MAX_STRING_CAPACITY);
        Self {
            buffer,
            position: 0,
            strings: Vec::with_capacity(string_capacity),
            string_capacity,
            truncated: false,
            level: LogLevel::default(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            thread: None,
            logger_name: None,
            exception: None,
            registry,
        }
    }

    /// Creates a standalone record using the global type registry.
    pub fn with_capacity(buffer_size: usize, string_capacity: usize) -> Self {
        Self::new(
            BufferSegmentProvider::create_standalone_segment(buffer_size),
            string_capacity,
            TypeRegistry::global(),
        )
    }

    /// A record with no room at all, handed out after shutdown.
    ///
    /// Every append on it is a no-op.
    pub fn empty(registry: Arc<TypeRegistry>) -> Self {
        Self::new(BufferSegment::default(), 0, registry)
    }

    /// Resets the record to the Idle state and captures the event metadata.
    pub fn initialize(&mut self, logger_name: Option<SharedStr>, level: LogLevel) {
        self.position = 0;
        self.truncated = false;
        self.strings.clear();
        self.level = level;
        self.timestamp = Utc::now();
        self.thread = Some(thread::current());
        self.logger_name = logger_name;
        self.exception = None;
    }

    /// Attaches an error, rendered on its own line after the message.
    pub fn with_exception(&mut self, error: SharedError) -> &mut Self {
        self.exception = Some(error);
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn logger_name(&self) -> Option<&str> {
        self.logger_name.as_deref()
    }

    pub fn exception(&self) -> Option<&SharedError> {
        self.exception.as_ref()
    }

    /// Whether content was dropped because the buffer or string table filled up.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Bytes written so far.
    pub fn encoded_len(&self) -> usize {
        self.position
    }

    /// Size of the underlying buffer segment.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    /// String table entries in use.
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string_capacity(&self) -> usize {
        self.string_capacity
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    fn encoded(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.position]
    }

    #[inline]
    fn string_at(&self, index: u8) -> Option<&str> {
        self.strings.get(usize::from(index)).map(SharedStr::as_str)
    }

    /// Renders the message text and key/value block with the given settings.
    ///
    /// Allocates; meant for diagnostics and tests rather than the consumer
    /// hot path.
    pub fn render_to_string(&self, settings: &RenderSettings) -> String {
        let mut text = String::new();
        let mut key_values = KeyValueList::new();
        {
            let mut out = output::StringOutput::new(&mut text);
            self.render_into(
                &mut out,
                settings,
                RenderOptions {
                    key_values: Some(&mut key_values),
                    skip_format_strings: false,
                },
            );
            if !key_values.is_empty() {
                self.write_key_values(&key_values, &mut out, settings);
            }
        }
        text
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_to_string(&RenderSettings::default()))
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("level", &self.level)
            .field("logger_name", &self.logger_name)
            .field("encoded_len", &self.position)
            .field("buffer_capacity", &self.buffer.len())
            .field("strings", &self.strings.len())
            .field("truncated", &self.truncated)
            .finish()
    }
}
