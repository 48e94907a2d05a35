//! # Segment Logger
//!
//! An allocation-free logging core. Application threads record structured
//! events into pre-allocated binary buffers without formatting, locking or
//! allocating; a single consumer turns them into text for the appenders.
//!
//! ## Key Features
//!
//! * Zero-allocation producer path: typed values are appended as tagged
//!   binary entries into a fixed-size buffer segment
//! * Deferred formatting: numbers, dates, enums and custom structs are only
//!   rendered on the consumer side
//! * Sticky truncation instead of errors when a record fills up
//! * Bounded, non-blocking record pool backed by large shared regions
//! * Synchronous or background-thread dispatch with FIFO ordering
//!
//! ## Main Components
//!
//! * [`BufferSegmentProvider`]: carves backing regions into buffer segments
//! * [`ObjectPool`]: bounded free-list of reusable records
//! * [`LogMessage`]: binary encoder and text renderer for one event
//! * [`SyncRunner`] / [`AsyncRunner`]: move records from producers to
//!   [`Appender`]s
//! * [`TypeRegistry`]: enum names and custom formatters, consulted at render
//!   time
//! * [`Logger`]: level filtering, pool exhaustion policy and a builder API
//!
//! ## Quick Start
//!
//! ```
//! use segment_logger::{create_runner, log_message, LogConfig, LogLevel, Logger, MemoryAppender, SharedAppender};
//!
//! let memory = MemoryAppender::new();
//! let runner = create_runner(LogConfig {
//!     prefix_pattern: "%level %logger: ".to_string(),
//!     background_thread_is_daemon: false,
//!     appenders: vec![SharedAppender::new("memory", memory.clone())],
//!     ..LogConfig::default()
//! })
//! .unwrap();
//!
//! let logger = Logger::new("app", LogLevel::Info, runner.clone());
//! log_message!(logger, LogLevel::Info, "Temperature: ", 25.5, " C");
//! logger
//!     .warn()
//!     .append("disk almost full")
//!     .append_key_value("free_mb", 512u32)
//!     .log();
//!
//! runner.shutdown();
//! assert_eq!(
//!     memory.lines(),
//!     vec![
//!         "INFO app: Temperature: 25.5 C".to_string(),
//!         "WARN app: disk almost full ~~ { \"free_mb\": 512 }".to_string(),
//!     ]
//! );
//! ```

pub mod appender;
pub mod config;
pub mod error;
pub mod formatter;
pub mod level;
pub mod logger;
pub mod message;
pub mod pool;
pub mod registry;
pub mod runner;
pub mod segment;

pub use appender::{Appender, MemoryAppender, SharedAppender, WriterAppender};
pub use config::{DispatchStrategy, LogConfig, PoolExhaustionPolicy, RenderSettings, MAX_STRING_CAPACITY};
pub use error::ConfigError;
pub use formatter::{FormattedMessage, LineFormatter, PrefixPattern};
pub use level::LogLevel;
pub use logger::{Logger, MessageBuilder};
pub use message::{
    Appendable, AsciiChars, AsciiSpan, EnumArg, Formattable, KeyValueList, LogMessage, RenderOptions,
    SharedError, SharedStr, StrSpan, UnmanagedArg,
};
pub use pool::ObjectPool;
pub use registry::{LogEnum, TypeRegistry, TypeToken, Unmanaged, UnmanagedFormatter};
pub use runner::{create_runner, create_runner_with_registry, AsyncRunner, Runner, SyncRunner};
pub use segment::{BufferSegment, BufferSegmentProvider};
