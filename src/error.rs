use thiserror::Error;

/// Errors raised while validating or applying a [`LogConfig`](crate::LogConfig).
///
/// Nothing on the logging hot path returns an error: buffer exhaustion is
/// handled by truncation and pool exhaustion by an empty acquisition. The
/// only fallible operations are constructing a runner and publishing a new
/// configuration, and both are rejected before any state changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The message pool must hold at least one record
    #[error("pool size must be greater than zero")]
    ZeroPoolSize,

    /// Buffer segments must be at least one byte long
    #[error("buffer segment size must be greater than zero")]
    ZeroSegmentSize,

    /// A segment allocator needs at least one segment per region
    #[error("buffer segment count must be greater than zero")]
    ZeroSegmentCount,

    /// String table indexes are encoded in a single byte
    #[error("string capacity must be in 1..=255, got {0}")]
    StringCapacity(usize),

    /// The prefix pattern references a token the formatter does not know
    #[error("unknown prefix pattern token: %{0}")]
    UnknownPrefixToken(String),

    /// Configuration updates are refused once the runner has shut down
    #[error("the runner has been shut down")]
    RunnerStopped,

    /// The background consumer thread could not be started
    #[error("failed to start the log consumer thread: {0}")]
    ThreadSpawn(String),
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
