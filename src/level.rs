use std::fmt;

/// Severity of a log event.
///
/// Levels are ordered from least to most severe, so a logger configured at
/// `Info` accepts every level `>= LogLevel::Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Upper-case name used by the line prefix.
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Fatal > LogLevel::Info);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(format!("{:<5}|", LogLevel::Info), "INFO |");
    }
}
