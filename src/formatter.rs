//! Turns a [`LogMessage`] into one line of text for the appenders.
//!
//! A line is the expanded prefix pattern, the message text, the structured
//! field block and, if one is attached, the error on the following line.
//! Everything is written into a buffer owned by the formatter, so the
//! consumer formats without allocating.

use chrono::{DateTime, Utc};
use std::fmt::{self, Write};
use std::thread::Thread;

use crate::config::{LogConfig, RenderSettings};
use crate::error::{ConfigError, Result};
use crate::level::LogLevel;
use crate::message::output::{self, Output, Utf8Output};
use crate::message::{KeyValueList, LogMessage, RenderOptions};

/// Size of the line buffer used by the runners.
pub const DEFAULT_LINE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PrefixToken {
    Literal(String),
    Date,
    Time,
    Level,
    Logger,
    Thread,
}

/// Parsed form of a prefix pattern such as `"%time - %level - %logger || "`.
///
/// Recognized tokens are `%date`, `%time`, `%level`, `%logger` and
/// `%thread`; `%%` is a literal percent sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixPattern {
    tokens: Vec<PrefixToken>,
}

impl PrefixPattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPrefixToken`] for a `%name` the
    /// formatter does not know.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(percent) = rest.find('%') {
            literal.push_str(&rest[..percent]);
            let after = &rest[percent + 1..];

            if let Some(tail) = after.strip_prefix('%') {
                literal.push('%');
                rest = tail;
                continue;
            }

            let name_len = after
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(after.len());
            let name = &after[..name_len];
            let token = match name {
                "" => {
                    literal.push('%');
                    rest = after;
                    continue;
                }
                "date" => PrefixToken::Date,
                "time" => PrefixToken::Time,
                "level" => PrefixToken::Level,
                "logger" => PrefixToken::Logger,
                "thread" => PrefixToken::Thread,
                other => return Err(ConfigError::UnknownPrefixToken(other.to_string())),
            };

            if !literal.is_empty() {
                tokens.push(PrefixToken::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
            rest = &after[name_len..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(PrefixToken::Literal(literal));
        }

        Ok(Self { tokens })
    }

    fn write(&self, out: &mut dyn Write, message: &LogMessage) -> fmt::Result {
        let timestamp = message.timestamp();
        for token in &self.tokens {
            match token {
                PrefixToken::Literal(text) => out.write_str(text)?,
                PrefixToken::Date => write!(out, "{}", timestamp.format("%Y-%m-%d"))?,
                PrefixToken::Time => write!(out, "{}", timestamp.format("%H:%M:%S%.3f"))?,
                PrefixToken::Level => out.write_str(message.level().as_str())?,
                PrefixToken::Logger => out.write_str(message.logger_name().unwrap_or_default())?,
                PrefixToken::Thread => match message.thread() {
                    Some(thread) => match thread.name() {
                        Some(name) => out.write_str(name)?,
                        None => write!(out, "{:?}", thread.id())?,
                    },
                    None => {}
                },
            }
        }
        Ok(())
    }
}

/// A formatted line plus the event metadata, as handed to appenders.
#[derive(Debug, Clone, Copy)]
pub struct FormattedMessage<'a> {
    pub text: &'a str,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub logger_name: Option<&'a str>,
    pub thread: Option<&'a Thread>,
}

/// Formats messages into a reusable fixed-size line buffer.
///
/// Lines longer than the buffer end in the truncation suffix.
///
/// # Examples
///
/// ```
/// # use segment_logger::{LineFormatter, LogConfig, LogLevel, LogMessage};
/// let config = LogConfig {
///     prefix_pattern: "[%level] ".to_string(),
///     ..LogConfig::default()
/// };
/// let mut formatter = LineFormatter::new(&config).unwrap();
///
/// let mut message = LogMessage::with_capacity(128, 8);
/// message.initialize(None, LogLevel::Warn);
/// message.append("disk at ").append(91u8).append("%");
///
/// assert_eq!(formatter.format(&message).text, "[WARN] disk at 91%");
/// ```
#[derive(Debug)]
pub struct LineFormatter {
    prefix: PrefixPattern,
    settings: RenderSettings,
    buffer: Box<[u8]>,
    key_values: KeyValueList,
}

impl LineFormatter {
    pub fn new(config: &LogConfig) -> Result<Self> {
        Self::with_capacity(config, DEFAULT_LINE_CAPACITY)
    }

    pub fn with_capacity(config: &LogConfig, capacity: usize) -> Result<Self> {
        Ok(Self {
            prefix: PrefixPattern::parse(&config.prefix_pattern)?,
            settings: config.render.clone(),
            buffer: vec![0u8; capacity].into_boxed_slice(),
            key_values: KeyValueList::new(),
        })
    }

    /// Picks up new render settings and prefix pattern.
    pub fn reconfigure(&mut self, config: &LogConfig) -> Result<()> {
        self.prefix = PrefixPattern::parse(&config.prefix_pattern)?;
        self.settings = config.render.clone();
        Ok(())
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Formats `message` into the line buffer.
    pub fn format<'a>(&'a mut self, message: &'a LogMessage) -> FormattedMessage<'a> {
        let len = self.write_line(message);
        let text = std::str::from_utf8(&self.buffer[..len]).unwrap_or_default();

        FormattedMessage {
            text,
            level: message.level(),
            timestamp: message.timestamp(),
            logger_name: message.logger_name(),
            thread: message.thread(),
        }
    }

    fn write_line(&mut self, message: &LogMessage) -> usize {
        let suffix = &self.settings.truncated_suffix;
        let mut out = Utf8Output::new(&mut self.buffer);

        if self.prefix.write(&mut out, message).is_err() {
            out.rewind(0);
            output::write_truncated_suffix(&mut out, suffix);
            return out.len();
        }

        let options = RenderOptions {
            key_values: Some(&mut self.key_values),
            skip_format_strings: false,
        };
        if !message.render_into(&mut out, &self.settings, options) {
            return out.len();
        }
        if !message.write_key_values(&self.key_values, &mut out, &self.settings) {
            return out.len();
        }

        if let Some(error) = message.exception() {
            let mark = out.len();
            if write!(out, "\n{}", error).is_err() {
                out.rewind(mark);
                output::write_truncated_suffix(&mut out, suffix);
            }
        }
        out.len()
    }
}
