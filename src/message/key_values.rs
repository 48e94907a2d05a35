//! Structured field rendering.
//!
//! Key/value entries are skipped by the primary text pass, which only
//! records where each one starts. The second pass renders them, in the
//! order they were appended, as a JSON object literal:
//!
//! ```text
//! <separator>{ "key": value, "other": "text" }
//! ```
//!
//! Booleans, finite numbers and null are written bare; every other value
//! is rendered as text and quoted with JSON escaping. Null is always the
//! `null` literal, whatever the configured null display is.

use std::fmt::{self, Write};

use super::arg_type::ArgType;
use super::decoder::Cursor;
use super::output::{self, JsonEscape, Output, Utf16Output, Utf8Output};
use super::LogMessage;
use crate::config::{RenderSettings, MAX_STRING_CAPACITY};

/// Offsets of the key/value entries found by a rendering pass.
///
/// Sized up front for the largest string table, so collecting never
/// reallocates. Reuse one list per consumer.
#[derive(Debug, Clone)]
pub struct KeyValueList {
    offsets: Vec<usize>,
}

impl KeyValueList {
    pub fn new() -> Self {
        Self {
            offsets: Vec::with_capacity(MAX_STRING_CAPACITY),
        }
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Every key uses a string table slot, so a record never has more
    /// entries than the list can hold.
    pub(super) fn push(&mut self, offset: usize) {
        if self.offsets.len() < self.offsets.capacity() {
            self.offsets.push(offset);
        }
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.iter().copied()
    }
}

impl Default for KeyValueList {
    fn default() -> Self {
        Self::new()
    }
}

/// How a field value is written inside the object literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonValue {
    Null,
    Bare,
    Quoted,
}

impl JsonValue {
    /// `cursor` sits on the value's payload and is not advanced.
    fn classify(tag: ArgType, cursor: Cursor<'_>) -> Self {
        let mut peek = cursor;
        match tag {
            ArgType::Null => JsonValue::Null,
            ArgType::F32 => match peek.array().map(f32::from_le_bytes) {
                Some(value) if value.is_finite() => JsonValue::Bare,
                _ => JsonValue::Quoted,
            },
            ArgType::F64 => match peek.array().map(f64::from_le_bytes) {
                Some(value) if value.is_finite() => JsonValue::Bare,
                _ => JsonValue::Quoted,
            },
            tag if is_bare(tag) => JsonValue::Bare,
            _ => JsonValue::Quoted,
        }
    }
}

/// Kinds written without quotes.
fn is_bare(tag: ArgType) -> bool {
    matches!(
        tag,
        ArgType::Bool
            | ArgType::U8
            | ArgType::I8
            | ArgType::I16
            | ArgType::U16
            | ArgType::I32
            | ArgType::U32
            | ArgType::I64
            | ArgType::U64
            | ArgType::I128
            | ArgType::U128
            | ArgType::Usize
            | ArgType::Isize
            | ArgType::F32
            | ArgType::F64
            | ArgType::Decimal
    )
}

impl LogMessage {
    /// Renders the fields collected by a previous
    /// [`render_utf8`](Self::render_utf8) call as UTF-8.
    ///
    /// Writes nothing when `list` is empty. Returns the number of bytes
    /// written.
    pub fn render_key_values_utf8(&self, list: &KeyValueList, out: &mut [u8], settings: &RenderSettings) -> usize {
        let mut out = Utf8Output::new(out);
        self.write_key_values(list, &mut out, settings);
        out.len()
    }

    /// UTF-16 counterpart of [`render_key_values_utf8`](Self::render_key_values_utf8).
    pub fn render_key_values_utf16(&self, list: &KeyValueList, out: &mut [u16], settings: &RenderSettings) -> usize {
        let mut out = Utf16Output::new(out);
        self.write_key_values(list, &mut out, settings);
        out.len()
    }

    /// Writes the separator and the JSON object.
    ///
    /// If the block doesn't fit, it is dropped entirely and the truncation
    /// suffix is written instead. Returns `false` in that case.
    pub(crate) fn write_key_values<O: Output>(&self, list: &KeyValueList, out: &mut O, settings: &RenderSettings) -> bool {
        if list.is_empty() {
            return true;
        }

        let mark = out.len();
        match self.write_object(list, out, settings) {
            Ok(()) => true,
            Err(fmt::Error) => {
                out.rewind(mark);
                output::write_truncated_suffix(out, &settings.truncated_suffix);
                false
            }
        }
    }

    fn write_object<O: Output>(&self, list: &KeyValueList, out: &mut O, settings: &RenderSettings) -> fmt::Result {
        let data = self.encoded();
        out.write_str(&settings.key_value_separator)?;
        out.write_str("{ ")?;

        let mut written = 0;
        for offset in list.iter() {
            let mut cursor = Cursor::at(data, offset);
            let Some(header) = self.read_header(&mut cursor, true) else { continue };
            if header.tag != ArgType::KeyString {
                continue;
            }
            let Some(key) = cursor.u8().and_then(|index| self.string_at(index)) else { continue };
            let Some(value) = self.read_header(&mut cursor, true) else { continue };

            if written > 0 {
                out.write_str(", ")?;
            }
            out.write_char('"')?;
            JsonEscape::new(out).write_str(key)?;
            out.write_str("\": ")?;

            match JsonValue::classify(value.tag, cursor) {
                JsonValue::Null => out.write_str("null")?,
                JsonValue::Bare => {
                    self.render_value(&value, &mut cursor, out, settings)?;
                }
                JsonValue::Quoted => {
                    out.write_char('"')?;
                    self.render_value(&value, &mut cursor, &mut JsonEscape::new(out), settings)?;
                    out.write_char('"')?;
                }
            }
            written += 1;
        }

        out.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use crate::message::{RenderOptions, StrSpan};

    fn render_both(message: &LogMessage, size: usize) -> (String, String) {
        render_with(message, size, &RenderSettings::default())
    }

    fn render_with(message: &LogMessage, size: usize, settings: &RenderSettings) -> (String, String) {
        let mut list = KeyValueList::new();
        let mut text = vec![0u8; size];
        let text_len = message.render_utf8(
            &mut text,
            settings,
            RenderOptions {
                key_values: Some(&mut list),
                skip_format_strings: false,
            },
        );
        let mut fields = vec![0u8; size];
        let fields_len = message.render_key_values_utf8(&list, &mut fields, settings);
        (
            String::from_utf8(text[..text_len].to_vec()).unwrap(),
            String::from_utf8(fields[..fields_len].to_vec()).unwrap(),
        )
    }

    #[test]
    fn test_bare_and_quoted_values() {
        let mut msg = LogMessage::with_capacity(256, 16);
        msg.initialize(None, LogLevel::Info);
        msg.append("done")
            .append_key_value("ok", true)
            .append_key_value("count", 3u32)
            .append_key_value("name", "a\"b")
            .append_key_value("missing", None::<i32>);

        let (text, fields) = render_both(&msg, 256);
        assert_eq!(text, "done");
        assert_eq!(
            fields,
            r#" ~~ { "ok": true, "count": 3, "name": "a\"b", "missing": null }"#
        );
    }

    #[test]
    fn test_spans_are_escaped() {
        let mut msg = LogMessage::with_capacity(256, 4);
        msg.initialize(None, LogLevel::Info);
        msg.append_key_value("path", StrSpan("C:\\tmp\n"));

        let (_, fields) = render_both(&msg, 256);
        assert_eq!(fields, r#" ~~ { "path": "C:\\tmp\n" }"#);
    }

    #[test]
    fn test_block_dropped_when_it_does_not_fit() {
        let mut msg = LogMessage::with_capacity(256, 4);
        msg.initialize(None, LogLevel::Info);
        msg.append_key_value("key", "a fairly long value");

        let (_, fields) = render_both(&msg, 16);
        assert_eq!(fields, " [TRUNCATED]");
    }

    #[test]
    fn test_no_fields_writes_nothing() {
        let mut msg = LogMessage::with_capacity(64, 4);
        msg.initialize(None, LogLevel::Info);
        msg.append("plain");

        let (text, fields) = render_both(&msg, 64);
        assert_eq!(text, "plain");
        assert_eq!(fields, "");
    }

    #[test]
    fn test_null_field_ignores_null_display() {
        let settings = RenderSettings {
            null_display: "<none>".to_string(),
            ..RenderSettings::default()
        };
        let mut msg = LogMessage::with_capacity(64, 4);
        msg.initialize(None, LogLevel::Info);
        msg.append(None::<i32>).append_key_value("k", None::<i32>);

        let (text, fields) = render_with(&msg, 64, &settings);
        assert_eq!(text, "<none>");
        assert_eq!(fields, r#" ~~ { "k": null }"#);
    }

    #[test]
    fn test_non_finite_floats_are_quoted() {
        let mut msg = LogMessage::with_capacity(128, 8);
        msg.initialize(None, LogLevel::Info);
        msg.append_key_value("nan", f64::NAN)
            .append_key_value("inf", f32::INFINITY)
            .append_key_value("ratio", 0.5f64);

        let (_, fields) = render_both(&msg, 128);
        assert_eq!(fields, r#" ~~ { "nan": "NaN", "inf": "inf", "ratio": 0.5 }"#);
    }
}
