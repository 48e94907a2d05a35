//! Render side of [`LogMessage`].
//!
//! The renderer walks exactly the bytes the encoder produced and turns each
//! entry into text. Output buffers are fixed-size: an entry that doesn't fit
//! is rolled back, rendering stops, and the truncation suffix is written.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::arg_type::{ArgType, FORMAT_FLAG};
use super::number_format::{self, Integer};
use super::output::{self, Output, Utf16Output, Utf8Output};
use super::{LogMessage, RenderOptions};
use crate::config::RenderSettings;
use crate::registry::TypeToken;

/// Read cursor over the encoded bytes.
///
/// Reads past the end return `None`, which stops the walk.
#[derive(Clone, Copy)]
pub(super) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(super) fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(super) fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    pub(super) fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    pub(super) fn u8(&mut self) -> Option<u8> {
        Some(self.array::<1>()?[0])
    }

    pub(super) fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }
}

/// An entry tag with its format string already resolved.
pub(super) struct Header<'m> {
    pub(super) tag: ArgType,
    pub(super) format: Option<&'m str>,
}

/// Outcome of rendering one entry.
enum Step {
    Continue,
    Stop,
}

impl LogMessage {
    /// Renders the message text as UTF-8 into `out`.
    ///
    /// Returns the number of bytes written, never more than `out.len()`.
    /// When `options.key_values` is set, the structured fields met on the
    /// way are collected for [`render_key_values_utf8`](Self::render_key_values_utf8).
    pub fn render_utf8(&self, out: &mut [u8], settings: &RenderSettings, options: RenderOptions<'_>) -> usize {
        let mut out = Utf8Output::new(out);
        self.render_into(&mut out, settings, options);
        out.len()
    }

    /// Renders the message text as UTF-16 code units into `out`.
    pub fn render_utf16(&self, out: &mut [u16], settings: &RenderSettings, options: RenderOptions<'_>) -> usize {
        let mut out = Utf16Output::new(out);
        self.render_into(&mut out, settings, options);
        out.len()
    }

    /// Primary rendering pass. Returns `false` when the output filled up.
    pub(crate) fn render_into<O: Output>(
        &self,
        out: &mut O,
        settings: &RenderSettings,
        mut options: RenderOptions<'_>,
    ) -> bool {
        let data = self.encoded();
        let mut cursor = Cursor::new(data);

        if let Some(list) = options.key_values.as_deref_mut() {
            list.clear();
        }

        while !cursor.is_empty() {
            let entry_start = cursor.pos;
            let mark = out.len();
            match self.render_entry(&mut cursor, entry_start, out, settings, &mut options) {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => break,
                Err(fmt::Error) => {
                    out.rewind(mark);
                    output::write_truncated_suffix(out, &settings.truncated_suffix);
                    return false;
                }
            }
        }

        if self.truncated {
            output::write_truncated_suffix(out, &settings.truncated_suffix);
        }
        true
    }

    fn render_entry<O: Output>(
        &self,
        cursor: &mut Cursor<'_>,
        entry_start: usize,
        out: &mut O,
        settings: &RenderSettings,
        options: &mut RenderOptions<'_>,
    ) -> Result<Step, fmt::Error> {
        let Some(header) = self.read_header(cursor, options.skip_format_strings) else {
            return Ok(Step::Stop);
        };

        match header.tag {
            ArgType::EndOfTruncatedMessage => Ok(Step::Stop),
            ArgType::KeyString => {
                if cursor.u8().is_none() || skip_entry(cursor).is_none() {
                    return Ok(Step::Stop);
                }
                if let Some(list) = options.key_values.as_deref_mut() {
                    list.push(entry_start);
                }
                Ok(Step::Continue)
            }
            _ => match self.render_value(&header, cursor, out, settings)? {
                Some(()) => Ok(Step::Continue),
                None => Ok(Step::Stop),
            },
        }
    }

    /// Reads a tag byte and its optional format index.
    pub(super) fn read_header(&self, cursor: &mut Cursor<'_>, skip_format: bool) -> Option<Header<'_>> {
        let raw = cursor.u8()?;
        let tag = ArgType::from_u8(raw & !FORMAT_FLAG)?;
        let format = if raw & FORMAT_FLAG != 0 {
            let index = cursor.u8()?;
            self.string_at(index).filter(|_| !skip_format)
        } else {
            None
        };
        Some(Header { tag, format })
    }

    /// Renders one value entry.
    ///
    /// `Ok(None)` means the encoded bytes ended early; `Err` means the
    /// output ran out of room.
    pub(super) fn render_value<O: Output>(
        &self,
        header: &Header<'_>,
        cursor: &mut Cursor<'_>,
        out: &mut O,
        settings: &RenderSettings,
    ) -> Result<Option<()>, fmt::Error> {
        let format = header.format;

        macro_rules! int {
            ($ty:ty, $variant:ident, $wide:ty, $bits:expr) => {{
                let Some(bytes) = cursor.array() else { return Ok(None) };
                let value = <$ty>::from_le_bytes(bytes);
                number_format::write_integer(out, Integer::$variant(value as $wide), $bits, format)?;
            }};
        }

        match header.tag {
            ArgType::Null => out.write_str(&settings.null_display)?,
            ArgType::String => {
                let Some(index) = cursor.u8() else { return Ok(None) };
                if let Some(text) = self.string_at(index) {
                    out.write_str(text)?;
                }
            }
            ArgType::StrSpan => {
                let Some(bytes) = read_span(cursor) else { return Ok(None) };
                match std::str::from_utf8(bytes) {
                    Ok(text) => out.write_str(text)?,
                    Err(err) => {
                        let valid = &bytes[..err.valid_up_to()];
                        out.write_str(std::str::from_utf8(valid).unwrap_or_default())?;
                    }
                }
            }
            ArgType::AsciiSpan => {
                let Some(bytes) = read_span(cursor) else { return Ok(None) };
                for &byte in bytes {
                    out.write_char(if byte.is_ascii() { char::from(byte) } else { '?' })?;
                }
            }
            ArgType::Bool => {
                let Some(byte) = cursor.u8() else { return Ok(None) };
                out.write_str(if byte != 0 { "true" } else { "false" })?;
            }
            ArgType::Char => {
                let Some(raw) = cursor.u32() else { return Ok(None) };
                out.write_char(char::from_u32(raw).unwrap_or(char::REPLACEMENT_CHARACTER))?;
            }
            ArgType::U8 => int!(u8, Unsigned, u128, 8),
            ArgType::I8 => int!(i8, Signed, i128, 8),
            ArgType::I16 => int!(i16, Signed, i128, 16),
            ArgType::U16 => int!(u16, Unsigned, u128, 16),
            ArgType::I32 => int!(i32, Signed, i128, 32),
            ArgType::U32 => int!(u32, Unsigned, u128, 32),
            ArgType::I64 | ArgType::Isize => int!(i64, Signed, i128, 64),
            ArgType::U64 | ArgType::Usize => int!(u64, Unsigned, u128, 64),
            ArgType::I128 => int!(i128, Signed, i128, 128),
            ArgType::U128 => int!(u128, Unsigned, u128, 128),
            ArgType::F32 => {
                let Some(bytes) = cursor.array() else { return Ok(None) };
                number_format::write_float(out, f32::from_le_bytes(bytes), format)?;
            }
            ArgType::F64 => {
                let Some(bytes) = cursor.array() else { return Ok(None) };
                number_format::write_float(out, f64::from_le_bytes(bytes), format)?;
            }
            ArgType::Decimal => {
                let Some(bytes) = cursor.array() else { return Ok(None) };
                number_format::write_decimal(out, Decimal::deserialize(bytes), format)?;
            }
            ArgType::Guid => {
                let Some(bytes) = cursor.array() else { return Ok(None) };
                number_format::write_uuid(out, Uuid::from_bytes(bytes), format)?;
            }
            ArgType::DateTime | ArgType::DateTimeUtc => {
                let (Some(secs), Some(nanos)) = (cursor.array(), cursor.u32()) else {
                    return Ok(None);
                };
                let Some(value) = DateTime::<Utc>::from_timestamp(i64::from_le_bytes(secs), nanos) else {
                    return Ok(None);
                };
                if header.tag == ArgType::DateTime {
                    number_format::write_datetime(out, &value.naive_utc(), format)?;
                } else {
                    number_format::write_datetime(out, &value, format)?;
                }
            }
            ArgType::Date => {
                let Some(bytes) = cursor.array() else { return Ok(None) };
                let Some(date) = NaiveDate::from_num_days_from_ce_opt(i32::from_le_bytes(bytes)) else {
                    return Ok(None);
                };
                number_format::write_datetime(out, &date, format)?;
            }
            ArgType::Time => {
                let (Some(secs), Some(nanos)) = (cursor.u32(), cursor.u32()) else {
                    return Ok(None);
                };
                let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) else {
                    return Ok(None);
                };
                number_format::write_datetime(out, &time, format)?;
            }
            ArgType::TimeDelta => {
                let (Some(secs), Some(nanos)) = (cursor.array(), cursor.array()) else {
                    return Ok(None);
                };
                number_format::write_time_delta(out, i64::from_le_bytes(secs), i32::from_le_bytes(nanos))?;
            }
            ArgType::Enum | ArgType::SignedEnum => {
                let (Some(token), Some(bits)) = (cursor.array(), cursor.array()) else {
                    return Ok(None);
                };
                let signed = header.tag == ArgType::SignedEnum;
                self.write_enum(out, TypeToken::from_le_bytes(token), u64::from_le_bytes(bits), signed, format)?;
            }
            ArgType::Unmanaged => {
                let Some(token) = cursor.array() else { return Ok(None) };
                let Some(raw) = read_span(cursor) else { return Ok(None) };
                self.write_unmanaged(out, TypeToken::from_le_bytes(token), raw, format)?;
            }
            ArgType::KeyString | ArgType::EndOfTruncatedMessage => return Ok(None),
        }

        Ok(Some(()))
    }

    fn write_enum<O: Output>(
        &self,
        out: &mut O,
        token: TypeToken,
        bits: u64,
        signed: bool,
        format: Option<&str>,
    ) -> fmt::Result {
        let numeric = if signed {
            Integer::Signed(i128::from(bits as i64))
        } else {
            Integer::Unsigned(u128::from(bits))
        };

        match format {
            Some("D") | Some("d") => number_format::write_integer(out, numeric, 64, None),
            Some(f) if f.starts_with(|c| c == 'X' || c == 'x') => number_format::write_integer(out, numeric, 64, Some(f)),
            _ => match self.registry.enum_name(token, bits) {
                Some(name) => out.write_str(name),
                None => number_format::write_integer(out, numeric, 64, None),
            },
        }
    }

    /// Runs the registered formatter, falling back to a hex dump when there
    /// is none or it panics.
    fn write_unmanaged<O: Output>(&self, out: &mut O, token: TypeToken, raw: &[u8], format: Option<&str>) -> fmt::Result {
        let mark = out.len();
        if let Some(formatter) = self.registry.unmanaged_formatter(token) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| formatter(raw, &mut *out, format)));
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(fmt::Error),
                Err(_) => {
                    tracing::debug!(?token, "unmanaged formatter panicked, using hex dump");
                    out.rewind(mark);
                }
            }
        }
        number_format::write_unmanaged_hex(out, raw)
    }
}

fn read_span<'a>(cursor: &mut Cursor<'a>) -> Option<&'a [u8]> {
    let len = cursor.u32()? as usize;
    cursor.take(len)
}

/// Steps over one entry without rendering it.
pub(super) fn skip_entry(cursor: &mut Cursor<'_>) -> Option<()> {
    let raw = cursor.u8()?;
    let tag = ArgType::from_u8(raw & !FORMAT_FLAG)?;
    if raw & FORMAT_FLAG != 0 {
        cursor.u8()?;
    }

    if let Some(size) = tag.fixed_size() {
        cursor.take(size)?;
        return Some(());
    }

    match tag {
        ArgType::String => {
            cursor.u8()?;
        }
        ArgType::StrSpan | ArgType::AsciiSpan => {
            read_span(cursor)?;
        }
        ArgType::Unmanaged => {
            cursor.take(TypeToken::ENCODED_SIZE)?;
            read_span(cursor)?;
        }
        ArgType::KeyString => {
            cursor.u8()?;
            skip_entry(cursor)?;
        }
        _ => {}
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use crate::message::KeyValueList;

    fn message(buffer: usize, strings: usize) -> LogMessage {
        let mut message = LogMessage::with_capacity(buffer, strings);
        message.initialize(None, LogLevel::Info);
        message
    }

    fn render(message: &LogMessage, size: usize) -> String {
        let mut buf = vec![0u8; size];
        let len = message.render_utf8(&mut buf, &RenderSettings::default(), RenderOptions::default());
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_skip_entry_matches_encoding() {
        let mut msg = message(256, 8);
        msg.append_formatted(12u16, "X")
            .append_str_span("span")
            .append("text")
            .append_key_value("k", 5i64)
            .append(None::<u8>);

        let mut cursor = Cursor::new(msg.encoded());
        let mut entries = 0;
        while !cursor.is_empty() {
            skip_entry(&mut cursor).unwrap();
            entries += 1;
        }
        assert_eq!(entries, 5);
        assert_eq!(cursor.pos, msg.encoded_len());
    }

    #[test]
    fn test_entry_rolled_back_when_output_full() {
        let mut msg = message(256, 8);
        msg.append("abc").append(123456u32);

        let settings = RenderSettings {
            truncated_suffix: "~".to_string(),
            ..RenderSettings::default()
        };
        let mut buf = [0u8; 6];
        let len = msg.render_utf8(&mut buf, &settings, RenderOptions::default());
        assert_eq!(&buf[..len], b"abc~");
    }

    #[test]
    fn test_render_utf16() {
        let mut msg = message(64, 4);
        msg.append("é=").append(1.5f64);

        let mut buf = [0u16; 16];
        let len = msg.render_utf16(&mut buf, &RenderSettings::default(), RenderOptions::default());
        assert_eq!(String::from_utf16(&buf[..len]).unwrap(), "é=1.5");
    }

    #[test]
    fn test_key_values_collected_in_order() {
        let mut msg = message(256, 8);
        msg.append("a").append_key_value("x", 1u8).append("b").append_key_value("y", true);

        let mut list = KeyValueList::new();
        let mut buf = [0u8; 64];
        let len = msg.render_utf8(
            &mut buf,
            &RenderSettings::default(),
            RenderOptions {
                key_values: Some(&mut list),
                skip_format_strings: false,
            },
        );
        assert_eq!(&buf[..len], b"ab");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_skip_format_strings() {
        let mut msg = message(64, 4);
        msg.append_formatted(255u32, "X4");

        let mut buf = [0u8; 16];
        let len = msg.render_utf8(
            &mut buf,
            &RenderSettings::default(),
            RenderOptions {
                key_values: None,
                skip_format_strings: true,
            },
        );
        assert_eq!(&buf[..len], b"255");
        assert_eq!(render(&msg, 16), "00FF");
    }

    #[test]
    fn test_empty_message_renders_nothing() {
        let msg = message(16, 1);
        assert_eq!(render(&msg, 16), "");
    }
}
