//! Append side of [`LogMessage`].
//!
//! Every append first checks that the whole entry fits, both in the byte
//! buffer and in the string table. If it doesn't, the record is truncated
//! and the value is dropped. Spans are the exception: they copy the prefix
//! that fits before truncating.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::arg_type::{ArgType, FORMAT_FLAG};
use super::{LogMessage, SharedStr};
use crate::registry::{LogEnum, TypeToken, Unmanaged};

const SPAN_HEADER: usize = 1 + 4;

/// Space an entry needs, tag byte included.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub struct Footprint {
    bytes: usize,
    strings: usize,
    formatted: bool,
}

impl Footprint {
    const fn scalar(payload: usize) -> Self {
        Self {
            bytes: 1 + payload,
            strings: 0,
            formatted: true,
        }
    }

    const fn plain(payload: usize, strings: usize) -> Self {
        Self {
            bytes: 1 + payload,
            strings,
            formatted: false,
        }
    }
}

/// Writes one entry into space already reserved for it.
#[doc(hidden)]
pub struct EntryWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    strings: &'a mut Vec<SharedStr>,
    format: Option<u8>,
}

impl<'a> EntryWriter<'a> {
    /// Writes the tag, carrying the pending format index if there is one.
    #[inline]
    pub(crate) fn tag(&mut self, tag: ArgType) {
        match self.format.take() {
            Some(index) => {
                self.put(&[tag as u8 | FORMAT_FLAG, index]);
            }
            None => self.put(&[tag as u8]),
        }
    }

    #[inline]
    pub(crate) fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    /// Hands out the next `len` bytes, zeroed.
    pub(crate) fn reserve(&mut self, len: usize) -> &mut [u8] {
        let start = self.pos;
        self.pos += len;
        let slice = &mut self.buf[start..self.pos];
        slice.fill(0);
        slice
    }

    /// Pushes `value` into the string table and writes its index.
    pub(crate) fn put_string(&mut self, value: SharedStr) {
        let index = self.strings.len() as u8;
        self.strings.push(value);
        self.put(&[index]);
    }

    fn set_format(&mut self, format: &'static str) {
        self.format = Some(self.strings.len() as u8);
        self.strings.push(SharedStr::Static(format));
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A value that can be appended to a [`LogMessage`].
///
/// Implemented for the primitive numbers, `bool`, `char`, static and shared
/// strings, `Decimal`, `Uuid`, the chrono date/time types and `Option` of
/// any of them, plus the [`StrSpan`], [`AsciiSpan`], [`AsciiChars`],
/// [`EnumArg`] and [`UnmanagedArg`] wrappers.
pub trait Appendable: sealed::Sealed {
    #[doc(hidden)]
    fn footprint(&self) -> Footprint;

    #[doc(hidden)]
    fn encode(&self, entry: &mut EntryWriter<'_>);

    #[doc(hidden)]
    fn append_to(&self, message: &mut LogMessage, format: Option<&'static str>) {
        message.append_entry(self, format);
    }
}

/// Values that accept a format string.
pub trait Formattable: Appendable {}

macro_rules! appendable_le {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Appendable for $ty {
                #[inline]
                fn footprint(&self) -> Footprint {
                    Footprint::scalar(std::mem::size_of::<$ty>())
                }

                #[inline]
                fn encode(&self, entry: &mut EntryWriter<'_>) {
                    entry.tag(ArgType::$tag);
                    entry.put(&self.to_le_bytes());
                }
            }

            impl Formattable for $ty {}
        )*
    };
}

appendable_le!(
    u8 => U8,
    i8 => I8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    i128 => I128,
    u128 => U128,
    f32 => F32,
    f64 => F64,
);

impl sealed::Sealed for usize {}

impl Appendable for usize {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(8)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Usize);
        entry.put(&(*self as u64).to_le_bytes());
    }
}

impl Formattable for usize {}

impl sealed::Sealed for isize {}

impl Appendable for isize {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(8)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Isize);
        entry.put(&(*self as i64).to_le_bytes());
    }
}

impl Formattable for isize {}

impl sealed::Sealed for bool {}

impl Appendable for bool {
    fn footprint(&self) -> Footprint {
        Footprint::plain(1, 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Bool);
        entry.put(&[u8::from(*self)]);
    }
}

impl sealed::Sealed for char {}

impl Appendable for char {
    fn footprint(&self) -> Footprint {
        Footprint::plain(4, 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Char);
        entry.put(&u32::from(*self).to_le_bytes());
    }
}

impl sealed::Sealed for Decimal {}

impl Appendable for Decimal {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(16)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Decimal);
        entry.put(&self.serialize());
    }
}

impl Formattable for Decimal {}

impl sealed::Sealed for Uuid {}

impl Appendable for Uuid {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(16)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Guid);
        entry.put(self.as_bytes());
    }
}

impl Formattable for Uuid {}

fn put_instant(entry: &mut EntryWriter<'_>, tag: ArgType, value: DateTime<Utc>) {
    entry.tag(tag);
    entry.put(&value.timestamp().to_le_bytes());
    entry.put(&value.timestamp_subsec_nanos().to_le_bytes());
}

impl sealed::Sealed for NaiveDateTime {}

impl Appendable for NaiveDateTime {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(12)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        put_instant(entry, ArgType::DateTime, self.and_utc());
    }
}

impl Formattable for NaiveDateTime {}

impl sealed::Sealed for DateTime<Utc> {}

impl Appendable for DateTime<Utc> {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(12)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        put_instant(entry, ArgType::DateTimeUtc, *self);
    }
}

impl Formattable for DateTime<Utc> {}

impl sealed::Sealed for NaiveDate {}

impl Appendable for NaiveDate {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(4)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        use chrono::Datelike;
        entry.tag(ArgType::Date);
        entry.put(&self.num_days_from_ce().to_le_bytes());
    }
}

impl Formattable for NaiveDate {}

impl sealed::Sealed for NaiveTime {}

impl Appendable for NaiveTime {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(8)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::Time);
        entry.put(&self.num_seconds_from_midnight().to_le_bytes());
        entry.put(&self.nanosecond().to_le_bytes());
    }
}

impl Formattable for NaiveTime {}

impl sealed::Sealed for TimeDelta {}

impl Appendable for TimeDelta {
    fn footprint(&self) -> Footprint {
        Footprint::plain(12, 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::TimeDelta);
        entry.put(&self.num_seconds().to_le_bytes());
        entry.put(&self.subsec_nanos().to_le_bytes());
    }
}

impl sealed::Sealed for &'static str {}

impl Appendable for &'static str {
    fn footprint(&self) -> Footprint {
        Footprint::plain(1, 1)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::String);
        entry.put_string(SharedStr::Static(self));
    }
}

impl sealed::Sealed for Arc<str> {}

impl Appendable for Arc<str> {
    fn footprint(&self) -> Footprint {
        Footprint::plain(1, 1)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::String);
        entry.put_string(SharedStr::Shared(Arc::clone(self)));
    }
}

impl sealed::Sealed for SharedStr {}

impl Appendable for SharedStr {
    fn footprint(&self) -> Footprint {
        Footprint::plain(1, 1)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::String);
        entry.put_string(self.clone());
    }
}

impl<T: Appendable> sealed::Sealed for Option<T> {}

/// `None` is written as a bare null tag, without its format string.
impl<T: Appendable> Appendable for Option<T> {
    fn footprint(&self) -> Footprint {
        match self {
            Some(value) => value.footprint(),
            None => Footprint::plain(0, 0),
        }
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        match self {
            Some(value) => value.encode(entry),
            None => entry.tag(ArgType::Null),
        }
    }

    fn append_to(&self, message: &mut LogMessage, format: Option<&'static str>) {
        match self {
            Some(value) => value.append_to(message, format),
            None => message.append_entry(self, None),
        }
    }
}

impl<T: Formattable> Formattable for Option<T> {}

/// Borrowed UTF-8 text copied into the buffer.
#[derive(Debug, Clone, Copy)]
pub struct StrSpan<'a>(pub &'a str);

impl sealed::Sealed for StrSpan<'_> {}

impl Appendable for StrSpan<'_> {
    fn footprint(&self) -> Footprint {
        Footprint::plain(4 + self.0.len(), 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::StrSpan);
        entry.put(&(self.0.len() as u32).to_le_bytes());
        entry.put(self.0.as_bytes());
    }

    fn append_to(&self, message: &mut LogMessage, _format: Option<&'static str>) {
        let text = self.0;
        message.append_span(
            ArgType::StrSpan,
            text.len(),
            |room| floor_char_boundary(text, room),
            |dst| dst.copy_from_slice(&text.as_bytes()[..dst.len()]),
        );
    }
}

/// Raw ASCII bytes copied 1:1; non-ASCII bytes render as `?`.
#[derive(Debug, Clone, Copy)]
pub struct AsciiSpan<'a>(pub &'a [u8]);

impl sealed::Sealed for AsciiSpan<'_> {}

impl Appendable for AsciiSpan<'_> {
    fn footprint(&self) -> Footprint {
        Footprint::plain(4 + self.0.len(), 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::AsciiSpan);
        entry.put(&(self.0.len() as u32).to_le_bytes());
        entry.put(self.0);
    }

    fn append_to(&self, message: &mut LogMessage, _format: Option<&'static str>) {
        let bytes = self.0;
        message.append_span(
            ArgType::AsciiSpan,
            bytes.len(),
            |room| room,
            |dst| dst.copy_from_slice(&bytes[..dst.len()]),
        );
    }
}

/// ASCII characters, one byte each; anything wider is stored as `?`.
#[derive(Debug, Clone, Copy)]
pub struct AsciiChars<'a>(pub &'a [char]);

fn ascii_byte(ch: char) -> u8 {
    if ch.is_ascii() {
        ch as u8
    } else {
        b'?'
    }
}

fn fill_ascii(chars: &[char], dst: &mut [u8]) {
    for (byte, ch) in dst.iter_mut().zip(chars) {
        *byte = ascii_byte(*ch);
    }
}

impl sealed::Sealed for AsciiChars<'_> {}

impl Appendable for AsciiChars<'_> {
    fn footprint(&self) -> Footprint {
        Footprint::plain(4 + self.0.len(), 0)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        entry.tag(ArgType::AsciiSpan);
        entry.put(&(self.0.len() as u32).to_le_bytes());
        fill_ascii(self.0, entry.reserve(self.0.len()));
    }

    fn append_to(&self, message: &mut LogMessage, _format: Option<&'static str>) {
        let chars = self.0;
        message.append_span(ArgType::AsciiSpan, chars.len(), |room| room, |dst| {
            fill_ascii(chars, dst)
        });
    }
}

/// An enum value whose name is resolved at render time.
#[derive(Debug, Clone, Copy)]
pub struct EnumArg<T>(pub T);

impl<T: LogEnum> sealed::Sealed for EnumArg<T> {}

impl<T: LogEnum> Appendable for EnumArg<T> {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(TypeToken::ENCODED_SIZE + 8)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        let token = TypeToken::of::<T>();
        entry.tag(if T::SIGNED { ArgType::SignedEnum } else { ArgType::Enum });
        entry.put(&token.to_le_bytes());
        entry.put(&self.0.to_bits().to_le_bytes());
    }
}

impl<T: LogEnum> Formattable for EnumArg<T> {}

/// A fixed-layout value copied as raw bytes, formatted at render time.
#[derive(Debug, Clone, Copy)]
pub struct UnmanagedArg<'a, T>(pub &'a T);

impl<T: Unmanaged> sealed::Sealed for UnmanagedArg<'_, T> {}

impl<T: Unmanaged> Appendable for UnmanagedArg<'_, T> {
    fn footprint(&self) -> Footprint {
        Footprint::scalar(TypeToken::ENCODED_SIZE + 4 + T::SIZE)
    }

    fn encode(&self, entry: &mut EntryWriter<'_>) {
        let token = TypeToken::of::<T>();
        entry.tag(ArgType::Unmanaged);
        entry.put(&token.to_le_bytes());
        entry.put(&(T::SIZE as u32).to_le_bytes());
        self.0.write_raw(entry.reserve(T::SIZE));
    }
}

impl<T: Unmanaged> Formattable for UnmanagedArg<'_, T> {}

/// Largest char boundary of `text` at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl LogMessage {
    /// Appends a value.
    ///
    /// Static strings go through the string table; use
    /// [`append_str_span`](Self::append_str_span) for borrowed text.
    #[inline]
    pub fn append<T: Appendable>(&mut self, value: T) -> &mut Self {
        value.append_to(self, None);
        self
    }

    /// Appends a value with a format string, e.g. `"X8"`, `"N2"` or a
    /// strftime pattern for date/time values.
    #[inline]
    pub fn append_formatted<T: Formattable>(&mut self, value: T, format: &'static str) -> &mut Self {
        value.append_to(self, Some(format));
        self
    }

    /// Copies `text` into the buffer, keeping the prefix that fits.
    pub fn append_str_span(&mut self, text: &str) -> &mut Self {
        self.append(StrSpan(text))
    }

    /// Copies ASCII bytes into the buffer, keeping the prefix that fits.
    pub fn append_ascii(&mut self, bytes: &[u8]) -> &mut Self {
        self.append(AsciiSpan(bytes))
    }

    /// Copies ASCII characters into the buffer, keeping the prefix that fits.
    pub fn append_ascii_chars(&mut self, chars: &[char]) -> &mut Self {
        self.append(AsciiChars(chars))
    }

    pub fn append_enum<T: LogEnum>(&mut self, value: T) -> &mut Self {
        self.append(EnumArg(value))
    }

    /// Format strings for enums: `G` (name, the default), `D` (number),
    /// `X` (hex).
    pub fn append_enum_formatted<T: LogEnum>(&mut self, value: T, format: &'static str) -> &mut Self {
        self.append_formatted(EnumArg(value), format)
    }

    pub fn append_unmanaged<T: Unmanaged>(&mut self, value: &T) -> &mut Self {
        self.append(UnmanagedArg(value))
    }

    pub fn append_unmanaged_formatted<T: Unmanaged>(
        &mut self,
        value: &T,
        format: &'static str,
    ) -> &mut Self {
        self.append_formatted(UnmanagedArg(value), format)
    }

    /// Appends a structured field.
    ///
    /// Fields are left out of the message text and rendered as a JSON
    /// object after it. The key and the value are written together or not
    /// at all.
    pub fn append_key_value<K, T>(&mut self, key: K, value: T) -> &mut Self
    where
        K: Into<SharedStr>,
        T: Appendable,
    {
        if self.truncated {
            return self;
        }

        let value_footprint = value.footprint();
        let bytes = 2 + value_footprint.bytes;
        let strings = 1 + value_footprint.strings;
        if !self.has_room(bytes, strings) {
            self.truncate();
            return self;
        }

        let mut entry = self.entry_writer(bytes);
        entry.tag(ArgType::KeyString);
        entry.put_string(key.into());
        value.encode(&mut entry);
        debug_assert_eq!(entry.pos, bytes);
        self.position += bytes;
        self
    }

    /// Appends an explicit null.
    pub fn append_null(&mut self) -> &mut Self {
        self.append(None::<bool>)
    }

    /// Marks the record as truncated.
    ///
    /// The first call writes an end marker if a byte is left and sets the
    /// sticky flag; later calls do nothing.
    pub fn truncate(&mut self) {
        if self.truncated {
            return;
        }
        if self.position < self.buffer.len() {
            self.buffer.as_mut_slice()[self.position] = ArgType::EndOfTruncatedMessage as u8;
            self.position += 1;
        }
        self.truncated = true;
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    #[inline]
    fn has_room(&self, bytes: usize, strings: usize) -> bool {
        bytes <= self.remaining() && self.strings.len() + strings <= self.string_capacity
    }

    fn entry_writer(&mut self, bytes: usize) -> EntryWriter<'_> {
        let start = self.position;
        EntryWriter {
            buf: &mut self.buffer.as_mut_slice()[start..start + bytes],
            pos: 0,
            strings: &mut self.strings,
            format: None,
        }
    }

    fn append_entry<T: Appendable + ?Sized>(&mut self, value: &T, format: Option<&'static str>) {
        if self.truncated {
            return;
        }

        let footprint = value.footprint();
        let format = format.filter(|_| footprint.formatted);
        let extra = usize::from(format.is_some());
        let bytes = footprint.bytes + extra;
        if !self.has_room(bytes, footprint.strings + extra) {
            self.truncate();
            return;
        }

        let mut entry = self.entry_writer(bytes);
        if let Some(format) = format {
            entry.set_format(format);
        }
        value.encode(&mut entry);
        debug_assert_eq!(entry.pos, bytes);
        self.position += bytes;
    }

    /// Writes a length-prefixed span, copying what fits.
    ///
    /// `fit` maps the room left to the number of units that can be kept;
    /// `fill` copies that many into the slice it is given.
    fn append_span(
        &mut self,
        tag: ArgType,
        len: usize,
        fit: impl FnOnce(usize) -> usize,
        fill: impl FnOnce(&mut [u8]),
    ) {
        if self.truncated {
            return;
        }

        let remaining = self.remaining();
        let kept = if SPAN_HEADER + len <= remaining {
            len
        } else if remaining > SPAN_HEADER {
            fit(remaining - SPAN_HEADER)
        } else {
            0
        };

        // An empty span still needs room for its header.
        let header_fits = SPAN_HEADER + kept <= remaining;
        if header_fits && (kept > 0 || len == 0) {
            let mut entry = self.entry_writer(SPAN_HEADER + kept);
            entry.tag(tag);
            entry.put(&(kept as u32).to_le_bytes());
            fill(entry.reserve(kept));
            self.position += SPAN_HEADER + kept;
        }

        if !header_fits || kept < len {
            self.truncate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    fn message(buffer: usize, strings: usize) -> LogMessage {
        let mut message = LogMessage::with_capacity(buffer, strings);
        message.initialize(None, LogLevel::Info);
        message
    }

    #[test]
    fn test_scalar_layout() {
        let mut msg = message(64, 4);
        msg.append(7i32);
        assert_eq!(msg.encoded(), &[ArgType::I32 as u8, 7, 0, 0, 0]);
    }

    #[test]
    fn test_format_string_layout() {
        let mut msg = message(64, 4);
        msg.append_formatted(255u8, "X2");
        assert_eq!(
            msg.encoded(),
            &[ArgType::U8 as u8 | FORMAT_FLAG, 0, 255]
        );
        assert_eq!(msg.string_count(), 1);
    }

    #[test]
    fn test_null_drops_format() {
        let mut msg = message(64, 4);
        msg.append_formatted(None::<i32>, "D4");
        assert_eq!(msg.encoded(), &[ArgType::Null as u8]);
        assert_eq!(msg.string_count(), 0);
    }

    #[test]
    fn test_truncation_is_sticky() {
        let mut msg = message(6, 4);
        msg.append(1i32);
        msg.append(2i32);
        assert!(msg.is_truncated());
        assert_eq!(msg.encoded_len(), 6);
        assert_eq!(msg.encoded()[5], ArgType::EndOfTruncatedMessage as u8);

        msg.append(true);
        msg.truncate();
        assert_eq!(msg.encoded_len(), 6);
    }

    #[test]
    fn test_string_table_exhaustion() {
        let mut msg = message(1024, 1);
        msg.append("a").append("b");
        assert!(msg.is_truncated());
        assert_eq!(msg.string_count(), 1);
    }

    #[test]
    fn test_partial_ascii_copy() {
        let mut msg = message(8, 0);
        msg.append_ascii(b"abcdef");
        assert!(msg.is_truncated());
        assert_eq!(msg.encoded_len(), 8);
        assert_eq!(&msg.encoded()[5..], b"abc");
    }

    #[test]
    fn test_partial_str_span_respects_char_boundary() {
        let mut msg = message(8, 0);
        msg.append_str_span("ab€");
        assert!(msg.is_truncated());
        assert_eq!(&msg.encoded()[1..5], &2u32.to_le_bytes());
        assert_eq!(&msg.encoded()[5..7], b"ab");
        assert_eq!(msg.encoded()[7], ArgType::EndOfTruncatedMessage as u8);
    }

    #[test]
    fn test_empty_span_without_room_for_header() {
        let mut msg = message(3, 4);
        msg.append_str_span("").append_ascii(b"").append_ascii_chars(&[]);
        assert!(msg.is_truncated());
        assert_eq!(msg.encoded(), &[ArgType::EndOfTruncatedMessage as u8]);

        let mut empty = LogMessage::empty(crate::registry::TypeRegistry::global());
        empty.initialize(None, LogLevel::Info);
        empty.append_str_span("");
        assert!(empty.is_truncated());
        assert_eq!(empty.encoded_len(), 0);
    }

    #[test]
    fn test_empty_span_with_room() {
        let mut msg = message(8, 0);
        msg.append_str_span("");
        assert!(!msg.is_truncated());
        assert_eq!(msg.encoded(), &[ArgType::StrSpan as u8, 0, 0, 0, 0]);
    }

    #[test]
    fn test_key_value_is_atomic() {
        let mut msg = message(4, 4);
        msg.append_key_value("key", 1u32);
        assert!(msg.is_truncated());
        assert_eq!(msg.encoded(), &[ArgType::EndOfTruncatedMessage as u8]);
        assert_eq!(msg.string_count(), 0);
    }

    #[test]
    fn test_initialize_resets_state() {
        let mut msg = message(5, 1);
        msg.append("x").append(1u64);
        assert!(msg.is_truncated());

        msg.initialize(None, LogLevel::Warn);
        assert!(!msg.is_truncated());
        assert_eq!(msg.encoded_len(), 0);
        assert_eq!(msg.string_count(), 0);
        assert_eq!(msg.level(), LogLevel::Warn);
    }
}
