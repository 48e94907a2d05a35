//! Fixed-capacity text outputs used by the renderer.
//!
//! Every output implements `fmt::Write` with all-or-nothing semantics: a
//! `write_str` that does not fit writes nothing and returns `Err`. The
//! renderer remembers `len()` before each entry and rewinds to it when an
//! entry does not fit, so the output never holds half an entry.

use std::fmt;

pub(crate) trait Output: fmt::Write {
    /// Units written so far (bytes or UTF-16 code units).
    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Drops everything after `len` units.
    fn rewind(&mut self, len: usize);

    /// Largest char boundary at or before `pos`.
    fn char_floor(&self, pos: usize) -> usize;

    /// Units `s` needs in this output.
    fn measure(&self, s: &str) -> usize;

    #[inline]
    fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }
}

/// Writes the truncation suffix.
///
/// The suffix goes after the current text when it fits, otherwise it
/// overwrites the tail of the output. A suffix longer than the whole output
/// is itself cut to fit.
pub(crate) fn write_truncated_suffix<O: Output + ?Sized>(out: &mut O, suffix: &str) {
    let needed = out.measure(suffix);

    if needed <= out.remaining() {
        let _ = out.write_str(suffix);
        return;
    }

    if needed <= out.capacity() {
        let start = out.char_floor(out.capacity() - needed);
        out.rewind(start.min(out.len()));
        let _ = out.write_str(suffix);
        return;
    }

    out.rewind(0);
    for ch in suffix.chars() {
        if out.write_char(ch).is_err() {
            break;
        }
    }
}

/// UTF-8 output over a caller-provided byte buffer.
pub(crate) struct Utf8Output<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Utf8Output<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[cfg(test)]
    pub(crate) fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.buf[..self.len]) {
            Ok(text) => text,
            Err(err) => std::str::from_utf8(&self.buf[..err.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl fmt::Write for Utf8Output<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

impl Output for Utf8Output<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    fn rewind(&mut self, len: usize) {
        self.len = len.min(self.len);
    }

    fn char_floor(&self, mut pos: usize) -> usize {
        pos = pos.min(self.len);
        while pos > 0 && pos < self.len && (self.buf[pos] & 0xC0) == 0x80 {
            pos -= 1;
        }
        pos
    }

    #[inline]
    fn measure(&self, s: &str) -> usize {
        s.len()
    }
}

/// UTF-16 output over a caller-provided code unit buffer.
pub(crate) struct Utf16Output<'a> {
    buf: &'a mut [u16],
    len: usize,
}

impl<'a> Utf16Output<'a> {
    pub(crate) fn new(buf: &'a mut [u16]) -> Self {
        Self { buf, len: 0 }
    }
}

impl fmt::Write for Utf16Output<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.len + self.measure(s) > self.buf.len() {
            return Err(fmt::Error);
        }
        for unit in s.encode_utf16() {
            self.buf[self.len] = unit;
            self.len += 1;
        }
        Ok(())
    }
}

impl Output for Utf16Output<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    fn rewind(&mut self, len: usize) {
        self.len = len.min(self.len);
    }

    fn char_floor(&self, pos: usize) -> usize {
        let pos = pos.min(self.len);
        if pos > 0 && pos < self.len && (0xDC00..=0xDFFF).contains(&self.buf[pos]) {
            pos - 1
        } else {
            pos
        }
    }

    #[inline]
    fn measure(&self, s: &str) -> usize {
        s.encode_utf16().count()
    }
}

/// Unbounded output backed by a `String`, for diagnostics and `Display`.
pub(crate) struct StringOutput<'a> {
    buf: &'a mut String,
    start: usize,
}

impl<'a> StringOutput<'a> {
    pub(crate) fn new(buf: &'a mut String) -> Self {
        let start = buf.len();
        Self { buf, start }
    }
}

impl fmt::Write for StringOutput<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl Output for StringOutput<'_> {
    fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    fn capacity(&self) -> usize {
        usize::MAX - self.start
    }

    fn rewind(&mut self, len: usize) {
        let target = self.start + len;
        if target < self.buf.len() {
            self.buf.truncate(self.char_floor(len) + self.start);
        }
    }

    fn char_floor(&self, pos: usize) -> usize {
        let mut pos = pos.min(self.len());
        while pos > 0 && !self.buf.is_char_boundary(self.start + pos) {
            pos -= 1;
        }
        pos
    }

    fn measure(&self, s: &str) -> usize {
        s.len()
    }
}

/// Escapes everything written through it as the body of a JSON string.
pub(crate) struct JsonEscape<'a, O: Output + ?Sized> {
    inner: &'a mut O,
}

impl<'a, O: Output + ?Sized> JsonEscape<'a, O> {
    pub(crate) fn new(inner: &'a mut O) -> Self {
        Self { inner }
    }
}

impl<O: Output + ?Sized> fmt::Write for JsonEscape<'_, O> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut plain_start = 0;
        for (index, byte) in s.bytes().enumerate() {
            let escaped = match byte {
                b'"' => "\\\"",
                b'\\' => "\\\\",
                b'\n' => "\\n",
                b'\r' => "\\r",
                b'\t' => "\\t",
                0x08 => "\\b",
                0x0C => "\\f",
                0x00..=0x1F => "",
                _ => continue,
            };

            self.inner.write_str(&s[plain_start..index])?;
            if escaped.is_empty() {
                write!(self.inner, "\\u{:04x}", byte)?;
            } else {
                self.inner.write_str(escaped)?;
            }
            plain_start = index + 1;
        }
        self.inner.write_str(&s[plain_start..])
    }
}

impl<O: Output + ?Sized> Output for JsonEscape<'_, O> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn rewind(&mut self, len: usize) {
        self.inner.rewind(len)
    }

    fn char_floor(&self, pos: usize) -> usize {
        self.inner.char_floor(pos)
    }

    fn measure(&self, s: &str) -> usize {
        self.inner.measure(s)
    }
}

/// Small stack buffer for formatting that may fail or must be post-processed.
pub(crate) struct StackBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> StackBuf<N> {
    pub(crate) fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub(crate) fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl<const N: usize> fmt::Write for StackBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > N {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_utf8_output_all_or_nothing() {
        let mut buf = [0u8; 5];
        let mut out = Utf8Output::new(&mut buf);
        assert!(out.write_str("abc").is_ok());
        assert!(out.write_str("def").is_err());
        assert_eq!(out.as_str(), "abc");
        assert!(out.write_str("de").is_ok());
        assert_eq!(out.as_str(), "abcde");
    }

    #[test]
    fn test_suffix_appended_when_room() {
        let mut buf = [0u8; 16];
        let mut out = Utf8Output::new(&mut buf);
        out.write_str("abc").unwrap();
        write_truncated_suffix(&mut out, " [T]");
        assert_eq!(out.as_str(), "abc [T]");
    }

    #[test]
    fn test_suffix_overwrites_tail() {
        let mut buf = [0u8; 6];
        let mut out = Utf8Output::new(&mut buf);
        out.write_str("abcdef").unwrap();
        write_truncated_suffix(&mut out, " [T]");
        assert_eq!(out.as_str(), "ab [T]");
    }

    #[test]
    fn test_suffix_overwrite_respects_char_boundary() {
        let mut buf = [0u8; 7];
        let mut out = Utf8Output::new(&mut buf);
        out.write_str("aé€").unwrap(); // 1 + 2 + 3 bytes
        write_truncated_suffix(&mut out, "[T]");
        // Cut at byte 4 lands inside '€', so the suffix starts at byte 3
        assert_eq!(out.as_str(), "aé[T]");
    }

    #[test]
    fn test_suffix_longer_than_output() {
        let mut buf = [0u8; 3];
        let mut out = Utf8Output::new(&mut buf);
        out.write_str("xy").unwrap();
        write_truncated_suffix(&mut out, " [TRUNCATED]");
        assert_eq!(out.as_str(), " [T");
    }

    #[test]
    fn test_utf16_output() {
        let mut buf = [0u16; 4];
        let mut out = Utf16Output::new(&mut buf);
        out.write_str("a😀").unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.write_str("bc").is_err());
        assert_eq!(out.char_floor(2), 1);
        assert_eq!(String::from_utf16(&buf[..3]).unwrap(), "a😀");
    }

    #[test]
    fn test_json_escape() {
        let mut text = String::new();
        let mut out = StringOutput::new(&mut text);
        let mut escaped = JsonEscape::new(&mut out);
        escaped.write_str("a\"b\\c\n\u{1}").unwrap();
        assert_eq!(text, "a\\\"b\\\\c\\n\\u0001");
    }

    #[test]
    fn test_stack_buf_overflow() {
        let mut buf = StackBuf::<4>::new();
        assert!(buf.write_str("abcd").is_ok());
        assert!(buf.write_str("e").is_err());
        assert_eq!(buf.as_str(), "abcd");
    }
}
