//! Culture-invariant rendering of numbers and other scalars.
//!
//! Format strings follow the standard numeric specifiers: a letter,
//! optionally followed by a precision (`"X8"`, `"N2"`, `"F"`). Date and time
//! kinds take chrono `strftime` patterns instead. Specifiers a kind does not
//! understand fall back to the kind's default `Display` text, so a bad
//! format string never loses the value.

use std::fmt::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::output::StackBuf;

const MAX_PRECISION: usize = 99;

/// Scratch space for formats whose text is post-processed.
type Scratch = StackBuf<512>;

/// An integer of any supported width.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Integer {
    Signed(i128),
    Unsigned(u128),
}

impl Integer {
    fn is_negative(self) -> bool {
        matches!(self, Integer::Signed(v) if v < 0)
    }

    fn magnitude(self) -> u128 {
        match self {
            Integer::Signed(v) => v.unsigned_abs(),
            Integer::Unsigned(v) => v,
        }
    }

    /// Two's complement bit pattern truncated to `bits`.
    fn bit_pattern(self, bits: u32) -> u128 {
        let raw = match self {
            Integer::Signed(v) => v as u128,
            Integer::Unsigned(v) => v,
        };
        if bits >= 128 {
            raw
        } else {
            raw & ((1u128 << bits) - 1)
        }
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integer::Signed(v) => fmt::Display::fmt(v, f),
            Integer::Unsigned(v) => fmt::Display::fmt(v, f),
        }
    }
}

/// Splits `"N2"` into `('N', Some(2))`.
fn parse_specifier(format: &str) -> Option<(char, Option<usize>)> {
    let mut chars = format.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    let digits = chars.as_str();

    if digits.is_empty() {
        return Some((letter, None));
    }
    if digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let precision = digits.parse::<usize>().ok()?.min(MAX_PRECISION);
    Some((letter, Some(precision)))
}

/// Writes `text` (a plain decimal number) with `,` between thousands.
fn write_grouped(out: &mut dyn Write, text: &str) -> fmt::Result {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (integral, fraction) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };

    out.write_str(sign)?;
    for (index, digit) in integral.chars().enumerate() {
        if index > 0 && (integral.len() - index) % 3 == 0 {
            out.write_char(',')?;
        }
        out.write_char(digit)?;
    }
    out.write_str(fraction)
}

/// Formats through the scratch buffer, falling back when that fails.
///
/// Keeps formatter errors (bad pattern, oversized text) apart from the
/// output running out of room.
fn write_scratch(
    out: &mut dyn Write,
    render: impl FnOnce(&mut Scratch) -> fmt::Result,
    fallback: impl FnOnce(&mut dyn Write) -> fmt::Result,
) -> fmt::Result {
    let mut scratch = Scratch::new();
    match render(&mut scratch) {
        Ok(()) => out.write_str(scratch.as_str()),
        Err(_) => fallback(out),
    }
}

pub(crate) fn write_integer(
    out: &mut dyn Write,
    value: Integer,
    bits: u32,
    format: Option<&str>,
) -> fmt::Result {
    let Some((letter, precision)) = format.and_then(parse_specifier) else {
        return write!(out, "{}", value);
    };

    match letter {
        'D' | 'd' => {
            let width = precision.unwrap_or(0);
            if value.is_negative() {
                out.write_char('-')?;
            }
            write!(out, "{:0width$}", value.magnitude(), width = width)
        }
        'X' => write!(
            out,
            "{:0width$X}",
            value.bit_pattern(bits),
            width = precision.unwrap_or(0)
        ),
        'x' => write!(
            out,
            "{:0width$x}",
            value.bit_pattern(bits),
            width = precision.unwrap_or(0)
        ),
        'N' | 'n' => {
            let mut plain = StackBuf::<48>::new();
            write!(plain, "{}", value)?;
            write_grouped(out, plain.as_str())?;
            write_zero_fraction(out, precision.unwrap_or(2))
        }
        'F' | 'f' => {
            write!(out, "{}", value)?;
            write_zero_fraction(out, precision.unwrap_or(2))
        }
        'E' | 'e' | 'P' | 'p' => write_float_formatted(out, integer_as_f64(value), letter, precision),
        _ => write!(out, "{}", value),
    }
}

fn write_zero_fraction(out: &mut dyn Write, precision: usize) -> fmt::Result {
    if precision == 0 {
        return Ok(());
    }
    write!(out, ".{:0<precision$}", "", precision = precision)
}

fn integer_as_f64(value: Integer) -> f64 {
    match value {
        Integer::Signed(v) => v as f64,
        Integer::Unsigned(v) => v as f64,
    }
}

/// Writes a float. `value` keeps its own `Display` for the default text.
pub(crate) fn write_float<F>(out: &mut dyn Write, value: F, format: Option<&str>) -> fmt::Result
where
    F: fmt::Display + Into<f64> + Copy,
{
    match format.and_then(parse_specifier) {
        Some((letter, precision)) if value.into().is_finite() => {
            write_float_formatted(out, value.into(), letter, precision)
        }
        _ => write!(out, "{}", value),
    }
}

fn write_float_formatted(
    out: &mut dyn Write,
    value: f64,
    letter: char,
    precision: Option<usize>,
) -> fmt::Result {
    match letter {
        'F' | 'f' => write!(out, "{:.*}", precision.unwrap_or(2), value),
        'N' | 'n' => {
            let precision = precision.unwrap_or(2);
            write_scratch(
                out,
                |s| {
                    let mut plain = Scratch::new();
                    write!(plain, "{:.*}", precision, value)?;
                    write_grouped(s, plain.as_str())
                },
                |o| write!(o, "{:.*}", precision, value),
            )
        }
        'E' => write!(out, "{:.*E}", precision.unwrap_or(6), value),
        'e' => write!(out, "{:.*e}", precision.unwrap_or(6), value),
        'P' | 'p' => write!(out, "{:.*} %", precision.unwrap_or(2), value * 100.0),
        _ => write!(out, "{}", value),
    }
}

pub(crate) fn write_decimal(out: &mut dyn Write, value: Decimal, format: Option<&str>) -> fmt::Result {
    let Some((letter, precision)) = format.and_then(parse_specifier) else {
        return write!(out, "{}", value);
    };

    match letter {
        'F' | 'f' => {
            let precision = precision.unwrap_or(2);
            write!(out, "{:.*}", precision, round_decimal(value, precision))
        }
        'N' | 'n' => {
            let precision = precision.unwrap_or(2);
            let rounded = round_decimal(value, precision);
            write_scratch(
                out,
                |s| {
                    let mut plain = Scratch::new();
                    write!(plain, "{:.*}", precision, rounded)?;
                    write_grouped(s, plain.as_str())
                },
                |o| write!(o, "{}", value),
            )
        }
        'P' | 'p' => match value.checked_mul(Decimal::ONE_HUNDRED) {
            Some(percent) => {
                let precision = precision.unwrap_or(2);
                write!(out, "{:.*} %", precision, round_decimal(percent, precision))
            }
            None => write!(out, "{}", value),
        },
        _ => write!(out, "{}", value),
    }
}

/// Display with a precision cuts digits; round half away from zero first.
fn round_decimal(value: Decimal, precision: usize) -> Decimal {
    value.round_dp_with_strategy(precision as u32, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn write_uuid(out: &mut dyn Write, value: Uuid, format: Option<&str>) -> fmt::Result {
    match format {
        Some("N") | Some("n") => write!(out, "{}", value.simple()),
        Some("B") | Some("b") => write!(out, "{}", value.braced()),
        Some("P") | Some("p") => write!(out, "({})", value.hyphenated()),
        _ => write!(out, "{}", value.hyphenated()),
    }
}

/// Date and time kinds that accept a strftime pattern.
pub(crate) trait StrftimeFormat: fmt::Display {
    fn write_pattern(&self, out: &mut dyn Write, pattern: &str) -> fmt::Result;
}

macro_rules! strftime_format {
    ($($ty:ty),*) => {
        $(impl StrftimeFormat for $ty {
            fn write_pattern(&self, out: &mut dyn Write, pattern: &str) -> fmt::Result {
                write!(out, "{}", self.format(pattern))
            }
        })*
    };
}

strftime_format!(NaiveDateTime, DateTime<Utc>, NaiveDate, NaiveTime);

/// Renders a date/time value with a strftime pattern, or its default text.
///
/// Patterns that don't parse, or that ask for fields the value lacks
/// (`%H` on a date), render the default text.
pub(crate) fn write_datetime<D: StrftimeFormat>(
    out: &mut dyn Write,
    value: &D,
    format: Option<&str>,
) -> fmt::Result {
    match format {
        Some(pattern) if is_valid_strftime(pattern) => write_scratch(
            out,
            |s| value.write_pattern(s, pattern),
            |o| write!(o, "{}", value),
        ),
        _ => write!(out, "{}", value),
    }
}

pub(crate) fn is_valid_strftime(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Renders a duration as `[-][d.]hh:mm:ss[.fffffffff]`.
pub(crate) fn write_time_delta(out: &mut dyn Write, seconds: i64, nanos: i32) -> fmt::Result {
    if seconds < 0 || nanos < 0 {
        out.write_char('-')?;
    }
    let total = seconds.unsigned_abs();
    let nanos = nanos.unsigned_abs();

    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let minutes = (total / 60) % 60;
    let secs = total % 60;

    if days > 0 {
        write!(out, "{}.", days)?;
    }
    write!(out, "{:02}:{:02}:{:02}", hours, minutes, secs)?;
    if nanos > 0 {
        write!(out, ".{:09}", nanos)?;
    }
    Ok(())
}

/// Hex dump used for unmanaged values without a working formatter.
pub(crate) fn write_unmanaged_hex(out: &mut dyn Write, raw: &[u8]) -> fmt::Result {
    out.write_str("Unmanaged(0x")?;
    for byte in raw {
        write!(out, "{:02X}", byte)?;
    }
    out.write_char(')')
}
