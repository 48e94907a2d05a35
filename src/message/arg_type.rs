/// Set on a tag byte when a format string index follows it.
pub const FORMAT_FLAG: u8 = 0x80;

/// Tag byte written in front of every encoded entry.
///
/// # Binary Format
///
/// `[tag(1) | format_index(1, only with FORMAT_FLAG) | payload]`
///
/// Payload per tag:
/// - fixed-width scalars: little-endian bytes, see [`ArgType::fixed_size`]
/// - `String`: string table index (1)
/// - `StrSpan`, `AsciiSpan`: length (4) + bytes
/// - `Enum`, `SignedEnum`: type token (8) + value bits (8)
/// - `Unmanaged`: type token (8) + size (4) + raw bytes
/// - `KeyString`: string table index (1), then one complete value entry
/// - `Null`, `EndOfTruncatedMessage`: nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgType {
    Null = 1,
    String,
    StrSpan,
    AsciiSpan,
    Bool,
    U8,
    I8,
    Char,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    I128,
    U128,
    Usize,
    Isize,
    F32,
    F64,
    Decimal,
    Guid,
    DateTime,
    DateTimeUtc,
    Date,
    Time,
    TimeDelta,
    Enum,
    SignedEnum,
    Unmanaged,
    KeyString,
    EndOfTruncatedMessage,
}

impl ArgType {
    const ALL: [ArgType; 32] = [
        ArgType::Null,
        ArgType::String,
        ArgType::StrSpan,
        ArgType::AsciiSpan,
        ArgType::Bool,
        ArgType::U8,
        ArgType::I8,
        ArgType::Char,
        ArgType::I16,
        ArgType::U16,
        ArgType::I32,
        ArgType::U32,
        ArgType::I64,
        ArgType::U64,
        ArgType::I128,
        ArgType::U128,
        ArgType::Usize,
        ArgType::Isize,
        ArgType::F32,
        ArgType::F64,
        ArgType::Decimal,
        ArgType::Guid,
        ArgType::DateTime,
        ArgType::DateTimeUtc,
        ArgType::Date,
        ArgType::Time,
        ArgType::TimeDelta,
        ArgType::Enum,
        ArgType::SignedEnum,
        ArgType::Unmanaged,
        ArgType::KeyString,
        ArgType::EndOfTruncatedMessage,
    ];

    /// Decodes a tag byte with the format flag already masked off.
    #[inline]
    pub fn from_u8(value: u8) -> Option<ArgType> {
        let index = usize::from(value).checked_sub(1)?;
        Self::ALL.get(index).copied()
    }

    /// Payload size of the fixed-width kinds.
    pub fn fixed_size(self) -> Option<usize> {
        let size = match self {
            ArgType::Bool | ArgType::U8 | ArgType::I8 => 1,
            ArgType::I16 | ArgType::U16 => 2,
            ArgType::Char | ArgType::I32 | ArgType::U32 | ArgType::F32 | ArgType::Date => 4,
            ArgType::I64 | ArgType::U64 | ArgType::Usize | ArgType::Isize | ArgType::F64 => 8,
            ArgType::Time => 8,
            ArgType::DateTime | ArgType::DateTimeUtc | ArgType::TimeDelta => 12,
            ArgType::I128 | ArgType::U128 | ArgType::Decimal | ArgType::Guid => 16,
            ArgType::Enum | ArgType::SignedEnum => 16,
            ArgType::Null | ArgType::EndOfTruncatedMessage => 0,
            ArgType::String
            | ArgType::StrSpan
            | ArgType::AsciiSpan
            | ArgType::Unmanaged
            | ArgType::KeyString => return None,
        };
        Some(size)
    }
}
