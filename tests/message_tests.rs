use chrono::{NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use segment_logger::{
    impl_log_enum, BufferSegmentProvider, KeyValueList, LogEnum, LogLevel, LogMessage, RenderOptions, RenderSettings,
    TypeRegistry, Unmanaged,
};
use std::fmt::Write;
use std::sync::Arc;
use uuid::Uuid;

fn message_with(buffer: usize, strings: usize, registry: Arc<TypeRegistry>) -> LogMessage {
    let mut message = LogMessage::new(
        BufferSegmentProvider::create_standalone_segment(buffer),
        strings,
        registry,
    );
    message.initialize(None, LogLevel::Info);
    message
}

fn message(buffer: usize, strings: usize) -> LogMessage {
    message_with(buffer, strings, Arc::new(TypeRegistry::new()))
}

fn render(message: &LogMessage, size: usize, settings: &RenderSettings) -> String {
    let mut buf = vec![0u8; size];
    let len = message.render_utf8(&mut buf, settings, RenderOptions::default());
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

#[derive(Clone, Copy)]
struct Sample {
    a: i64,
    b: i32,
    c: u8,
}

impl Unmanaged for Sample {
    const SIZE: usize = 16;

    fn write_raw(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.a.to_le_bytes());
        out[8..12].copy_from_slice(&self.b.to_le_bytes());
        out[12] = self.c;
        out[13..16].fill(0);
    }

    fn read_raw(raw: &[u8]) -> Self {
        Sample {
            a: i64::from_le_bytes(raw[..8].try_into().unwrap()),
            b: i32::from_le_bytes(raw[8..12].try_into().unwrap()),
            c: raw[12],
        }
    }
}

#[derive(Clone, Copy)]
#[repr(u8)]
enum Color {
    Red,
    Green,
    Blue,
}

impl_log_enum!(Color as u8 { Red, Green, Blue });

#[derive(Clone, Copy)]
#[repr(i16)]
enum Offset {
    Behind = -1,
    Level = 0,
    Ahead = 1,
}

impl_log_enum!(Offset as i16 { Behind, Level, Ahead });

#[test]
fn test_string_renders() {
    let mut msg = message(1024, 4);
    msg.append("abc");
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "abc");
}

#[test]
fn test_integer_renders() {
    let mut msg = message(1024, 4);
    msg.append(1234567890i32);
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "1234567890");
}

#[test]
fn test_second_integer_truncates() {
    // One tag byte plus one i32
    let mut msg = message(5, 4);
    msg.append(1i32).append(2i32);
    assert!(msg.is_truncated());

    let settings = RenderSettings::default();
    assert_eq!(render(&msg, 64, &settings), "1 [TRUNCATED]");

    let window = settings.truncated_suffix.len();
    assert_eq!(render(&msg, window, &settings), settings.truncated_suffix);
}

#[test]
fn test_suffix_cut_to_tiny_output() {
    let mut msg = message(5, 4);
    msg.append(1i32).append(2i32);
    assert_eq!(render(&msg, 4, &RenderSettings::default()), " [TR");
}

#[test]
fn test_key_value_block() {
    let mut msg = message(1024, 4);
    msg.append_key_value("myKey", "myValue");

    let settings = RenderSettings::default();
    let mut list = KeyValueList::new();
    let mut text = [0u8; 64];
    let len = msg.render_utf8(
        &mut text,
        &settings,
        RenderOptions {
            key_values: Some(&mut list),
            skip_format_strings: false,
        },
    );
    assert_eq!(len, 0);
    assert_eq!(list.len(), 1);

    let mut block = [0u8; 64];
    let len = msg.render_key_values_utf8(&list, &mut block, &settings);
    assert_eq!(
        std::str::from_utf8(&block[..len]).unwrap(),
        " ~~ { \"myKey\": \"myValue\" }"
    );
}

#[test]
fn test_unregistered_unmanaged_hex_dump() {
    let mut msg = message(64, 4);
    msg.append_unmanaged(&Sample { a: 1, b: 2, c: 3 });
    assert_eq!(
        render(&msg, 128, &RenderSettings::default()),
        "Unmanaged(0x01000000000000000200000003000000)"
    );
}

#[test]
fn test_registered_unmanaged_formatter() {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_unmanaged::<Sample, _>(|s, out, format| match format {
        Some("short") => write!(out, "{}", s.a),
        _ => write!(out, "Sample({}, {}, {})", s.a, s.b, s.c),
    });

    let mut msg = message_with(128, 4, registry);
    let value = Sample { a: 7, b: -2, c: 9 };
    msg.append_unmanaged(&value)
        .append(" ")
        .append_unmanaged_formatted(&value, "short");
    assert_eq!(render(&msg, 128, &RenderSettings::default()), "Sample(7, -2, 9) 7");
}

#[test]
fn test_panicking_formatter_falls_back_to_hex() {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_unmanaged_raw::<Sample, _>(|_, out, _| {
        let _ = out.write_str("partial");
        panic!("formatter failed");
    });

    let mut msg = message_with(64, 4, registry);
    msg.append_unmanaged(&Sample { a: 1, b: 2, c: 3 });
    assert_eq!(
        render(&msg, 128, &RenderSettings::default()),
        "Unmanaged(0x01000000000000000200000003000000)"
    );
}

#[test]
fn test_enum_names_and_numbers() {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_enum::<Color>();

    let mut msg = message_with(128, 8, registry);
    msg.append_enum(Color::Green)
        .append(" ")
        .append_enum_formatted(Color::Blue, "D")
        .append(" ")
        .append_enum_formatted(Color::Blue, "X2")
        .append(" ")
        .append_enum(Offset::Behind);
    assert_eq!(render(&msg, 128, &RenderSettings::default()), "Green 2 02 -1");
}

#[test]
fn test_enum_append_leaves_registry_untouched() {
    let registry = Arc::new(TypeRegistry::new());
    let mut msg = message_with(64, 4, Arc::clone(&registry));
    msg.append_enum(Offset::Behind).append(" ").append_enum(Color::Blue);

    let token = registry.token_of::<Offset>();
    assert!(!registry.is_signed_enum(token));
    assert_eq!(registry.enum_name(token, Offset::Behind.to_bits()), None);
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "-1 2");
}

#[test]
fn test_registered_signed_enum() {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_enum::<Offset>();

    let mut msg = message_with(64, 4, registry);
    msg.append_enum(Offset::Behind).append(",").append_enum(Offset::Ahead);
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "Behind,Ahead");
}

#[test]
fn test_format_strings() {
    let mut msg = message(256, 8);
    msg.append_formatted(255u32, "X4")
        .append(" ")
        .append_formatted(3.14159f64, "F2")
        .append(" ")
        .append_formatted(1234567i64, "N0")
        .append(" ")
        .append_formatted(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), "%d/%m/%Y");
    assert_eq!(
        render(&msg, 128, &RenderSettings::default()),
        "00FF 3.14 1,234,567 09/03/2024"
    );
}

#[test]
fn test_skip_format_strings() {
    let mut msg = message(64, 4);
    msg.append_formatted(255u32, "X4");

    let mut buf = [0u8; 32];
    let len = msg.render_utf8(
        &mut buf,
        &RenderSettings::default(),
        RenderOptions {
            key_values: None,
            skip_format_strings: true,
        },
    );
    assert_eq!(&buf[..len], b"255");
}

#[test]
fn test_mixed_values() {
    let mut msg = message(512, 8);
    msg.append(true)
        .append(' ')
        .append(Decimal::new(12345, 2))
        .append(' ')
        .append(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef))
        .append(' ')
        .append(TimeDelta::seconds(3_725))
        .append(' ')
        .append(None::<u32>);
    assert_eq!(
        render(&msg, 256, &RenderSettings::default()),
        "true 123.45 01234567-89ab-cdef-0123-456789abcdef 01:02:05 null"
    );
}

#[test]
fn test_null_display_setting() {
    let mut msg = message(64, 4);
    msg.append_null();
    let settings = RenderSettings {
        null_display: "<none>".to_string(),
        ..RenderSettings::default()
    };
    assert_eq!(render(&msg, 64, &settings), "<none>");
}

#[test]
fn test_spans_copy_partially() {
    let mut msg = message(12, 4);
    msg.append_str_span("hello world");
    assert!(msg.is_truncated());
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "hello w [TRUNCATED]");
}

#[test]
fn test_ascii_chars_replace_non_ascii() {
    let mut msg = message(64, 4);
    msg.append_ascii_chars(&['o', 'k', 'é']);
    assert_eq!(render(&msg, 64, &RenderSettings::default()), "ok?");
}

#[test]
fn test_render_to_string_includes_fields() {
    let mut msg = message(256, 8);
    msg.append("user ")
        .append("alice")
        .append(" logged in")
        .append_key_value("attempts", 3u8)
        .append_key_value("ratio", 0.5f64)
        .append_key_value("note", "a\"b\n");
    assert_eq!(
        msg.to_string(),
        "user alice logged in ~~ { \"attempts\": 3, \"ratio\": 0.5, \"note\": \"a\\\"b\\n\" }"
    );
}

#[test]
fn test_utf16_output() {
    let mut msg = message(64, 4);
    msg.append("größe=").append(42u16);

    let mut buf = [0u16; 32];
    let len = msg.render_utf16(&mut buf, &RenderSettings::default(), RenderOptions::default());
    assert_eq!(String::from_utf16(&buf[..len]).unwrap(), "größe=42");
}

#[test]
fn test_exception_is_kept() {
    let mut msg = message(64, 4);
    let error: segment_logger::SharedError = Arc::new(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
    msg.append("write failed").with_exception(error);
    assert_eq!(msg.exception().map(|e| e.to_string()), Some("disk gone".to_string()));

    msg.initialize(None, LogLevel::Info);
    assert!(msg.exception().is_none());
}
