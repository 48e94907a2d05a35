use segment_logger::{impl_log_enum, LogEnum, TypeRegistry, TypeToken, Unmanaged};
use std::fmt::Write;
use std::sync::Arc;
use std::thread;

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u32)]
enum Status {
    Active = 1,
    Suspended = 7,
}

impl_log_enum!(Status as u32 { Active, Suspended });

#[derive(Clone, Copy)]
#[repr(i8)]
enum Delta {
    Down = -1,
    Up = 1,
}

impl_log_enum!(Delta as i8 { Down, Up });

#[derive(Clone, Copy)]
struct Pair(u16, u16);

impl Unmanaged for Pair {
    const SIZE: usize = 4;

    fn write_raw(&self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.0.to_le_bytes());
        out[2..4].copy_from_slice(&self.1.to_le_bytes());
    }

    fn read_raw(raw: &[u8]) -> Self {
        Pair(u16::from_le_bytes([raw[0], raw[1]]), u16::from_le_bytes([raw[2], raw[3]]))
    }
}

#[test]
fn test_tokens_are_stable_per_type() {
    let registry = TypeRegistry::new();
    let first = registry.token_of::<Status>();
    assert_eq!(registry.token_of::<Status>(), first);
    assert_ne!(registry.token_of::<Pair>(), first);
}

#[test]
fn test_tokens_agree_across_registries() {
    let a = TypeRegistry::new();
    let b = TypeRegistry::new();
    assert_eq!(a.token_of::<Pair>(), b.token_of::<Pair>());
    assert_eq!(a.token_of::<Pair>(), TypeToken::of::<Pair>());
    assert_ne!(TypeToken::of::<Status>(), TypeToken::of::<Delta>());
}

#[test]
fn test_registries_are_independent() {
    let a = TypeRegistry::new();
    let b = TypeRegistry::new();
    a.token_of::<u8>();
    let token = a.token_of::<Status>();
    a.register_enum::<Status>();

    assert_eq!(b.token_of::<Status>(), b.token_of::<Status>());
    assert_eq!(a.enum_name(token, 7), Some("Suspended"));
    assert_eq!(b.enum_name(b.token_of::<Status>(), 7), None);
}

#[test]
fn test_enum_lookup() {
    let registry = TypeRegistry::new();
    registry.register_enum::<Status>();
    let token = registry.token_of::<Status>();

    assert_eq!(registry.enum_name(token, Status::Active.to_bits()), Some("Active"));
    assert_eq!(registry.enum_name(token, 2), None);
    assert!(!registry.is_signed_enum(token));
}

#[test]
fn test_signed_enum_bits() {
    assert_eq!(Delta::Down.to_bits(), u64::MAX);
    assert!(Delta::SIGNED);

    let registry = TypeRegistry::new();
    registry.register_enum::<Delta>();
    let token = registry.token_of::<Delta>();
    assert!(registry.is_signed_enum(token));
    assert_eq!(registry.enum_name(token, u64::MAX), Some("Down"));
}

#[test]
fn test_unmanaged_formatter_lookup() {
    let registry = TypeRegistry::new();
    let token = registry.token_of::<Pair>();
    assert!(registry.unmanaged_formatter(token).is_none());

    registry.register_unmanaged::<Pair, _>(|pair, out, _| write!(out, "{}x{}", pair.0, pair.1));
    let formatter = registry.unmanaged_formatter(token).unwrap();

    let mut raw = [0u8; 4];
    Pair(3, 4).write_raw(&mut raw);
    let mut text = String::new();
    assert!(formatter(&raw, &mut text, None));
    assert_eq!(text, "3x4");
}

#[test]
fn test_concurrent_registration() {
    let registry = Arc::new(TypeRegistry::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.register_enum::<Status>();
                registry.token_of::<Status>()
            })
        })
        .collect();

    let tokens: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(tokens.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(registry.enum_name(tokens[0], 1), Some("Active"));
}

#[test]
fn test_global_registry_is_shared() {
    let a = TypeRegistry::global();
    let b = TypeRegistry::global();
    assert!(Arc::ptr_eq(&a, &b));
}
