//! Render-time lookup services for enum names and unmanaged-type formatters.
//!
//! Encoded messages never carry a Rust `TypeId`. Each type is identified by
//! a [`TypeToken`] hashed from its `TypeId`, and the token is what gets
//! written into the message buffer. Producers compute it without touching
//! any registry. At render time the token is resolved back to an enum
//! descriptor or a formatter closure.
//!
//! Registries are explicit context objects handed to every
//! [`LogMessage`](crate::LogMessage). Callers that don't need isolation use
//! the process-wide instance returned by [`TypeRegistry::global`].
//!
//! # Thread Safety
//!
//! Both maps are `DashMap`s, so registration can run concurrently with
//! lookups from the consumer thread.

use dashmap::DashMap;
use lazy_static::lazy_static;
use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

lazy_static! {
    /// Process-wide default registry.
    ///
    /// Created on first access and never torn down.
    static ref GLOBAL_REGISTRY: Arc<TypeRegistry> = Arc::new(TypeRegistry::new());
}

/// 64-bit identifier of a Rust type, stable for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeToken(u64);

impl TypeToken {
    pub(crate) const ENCODED_SIZE: usize = 8;

    /// Token for `T`. Pure computation: no lock, no allocation.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        // Unkeyed, so every hasher in the process agrees
        let mut hasher = DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        Self(hasher.finish())
    }

    #[inline]
    pub(crate) fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub(crate) fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

/// An enum whose values can be logged without formatting them up front.
///
/// The encoder stores the value as a 64-bit pattern; names are looked up
/// only when the message is rendered. Use [`impl_log_enum!`](crate::impl_log_enum)
/// for field-less enums with a primitive representation.
pub trait LogEnum: Copy + Send + Sync + 'static {
    /// Whether the underlying representation is a signed integer.
    const SIGNED: bool;

    /// The value widened to 64 bits, sign-extended for signed representations.
    fn to_bits(self) -> u64;

    /// Every named variant with its display name.
    fn variants() -> &'static [(Self, &'static str)];
}

/// Primitive integer types usable as an enum representation.
#[doc(hidden)]
pub trait EnumRepr: Copy {
    const SIGNED: bool;
    fn widen(self) -> u64;
}

macro_rules! enum_repr {
    (signed: $($s:ty),*; unsigned: $($u:ty),*) => {
        $(impl EnumRepr for $s {
            const SIGNED: bool = true;
            #[inline]
            fn widen(self) -> u64 { self as i64 as u64 }
        })*
        $(impl EnumRepr for $u {
            const SIGNED: bool = false;
            #[inline]
            fn widen(self) -> u64 { self as u64 }
        })*
    };
}

enum_repr!(signed: i8, i16, i32, i64, isize; unsigned: u8, u16, u32, u64, usize);

/// Implements [`LogEnum`] for a field-less enum.
///
/// # Examples
///
/// ```
/// # use segment_logger::{impl_log_enum, LogEnum};
/// #[derive(Clone, Copy)]
/// #[repr(u8)]
/// enum Color { Red, Green, Blue }
///
/// impl_log_enum!(Color as u8 { Red, Green, Blue });
///
/// assert_eq!(Color::Blue.to_bits(), 2);
/// assert!(!Color::SIGNED);
/// ```
#[macro_export]
macro_rules! impl_log_enum {
    ($ty:ident as $repr:ty { $($variant:ident),* $(,)? }) => {
        impl $crate::LogEnum for $ty {
            const SIGNED: bool = <$repr as $crate::registry::EnumRepr>::SIGNED;

            #[inline]
            fn to_bits(self) -> u64 {
                <$repr as $crate::registry::EnumRepr>::widen(self as $repr)
            }

            fn variants() -> &'static [(Self, &'static str)] {
                &[$(($ty::$variant, stringify!($variant))),*]
            }
        }
    };
}

/// A plain fixed-layout value that is copied into the message as raw bytes.
///
/// Implementations define their own byte layout: `write_raw` fills exactly
/// `SIZE` bytes, `read_raw` rebuilds the value from them. Any padding the
/// layout reserves must be written as zeroes.
pub trait Unmanaged: Copy + 'static {
    const SIZE: usize;

    fn write_raw(&self, out: &mut [u8]);

    fn read_raw(raw: &[u8]) -> Self;
}

/// Formatter for the raw bytes of an [`Unmanaged`] value.
///
/// Receives the raw bytes, the output and the optional format string.
/// Returns `false` when the output ran out of room.
pub type UnmanagedFormatter =
    dyn Fn(&[u8], &mut dyn fmt::Write, Option<&str>) -> bool + Send + Sync;

#[derive(Debug)]
struct EnumDescriptor {
    signed: bool,
    names: HashMap<u64, &'static str>,
}

/// Registry of enum names and unmanaged-type formatters.
pub struct TypeRegistry {
    enums: DashMap<TypeToken, EnumDescriptor>,
    formatters: DashMap<TypeToken, Arc<UnmanagedFormatter>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            enums: DashMap::new(),
            formatters: DashMap::new(),
        }
    }

    /// Returns the process-wide registry.
    pub fn global() -> Arc<TypeRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Returns the token for `T`, the same in every registry.
    pub fn token_of<T: 'static>(&self) -> TypeToken {
        TypeToken::of::<T>()
    }

    /// Registers the variant names of `T`.
    ///
    /// Unregistered enums still log, but render as numbers.
    pub fn register_enum<T: LogEnum>(&self) {
        let token = self.token_of::<T>();
        let names = T::variants()
            .iter()
            .map(|(value, name)| (value.to_bits(), *name))
            .collect();

        self.enums.insert(
            token,
            EnumDescriptor {
                signed: T::SIGNED,
                names,
            },
        );
    }

    /// Looks up the variant name for a raw enum value.
    pub fn enum_name(&self, token: TypeToken, bits: u64) -> Option<&'static str> {
        let descriptor = self.enums.get(&token)?;
        descriptor.names.get(&bits).copied()
    }

    /// Whether the registered enum behind `token` has a signed
    /// representation. Unregistered tokens report `false`.
    pub fn is_signed_enum(&self, token: TypeToken) -> bool {
        self.enums.get(&token).map_or(false, |d| d.signed)
    }

    /// Registers a formatter working directly on the raw bytes of `T`.
    pub fn register_unmanaged_raw<T, F>(&self, formatter: F)
    where
        T: Unmanaged,
        F: Fn(&[u8], &mut dyn fmt::Write, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let token = self.token_of::<T>();
        self.formatters.insert(token, Arc::new(formatter));
    }

    /// Registers a formatter for `T`, decoding the raw bytes first.
    ///
    /// # Examples
    ///
    /// ```
    /// # use segment_logger::{TypeRegistry, Unmanaged};
    /// # use std::fmt::Write;
    /// #[derive(Clone, Copy)]
    /// struct Point { x: i32, y: i32 }
    ///
    /// impl Unmanaged for Point {
    ///     const SIZE: usize = 8;
    ///     fn write_raw(&self, out: &mut [u8]) {
    ///         out[..4].copy_from_slice(&self.x.to_le_bytes());
    ///         out[4..8].copy_from_slice(&self.y.to_le_bytes());
    ///     }
    ///     fn read_raw(raw: &[u8]) -> Self {
    ///         let x = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    ///         let y = i32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    ///         Point { x, y }
    ///     }
    /// }
    ///
    /// let registry = TypeRegistry::new();
    /// registry.register_unmanaged::<Point, _>(|p, out, _| write!(out, "({}, {})", p.x, p.y));
    /// ```
    pub fn register_unmanaged<T, F>(&self, formatter: F)
    where
        T: Unmanaged,
        F: Fn(&T, &mut dyn fmt::Write, Option<&str>) -> fmt::Result + Send + Sync + 'static,
    {
        self.register_unmanaged_raw::<T, _>(move |raw, out, format| {
            let value = T::read_raw(raw);
            formatter(&value, out, format).is_ok()
        });
    }

    /// Looks up the formatter registered for `token`.
    pub fn unmanaged_formatter(&self, token: TypeToken) -> Option<Arc<UnmanagedFormatter>> {
        self.formatters.get(&token).map(|f| Arc::clone(&f))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("enums", &self.enums.len())
            .field("formatters", &self.formatters.len())
            .finish()
    }
}
