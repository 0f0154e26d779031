//! The SFS2X value model.
//!
//! Every value on the wire is one of 19 kinds, identified by a one-byte
//! [`TypeTag`]. [`Value`] is the matching Rust enum: a closed tagged union
//! where each variant carries exactly the Rust type the wire format can
//! represent (a `Short` is an `i16`, a `FloatArray` is a `Vec<f32>`, ...).
//!
//! Two variants are recursive: [`Value::Array`] holds an [`SfsArray`]
//! (an ordered list of values) and [`Value::Object`] holds an
//! [`SfsObject`] (an ordered map of named values).

use std::fmt;

use crate::{ProtocolError, SfsArray, SfsObject};

// ---------------------------------------------------------------------------
// TypeTag
// ---------------------------------------------------------------------------

/// The wire type tag for each value kind.
///
/// The numbering is the protocol's ABI and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Null = 0,
    Bool = 1,
    Byte = 2,
    Short = 3,
    Int = 4,
    Long = 5,
    Float = 6,
    Double = 7,
    UtfString = 8,
    BoolArray = 9,
    ByteArray = 10,
    ShortArray = 11,
    IntArray = 12,
    LongArray = 13,
    FloatArray = 14,
    DoubleArray = 15,
    UtfStringArray = 16,
    SfsArray = 17,
    SfsObject = 18,
}

impl TypeTag {
    /// Every tag, indexed by its wire value.
    pub const ALL: [TypeTag; 19] = [
        TypeTag::Null,
        TypeTag::Bool,
        TypeTag::Byte,
        TypeTag::Short,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::UtfString,
        TypeTag::BoolArray,
        TypeTag::ByteArray,
        TypeTag::ShortArray,
        TypeTag::IntArray,
        TypeTag::LongArray,
        TypeTag::FloatArray,
        TypeTag::DoubleArray,
        TypeTag::UtfStringArray,
        TypeTag::SfsArray,
        TypeTag::SfsObject,
    ];

    /// Stable snake-case name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Bool => "bool",
            TypeTag::Byte => "byte",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::UtfString => "utf_string",
            TypeTag::BoolArray => "bool_array",
            TypeTag::ByteArray => "byte_array",
            TypeTag::ShortArray => "short_array",
            TypeTag::IntArray => "int_array",
            TypeTag::LongArray => "long_array",
            TypeTag::FloatArray => "float_array",
            TypeTag::DoubleArray => "double_array",
            TypeTag::UtfStringArray => "utf_string_array",
            TypeTag::SfsArray => "sfs_array",
            TypeTag::SfsObject => "sfs_object",
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        TypeTag::ALL
            .get(usize::from(byte))
            .copied()
            .ok_or(ProtocolError::UnknownTypeTag(byte))
    }
}

impl From<TypeTag> for u8 {
    fn from(tag: TypeTag) -> u8 {
        tag as u8
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single SFS2X value.
///
/// `ByteArray` holds raw bytes (`u8`), while the scalar `Byte` is signed,
/// matching how the protocol uses them: byte arrays carry opaque blobs,
/// bytes carry small numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    UtfString(String),
    BoolArray(Vec<bool>),
    ByteArray(Vec<u8>),
    ShortArray(Vec<i16>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    UtfStringArray(Vec<String>),
    Array(SfsArray),
    Object(SfsObject),
}

impl Value {
    /// The wire tag for this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Byte(_) => TypeTag::Byte,
            Value::Short(_) => TypeTag::Short,
            Value::Int(_) => TypeTag::Int,
            Value::Long(_) => TypeTag::Long,
            Value::Float(_) => TypeTag::Float,
            Value::Double(_) => TypeTag::Double,
            Value::UtfString(_) => TypeTag::UtfString,
            Value::BoolArray(_) => TypeTag::BoolArray,
            Value::ByteArray(_) => TypeTag::ByteArray,
            Value::ShortArray(_) => TypeTag::ShortArray,
            Value::IntArray(_) => TypeTag::IntArray,
            Value::LongArray(_) => TypeTag::LongArray,
            Value::FloatArray(_) => TypeTag::FloatArray,
            Value::DoubleArray(_) => TypeTag::DoubleArray,
            Value::UtfStringArray(_) => TypeTag::UtfStringArray,
            Value::Array(_) => TypeTag::SfsArray,
            Value::Object(_) => TypeTag::SfsObject,
        }
    }

    /// Shorthand for `self.type_tag().name()`.
    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Any integer variant widened to `i64`.
    ///
    /// Servers are not consistent about integer widths for counters such
    /// as `numChunks`, so this is the one accessor that crosses variants.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&SfsArray> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SfsObject> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }
}

/// Accessors for the `Copy` scalars: return the value if the variant
/// matches, `None` otherwise. No numeric coercion.
macro_rules! scalar_accessors {
    ($($name:ident => $variant:ident($ty:ty);)*) => {
        impl Value {
            $(
                pub fn $name(&self) -> Option<$ty> {
                    match self {
                        Value::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            )*
        }
    };
}

/// Accessors for the heap-backed variants, borrowed as `str`/slices.
macro_rules! slice_accessors {
    ($($name:ident => $variant:ident(&$ty:ty);)*) => {
        impl Value {
            $(
                pub fn $name(&self) -> Option<&$ty> {
                    match self {
                        Value::$variant(v) => Some(&v[..]),
                        _ => None,
                    }
                }
            )*
        }
    };
}

scalar_accessors! {
    as_bool => Bool(bool);
    as_byte => Byte(i8);
    as_short => Short(i16);
    as_int => Int(i32);
    as_long => Long(i64);
    as_float => Float(f32);
    as_double => Double(f64);
}

slice_accessors! {
    as_str => UtfString(&str);
    as_bool_array => BoolArray(&[bool]);
    as_byte_array => ByteArray(&[u8]);
    as_short_array => ShortArray(&[i16]);
    as_int_array => IntArray(&[i32]);
    as_long_array => LongArray(&[i64]);
    as_float_array => FloatArray(&[f32]);
    as_double_array => DoubleArray(&[f64]);
    as_utf_string_array => UtfStringArray(&[String]);
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

// Each Rust type maps to exactly one wire kind, so these conversions are
// explicit typing, not inference.
macro_rules! value_from {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => UtfString,
    Vec<bool> => BoolArray,
    Vec<u8> => ByteArray,
    Vec<i16> => ShortArray,
    Vec<i32> => IntArray,
    Vec<i64> => LongArray,
    Vec<f32> => FloatArray,
    Vec<f64> => DoubleArray,
    Vec<String> => UtfStringArray,
    SfsArray => Array,
    SfsObject => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::UtfString(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tag_round_trips_through_u8() {
        for (i, tag) in TypeTag::ALL.iter().enumerate() {
            assert_eq!(u8::from(*tag) as usize, i);
            assert_eq!(TypeTag::try_from(i as u8).unwrap(), *tag);
        }
    }

    #[test]
    fn test_type_tag_rejects_reserved_values() {
        assert!(matches!(
            TypeTag::try_from(19),
            Err(ProtocolError::UnknownTypeTag(19))
        ));
        assert!(matches!(
            TypeTag::try_from(255),
            Err(ProtocolError::UnknownTypeTag(255))
        ));
    }

    #[test]
    fn test_type_tag_names_are_stable() {
        assert_eq!(TypeTag::IntArray.name(), "int_array");
        assert_eq!(TypeTag::SfsObject.to_string(), "sfs_object");
    }

    #[test]
    fn test_accessors_do_not_coerce() {
        let v = Value::Int(7);
        assert_eq!(v.as_int(), Some(7));
        assert_eq!(v.as_long(), None);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_integer(), Some(7));

        let b = Value::Bool(true);
        assert_eq!(b.as_integer(), None);
    }

    #[test]
    fn test_slice_accessors() {
        let v = Value::from(vec![1i16, -2]);
        assert_eq!(v.as_short_array(), Some(&[1i16, -2][..]));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from("hi").as_byte_array(), None);
    }

    #[test]
    fn test_from_picks_the_matching_variant() {
        assert_eq!(Value::from(1i8).type_tag(), TypeTag::Byte);
        assert_eq!(Value::from(1i64).type_tag(), TypeTag::Long);
        assert_eq!(Value::from(1.5f32).type_tag(), TypeTag::Float);
        assert_eq!(Value::from(vec![0u8]).type_tag(), TypeTag::ByteArray);
        assert_eq!(Value::from(()).type_tag(), TypeTag::Null);
        assert_eq!(Value::from(SfsObject::new()).type_tag(), TypeTag::SfsObject);
    }
}
