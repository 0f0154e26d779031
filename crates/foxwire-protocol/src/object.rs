//! `SfsObject`: the keyed container (wire tag 18).

use indexmap::IndexMap;

use crate::{ProtocolError, SfsArray, TypeTag, Value};

/// An insertion-ordered map from UTF-8 keys to values.
///
/// Keys are unique. Putting an existing key replaces its value and keeps
/// the key's original position, so the field order on the wire is the
/// order in which keys were first inserted.
///
/// ```rust
/// use foxwire_protocol::SfsObject;
///
/// let mut auth = SfsObject::new();
/// auth.put_utf_string("zn", "BasicExamples")
///     .put_utf_string("un", "bob")
///     .put_bool("bin", true);
///
/// assert_eq!(auth.get_utf_string("un").unwrap(), "bob");
/// assert!(auth.get_int("un").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SfsObject {
    fields: IndexMap<String, Value>,
}

/// One typed setter per wire kind.
macro_rules! typed_setters {
    ($($name:ident($ty:ty) => $variant:ident;)*) => {
        $(
            pub fn $name(
                &mut self,
                key: impl Into<String>,
                value: $ty,
            ) -> &mut Self {
                self.put(key, Value::$variant(value.into()))
            }
        )*
    };
}

/// One typed getter per wire kind, failing with `KeyNotFound` or
/// `TypeMismatch` instead of returning a placeholder.
macro_rules! typed_getters {
    ($($name:ident -> $ret:ty = $accessor:ident($tag:ident);)*) => {
        $(
            pub fn $name(&self, key: &str) -> Result<$ret, ProtocolError> {
                let value = self.require(key)?;
                value
                    .$accessor()
                    .ok_or_else(|| mismatch(key, TypeTag::$tag, value))
            }
        )*
    };
}

impl SfsObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Inserts or replaces a field.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn put_null(&mut self, key: impl Into<String>) -> &mut Self {
        self.put(key, Value::Null)
    }

    typed_setters! {
        put_bool(bool) => Bool;
        put_byte(i8) => Byte;
        put_short(i16) => Short;
        put_int(i32) => Int;
        put_long(i64) => Long;
        put_float(f32) => Float;
        put_double(f64) => Double;
        put_utf_string(impl Into<String>) => UtfString;
        put_bool_array(Vec<bool>) => BoolArray;
        put_byte_array(Vec<u8>) => ByteArray;
        put_short_array(Vec<i16>) => ShortArray;
        put_int_array(Vec<i32>) => IntArray;
        put_long_array(Vec<i64>) => LongArray;
        put_float_array(Vec<f32>) => FloatArray;
        put_double_array(Vec<f64>) => DoubleArray;
        put_utf_string_array(Vec<String>) => UtfStringArray;
        put_sfs_array(SfsArray) => Array;
        put_sfs_object(SfsObject) => Object;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    typed_getters! {
        get_bool -> bool = as_bool(Bool);
        get_byte -> i8 = as_byte(Byte);
        get_short -> i16 = as_short(Short);
        get_int -> i32 = as_int(Int);
        get_long -> i64 = as_long(Long);
        get_float -> f32 = as_float(Float);
        get_double -> f64 = as_double(Double);
        get_utf_string -> &str = as_str(UtfString);
        get_bool_array -> &[bool] = as_bool_array(BoolArray);
        get_byte_array -> &[u8] = as_byte_array(ByteArray);
        get_short_array -> &[i16] = as_short_array(ShortArray);
        get_int_array -> &[i32] = as_int_array(IntArray);
        get_long_array -> &[i64] = as_long_array(LongArray);
        get_float_array -> &[f32] = as_float_array(FloatArray);
        get_double_array -> &[f64] = as_double_array(DoubleArray);
        get_utf_string_array -> &[String] = as_utf_string_array(UtfStringArray);
        get_sfs_array -> &SfsArray = as_array(SfsArray);
        get_sfs_object -> &SfsObject = as_object(SfsObject);
    }

    /// Any integer field widened to `i64`.
    pub fn get_integer(&self, key: &str) -> Result<i64, ProtocolError> {
        let value = self.require(key)?;
        value
            .as_integer()
            .ok_or_else(|| mismatch(key, TypeTag::Long, value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Removes a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, key: &str) -> Result<&Value, ProtocolError> {
        self.fields
            .get(key)
            .ok_or_else(|| ProtocolError::KeyNotFound(key.to_string()))
    }
}

fn mismatch(key: &str, expected: TypeTag, found: &Value) -> ProtocolError {
    ProtocolError::TypeMismatch {
        key: key.to_string(),
        expected: expected.name(),
        found: found.type_name(),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SfsObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut obj = SfsObject::new();
        for (k, v) in iter {
            obj.put(k, v);
        }
        obj
    }
}

impl IntoIterator for SfsObject {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
