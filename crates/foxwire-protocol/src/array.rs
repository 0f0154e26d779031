//! `SfsArray`: the unkeyed container (wire tag 17).

use crate::{ProtocolError, SfsObject, TypeTag, Value};

/// An ordered list of values of any kind.
///
/// Unlike the primitive arrays (`IntArray`, `UtfStringArray`, ...), an
/// `SfsArray` may mix kinds and nest other containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SfsArray {
    items: Vec<Value>,
}

macro_rules! typed_adders {
    ($($name:ident($ty:ty) => $variant:ident;)*) => {
        $(
            pub fn $name(&mut self, value: $ty) -> &mut Self {
                self.add(Value::$variant(value.into()))
            }
        )*
    };
}

macro_rules! typed_getters {
    ($($name:ident -> $ret:ty = $accessor:ident($tag:ident);)*) => {
        $(
            pub fn $name(&self, index: usize) -> Result<$ret, ProtocolError> {
                let value = self.require(index)?;
                value.$accessor().ok_or_else(|| ProtocolError::TypeMismatch {
                    key: format!("[{index}]"),
                    expected: TypeTag::$tag.name(),
                    found: value.type_name(),
                })
            }
        )*
    };
}

impl SfsArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Appends a value.
    pub fn add(&mut self, value: impl Into<Value>) -> &mut Self {
        self.items.push(value.into());
        self
    }

    /// Inserts a value at `index`, shifting later elements right.
    pub fn insert(
        &mut self,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), ProtocolError> {
        if index > self.items.len() {
            return Err(ProtocolError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, value.into());
        Ok(())
    }

    pub fn add_null(&mut self) -> &mut Self {
        self.add(Value::Null)
    }

    typed_adders! {
        add_bool(bool) => Bool;
        add_byte(i8) => Byte;
        add_short(i16) => Short;
        add_int(i32) => Int;
        add_long(i64) => Long;
        add_float(f32) => Float;
        add_double(f64) => Double;
        add_utf_string(impl Into<String>) => UtfString;
        add_bool_array(Vec<bool>) => BoolArray;
        add_byte_array(Vec<u8>) => ByteArray;
        add_short_array(Vec<i16>) => ShortArray;
        add_int_array(Vec<i32>) => IntArray;
        add_long_array(Vec<i64>) => LongArray;
        add_float_array(Vec<f32>) => FloatArray;
        add_double_array(Vec<f64>) => DoubleArray;
        add_utf_string_array(Vec<String>) => UtfStringArray;
        add_sfs_array(SfsArray) => Array;
        add_sfs_object(SfsObject) => Object;
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
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

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    fn require(&self, index: usize) -> Result<&Value, ProtocolError> {
        self.items.get(index).ok_or(ProtocolError::IndexOutOfBounds {
            index,
            len: self.items.len(),
        })
    }
}

impl<V: Into<Value>> FromIterator<V> for SfsArray {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntoIterator for SfsArray {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a SfsArray {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order_and_mixes_kinds() {
        let mut arr = SfsArray::new();
        arr.add_int(1).add_utf_string("two").add_null().add_bool(false);

        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get_int(0).unwrap(), 1);
        assert_eq!(arr.get_utf_string(1).unwrap(), "two");
        assert!(arr.get(2).unwrap().is_null());
        assert!(!arr.get_bool(3).unwrap());
    }

    #[test]
    fn test_insert_at_index() {
        let mut arr: SfsArray = vec![1i32, 3].into_iter().collect();
        arr.insert(1, 2i32).unwrap();
        let ints: Vec<i32> = arr.iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_past_end_is_an_error() {
        let mut arr = SfsArray::new();
        assert!(matches!(
            arr.insert(1, 0i32),
            Err(ProtocolError::IndexOutOfBounds { index: 1, len: 0 })
        ));
    }

    #[test]
    fn test_out_of_bounds_and_mismatch() {
        let mut arr = SfsArray::new();
        arr.add_long(5);

        assert!(matches!(
            arr.get_long(3),
            Err(ProtocolError::IndexOutOfBounds { index: 3, len: 1 })
        ));
        assert!(matches!(
            arr.get_int(0),
            Err(ProtocolError::TypeMismatch { expected: "int", found: "long", .. })
        ));
    }

    #[test]
    fn test_every_primitive_array_has_a_getter() {
        let mut arr = SfsArray::new();
        arr.add_bool_array(vec![true])
            .add_short_array(vec![-2])
            .add_long_array(vec![1 << 40])
            .add_float_array(vec![0.5])
            .add_double_array(vec![2.25]);

        assert_eq!(arr.get_bool_array(0).unwrap(), &[true]);
        assert_eq!(arr.get_short_array(1).unwrap(), &[-2]);
        assert_eq!(arr.get_long_array(2).unwrap(), &[1 << 40]);
        assert_eq!(arr.get_float_array(3).unwrap(), &[0.5]);
        assert_eq!(arr.get_double_array(4).unwrap(), &[2.25]);
        assert!(arr.get_double_array(3).is_err());
    }
}
