//! JSON import/export.
//!
//! Export is a plain `Serialize` impl. Import goes through
//! [`Value::infer`], which picks the narrowest wire kind for each JSON
//! value. Inference is a convenience for tools and tests; code that
//! talks to a real server should build objects with the typed setters,
//! because the server checks kinds.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Number;

use crate::{ProtocolError, SfsArray, SfsObject, Value};

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn serialize_float<S: Serializer>(v: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if v.is_finite() {
        serializer.serialize_f64(v)
    } else {
        serializer.serialize_none()
    }
}

/// Serializes as a sequence of finite-or-null numbers.
struct Floats<'a, T>(&'a [T]);

impl<T: Copy + Into<f64>> Serialize for Floats<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| {
            let v: f64 = (*v).into();
            v.is_finite().then_some(v)
        }))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Byte(v) => serializer.serialize_i8(*v),
            Value::Short(v) => serializer.serialize_i16(*v),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::Long(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serialize_float(f64::from(*v), serializer),
            Value::Double(v) => serialize_float(*v, serializer),
            Value::UtfString(v) => serializer.serialize_str(v),
            Value::BoolArray(v) => serializer.collect_seq(v),
            Value::ByteArray(v) => serializer.collect_seq(v),
            Value::ShortArray(v) => serializer.collect_seq(v),
            Value::IntArray(v) => serializer.collect_seq(v),
            Value::LongArray(v) => serializer.collect_seq(v),
            Value::FloatArray(v) => Floats(v).serialize(serializer),
            Value::DoubleArray(v) => Floats(v).serialize(serializer),
            Value::UtfStringArray(v) => serializer.collect_seq(v),
            Value::Array(v) => v.serialize(serializer),
            Value::Object(v) => v.serialize(serializer),
        }
    }
}

impl Serialize for SfsObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for SfsArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

impl Value {
    /// Infers a wire value from JSON.
    ///
    /// | JSON                             | wire kind                         |
    /// |----------------------------------|-----------------------------------|
    /// | `null` / bool / string           | `Null` / `Bool` / `UtfString`     |
    /// | integer                          | narrowest of Byte, Short, Int, Long |
    /// | other number                     | `Double`                          |
    /// | object                           | `Object`, recursively             |
    /// | array of bools / strings         | `BoolArray` / `UtfStringArray`    |
    /// | array of integers in `0..=255`   | `ByteArray`                       |
    /// | array of other integers          | narrowest of Short, Int, LongArray |
    /// | array of numbers                 | `DoubleArray`                     |
    /// | anything else, or empty          | `Array`                           |
    ///
    /// Every element of an array is inspected. Integers above `i64::MAX`
    /// have no wire kind and fail with `UnsupportedValue`.
    pub fn infer(json: &serde_json::Value) -> Result<Value, ProtocolError> {
        use serde_json::Value as Json;

        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match integer(n)? {
                Some(i) => narrowest_scalar(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::UtfString(s.clone()),
            Json::Object(_) => Value::Object(SfsObject::from_json(json)?),
            Json::Array(items) => infer_array(items)?,
        })
    }
}

fn integer(n: &Number) -> Result<Option<i64>, ProtocolError> {
    if let Some(i) = n.as_i64() {
        return Ok(Some(i));
    }
    if n.is_u64() {
        return Err(ProtocolError::UnsupportedValue(format!(
            "integer {n} does not fit a long"
        )));
    }
    Ok(None)
}

fn narrowest_scalar(i: i64) -> Value {
    if let Ok(v) = i8::try_from(i) {
        Value::Byte(v)
    } else if let Ok(v) = i16::try_from(i) {
        Value::Short(v)
    } else if let Ok(v) = i32::try_from(i) {
        Value::Int(v)
    } else {
        Value::Long(i)
    }
}

fn infer_array(items: &[serde_json::Value]) -> Result<Value, ProtocolError> {
    use serde_json::Value as Json;

    if items.is_empty() {
        return Ok(Value::Array(SfsArray::new()));
    }

    if let Some(bools) = items.iter().map(Json::as_bool).collect::<Option<Vec<_>>>() {
        return Ok(Value::BoolArray(bools));
    }

    if let Some(strings) = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(Value::UtfStringArray(strings));
    }

    if items.iter().all(Json::is_number) {
        let mut ints = Vec::with_capacity(items.len());
        for item in items {
            if let Json::Number(n) = item {
                match integer(n)? {
                    Some(i) => ints.push(i),
                    None => {
                        let doubles = items.iter().filter_map(Json::as_f64).collect();
                        return Ok(Value::DoubleArray(doubles));
                    }
                }
            }
        }
        return Ok(narrowest_int_array(ints));
    }

    items
        .iter()
        .map(Value::infer)
        .collect::<Result<SfsArray, _>>()
        .map(Value::Array)
}

fn narrowest_int_array(ints: Vec<i64>) -> Value {
    let fits = |lo: i64, hi: i64| ints.iter().all(|i| (lo..=hi).contains(i));

    if fits(0, 255) {
        Value::ByteArray(ints.iter().map(|&i| i as u8).collect())
    } else if fits(i16::MIN.into(), i16::MAX.into()) {
        Value::ShortArray(ints.iter().map(|&i| i as i16).collect())
    } else if fits(i32::MIN.into(), i32::MAX.into()) {
        Value::IntArray(ints.iter().map(|&i| i as i32).collect())
    } else {
        Value::LongArray(ints)
    }
}

impl SfsObject {
    /// Builds an object from a JSON object, inferring every field.
    pub fn from_json(json: &serde_json::Value) -> Result<SfsObject, ProtocolError> {
        let map = json.as_object().ok_or_else(|| {
            ProtocolError::UnsupportedValue(format!("expected a json object, got {json}"))
        })?;
        let mut obj = SfsObject::with_capacity(map.len());
        for (key, value) in map {
            obj.put(key.as_str(), Value::infer(value)?);
        }
        Ok(obj)
    }

    pub fn from_json_str(text: &str) -> Result<SfsObject, ProtocolError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_scalars_pick_the_narrowest_kind() {
        assert_eq!(Value::infer(&json!(5)).unwrap(), Value::Byte(5));
        assert_eq!(Value::infer(&json!(-200)).unwrap(), Value::Short(-200));
        assert_eq!(Value::infer(&json!(70_000)).unwrap(), Value::Int(70_000));
        assert_eq!(Value::infer(&json!(1i64 << 40)).unwrap(), Value::Long(1 << 40));
        assert_eq!(Value::infer(&json!(0.5)).unwrap(), Value::Double(0.5));
    }

    #[test]
    fn test_arrays_inspect_every_element() {
        assert_eq!(
            Value::infer(&json!([1, 2, 255])).unwrap(),
            Value::ByteArray(vec![1, 2, 255])
        );
        // the last element decides it cannot be a byte array
        assert_eq!(
            Value::infer(&json!([1, 2, 256])).unwrap(),
            Value::ShortArray(vec![1, 2, 256])
        );
        assert_eq!(
            Value::infer(&json!([1, -1])).unwrap(),
            Value::ShortArray(vec![1, -1])
        );
        assert_eq!(
            Value::infer(&json!([1, 100_000])).unwrap(),
            Value::IntArray(vec![1, 100_000])
        );
        assert_eq!(
            Value::infer(&json!([1, 2.5])).unwrap(),
            Value::DoubleArray(vec![1.0, 2.5])
        );
        assert_eq!(
            Value::infer(&json!(["a", "b"])).unwrap(),
            Value::UtfStringArray(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            Value::infer(&json!([true, false])).unwrap(),
            Value::BoolArray(vec![true, false])
        );
    }

    #[test]
    fn test_mixed_and_empty_arrays_become_sfs_arrays() {
        let mixed = Value::infer(&json!([1, "x", null])).unwrap();
        let arr = mixed.as_array().unwrap();
        assert_eq!(arr.get(0), Some(&Value::Byte(1)));
        assert_eq!(arr.get(1), Some(&Value::from("x")));
        assert_eq!(arr.get(2), Some(&Value::Null));

        assert_eq!(
            Value::infer(&json!([])).unwrap(),
            Value::Array(SfsArray::new())
        );
    }

    #[test]
    fn test_huge_unsigned_is_unsupported() {
        assert!(matches!(
            Value::infer(&json!(u64::MAX)),
            Err(ProtocolError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_from_json_requires_an_object() {
        assert!(SfsObject::from_json(&json!([1])).is_err());
        let obj = SfsObject::from_json_str(r#"{"name":"bob","lvl":3}"#).unwrap();
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["name", "lvl"]);
        assert_eq!(obj.get_byte("lvl").unwrap(), 3);
    }

    #[test]
    fn test_export_shapes() {
        let mut inner = SfsObject::new();
        inner.put_byte_array("raw", vec![1, 2]);
        let mut obj = SfsObject::new();
        obj.put_int("n", 7)
            .put_double("bad", f64::NAN)
            .put_float_array("f", vec![0.5, f32::INFINITY])
            .put_sfs_object("inner", inner);

        assert_eq!(
            obj.to_json().unwrap(),
            json!({"n": 7, "bad": null, "f": [0.5, null], "inner": {"raw": [1, 2]}})
        );
    }
}
