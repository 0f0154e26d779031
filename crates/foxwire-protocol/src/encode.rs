//! Encoding: `Value` trees to bytes.
//!
//! Layout summary (all multi-byte numbers big-endian):
//!
//! ```text
//! value        = tag:u8 payload
//! object       = 18 count:u16 { key_len:u16 key tag payload }*
//! array        = 17 count:u16 { tag payload }*
//! utf_string   = len:u16 utf8-bytes
//! byte_array   = count:u32 bytes
//! other arrays = count:u16 element*
//! ```
//!
//! Every length is checked against its header width. A value that does
//! not fit is an error, never a silently truncated length.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{ProtocolError, SfsArray, SfsObject, TypeTag, Value};

/// Encodes an object, including its leading tag byte.
///
/// This is the form carried as a frame body.
pub fn encode_object(obj: &SfsObject) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_u8(TypeTag::SfsObject.into());
    write_object_body(&mut buf, obj)?;
    Ok(buf.freeze())
}

/// Encodes an array, including its leading tag byte.
pub fn encode_array(arr: &SfsArray) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u8(TypeTag::SfsArray.into());
    write_array_body(&mut buf, arr)?;
    Ok(buf.freeze())
}

/// Encodes any single value as `tag || payload`.
pub fn encode_value(value: &Value) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(32);
    write_value(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Appends `tag || payload` to `buf`.
pub fn write_value(buf: &mut BytesMut, value: &Value) -> Result<(), ProtocolError> {
    buf.put_u8(value.type_tag().into());
    match value {
        Value::Null => {}
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::Byte(v) => buf.put_i8(*v),
        Value::Short(v) => buf.put_i16(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::Long(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_f32(*v),
        Value::Double(v) => buf.put_f64(*v),
        Value::UtfString(v) => write_string(buf, v, "utf_string")?,
        Value::BoolArray(v) => {
            write_count(buf, v.len(), "bool_array")?;
            for b in v {
                buf.put_u8(u8::from(*b));
            }
        }
        Value::ByteArray(v) => {
            let len = u32::try_from(v.len()).map_err(|_| {
                ProtocolError::LengthOverflow {
                    what: "byte_array",
                    len: v.len(),
                    max: u32::MAX as usize,
                }
            })?;
            buf.put_u32(len);
            buf.put_slice(v);
        }
        Value::ShortArray(v) => {
            write_count(buf, v.len(), "short_array")?;
            v.iter().for_each(|x| buf.put_i16(*x));
        }
        Value::IntArray(v) => {
            write_count(buf, v.len(), "int_array")?;
            v.iter().for_each(|x| buf.put_i32(*x));
        }
        Value::LongArray(v) => {
            write_count(buf, v.len(), "long_array")?;
            v.iter().for_each(|x| buf.put_i64(*x));
        }
        Value::FloatArray(v) => {
            write_count(buf, v.len(), "float_array")?;
            v.iter().for_each(|x| buf.put_f32(*x));
        }
        Value::DoubleArray(v) => {
            write_count(buf, v.len(), "double_array")?;
            v.iter().for_each(|x| buf.put_f64(*x));
        }
        Value::UtfStringArray(v) => {
            write_count(buf, v.len(), "utf_string_array")?;
            for s in v {
                write_string(buf, s, "utf_string_array element")?;
            }
        }
        Value::Array(v) => write_array_body(buf, v)?,
        Value::Object(v) => write_object_body(buf, v)?,
    }
    Ok(())
}

fn write_object_body(buf: &mut BytesMut, obj: &SfsObject) -> Result<(), ProtocolError> {
    write_count(buf, obj.len(), "sfs_object")?;
    for (key, value) in obj.iter() {
        write_string(buf, key, "key")?;
        write_value(buf, value)?;
    }
    Ok(())
}

fn write_array_body(buf: &mut BytesMut, arr: &SfsArray) -> Result<(), ProtocolError> {
    write_count(buf, arr.len(), "sfs_array")?;
    for value in arr {
        write_value(buf, value)?;
    }
    Ok(())
}

/// Writes an exact element count as a u16.
fn write_count(buf: &mut BytesMut, len: usize, what: &'static str) -> Result<(), ProtocolError> {
    let count = u16::try_from(len).map_err(|_| ProtocolError::LengthOverflow {
        what,
        len,
        max: u16::MAX as usize,
    })?;
    buf.put_u16(count);
    Ok(())
}

/// Writes a u16 byte length followed by the UTF-8 bytes.
fn write_string(buf: &mut BytesMut, s: &str, what: &'static str) -> Result<(), ProtocolError> {
    write_count(buf, s.len(), what)?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_big_endian() {
        assert_eq!(encode_value(&Value::Short(0x0102)).unwrap()[..], [3, 1, 2]);
        assert_eq!(
            encode_value(&Value::Int(-2)).unwrap()[..],
            [4, 0xff, 0xff, 0xff, 0xfe]
        );
        assert_eq!(
            encode_value(&Value::Float(1.0)).unwrap()[..],
            [6, 0x3f, 0x80, 0x00, 0x00]
        );
        assert_eq!(
            encode_value(&Value::Double(1.0)).unwrap()[..],
            [7, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_null_has_no_payload() {
        assert_eq!(encode_value(&Value::Null).unwrap()[..], [0]);
    }

    #[test]
    fn test_string_length_is_utf8_byte_length() {
        // "é" is two bytes in UTF-8.
        let bytes = encode_value(&Value::from("é")).unwrap();
        assert_eq!(bytes[..], [8, 0, 2, 0xc3, 0xa9]);
    }

    #[test]
    fn test_array_headers_carry_the_exact_count() {
        let ints = encode_value(&Value::IntArray(vec![7, 8])).unwrap();
        assert_eq!(ints[..3], [12, 0, 2]);
        assert_eq!(ints.len(), 3 + 2 * 4);

        let bytes = encode_value(&Value::ByteArray(vec![1, 2, 3])).unwrap();
        assert_eq!(bytes[..], [10, 0, 0, 0, 3, 1, 2, 3]);

        let empty = encode_value(&Value::BoolArray(vec![])).unwrap();
        assert_eq!(empty[..], [9, 0, 0]);
    }

    #[test]
    fn test_object_field_layout() {
        let mut obj = SfsObject::new();
        obj.put_bool("ok", true);
        let bytes = encode_object(&obj).unwrap();
        assert_eq!(bytes[..], [18, 0, 1, 0, 2, b'o', b'k', 1, 1]);
    }

    #[test]
    fn test_array_elements_have_no_keys() {
        let mut arr = SfsArray::new();
        arr.add_byte(-1).add_null();
        let bytes = encode_array(&arr).unwrap();
        assert_eq!(bytes[..], [17, 0, 2, 2, 0xff, 0]);
    }

    #[test]
    fn test_oversized_string_is_rejected() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let err = encode_value(&Value::UtfString(long)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::LengthOverflow { what: "utf_string", len: 65536, .. }
        ));
    }

    #[test]
    fn test_oversized_key_is_rejected() {
        let mut obj = SfsObject::new();
        obj.put_null("k".repeat(70_000));
        assert!(matches!(
            encode_object(&obj),
            Err(ProtocolError::LengthOverflow { what: "key", .. })
        ));
    }
}
