//! Integration tests for the codec and framer working together.

use std::io::Cursor;

use foxwire_protocol::{
    DecodeOptions, Envelope, FrameDecoder, ProtocolError, ReadSource, Request, SfsArray,
    SfsObject, Value, compile_packet, decode_object, decode_object_from, decode_value_from,
    encode_object, encode_value,
};

// =========================================================================
// Helpers
// =========================================================================

/// One field of every kind, plus nesting three levels deep.
fn every_kind() -> SfsObject {
    let mut leaf = SfsObject::new();
    leaf.put_utf_string("name", "leaf")
        .put_sfs_array("empty_arr", SfsArray::new())
        .put_sfs_object("empty_obj", SfsObject::new());

    let mut mid_arr = SfsArray::new();
    mid_arr.add_sfs_object(leaf).add_long(-9).add_null();

    let mut mid = SfsObject::new();
    mid.put_sfs_array("items", mid_arr);

    let mut obj = SfsObject::new();
    obj.put_null("null")
        .put_bool("bool", true)
        .put_byte("byte", -128)
        .put_short("short", -32768)
        .put_int("int", i32::MAX)
        .put_long("long", i64::MIN)
        .put_float("float", 3.5)
        .put_double("double", -0.1)
        .put_utf_string("str", "héllo")
        .put_bool_array("bools", vec![true, false, true])
        .put_byte_array("bytes", vec![0, 127, 255])
        .put_short_array("shorts", vec![-1, 0, 1])
        .put_int_array("ints", vec![i32::MIN, 0, i32::MAX])
        .put_long_array("longs", vec![1 << 50])
        .put_float_array("floats", vec![0.25, -1.5])
        .put_double_array("doubles", vec![std::f64::consts::E])
        .put_utf_string_array("strs", vec!["a".into(), String::new(), "ccc".into()])
        .put_sfs_object("mid", mid);
    obj
}

// =========================================================================
// Round trips
// =========================================================================

#[test]
fn test_every_kind_round_trips_through_slice_and_stream() {
    let obj = every_kind();
    let bytes = encode_object(&obj).unwrap();

    let from_slice = decode_object(&bytes).unwrap();
    assert_eq!(from_slice, obj);
    assert_eq!(
        from_slice.keys().collect::<Vec<_>>(),
        obj.keys().collect::<Vec<_>>()
    );

    let from_stream = decode_object_from(Cursor::new(&bytes[..]), DecodeOptions::default()).unwrap();
    assert_eq!(from_stream, obj);
}

#[test]
fn test_nested_value_is_reachable_after_round_trip() {
    let bytes = encode_object(&every_kind()).unwrap();
    let obj = decode_object(&bytes).unwrap();

    let leaf = obj
        .get_sfs_object("mid")
        .unwrap()
        .get_sfs_array("items")
        .unwrap()
        .get_sfs_object(0)
        .unwrap();
    assert_eq!(leaf.get_utf_string("name").unwrap(), "leaf");
    assert!(leaf.get_sfs_array("empty_arr").unwrap().is_empty());
}

#[test]
fn test_counts_are_exact_so_values_pack_back_to_back() {
    // Three values written consecutively must decode one after another
    // with nothing left over and nothing missing.
    let values = [
        Value::IntArray(vec![1, 2, 3]),
        Value::UtfStringArray(vec!["x".into()]),
        Value::Byte(9),
    ];
    let mut stream = Vec::new();
    for v in &values {
        stream.extend_from_slice(&encode_value(v).unwrap());
    }

    let mut source = ReadSource::new(Cursor::new(stream));
    for v in &values {
        assert_eq!(&decode_value_from(&mut source, DecodeOptions::default()).unwrap(), v);
    }
    let cursor = source.into_inner();
    assert_eq!(cursor.position() as usize, cursor.get_ref().len());
}

#[test]
fn test_stream_decode_stops_at_the_object_boundary() {
    let mut first = SfsObject::new();
    first.put_int("n", 1);
    let mut second = SfsObject::new();
    second.put_int("n", 2);

    let mut stream = encode_object(&first).unwrap().to_vec();
    stream.extend_from_slice(&encode_object(&second).unwrap());

    let mut cursor = Cursor::new(stream);
    let a = decode_object_from(&mut cursor, DecodeOptions::default()).unwrap();
    let b = decode_object_from(&mut cursor, DecodeOptions::default()).unwrap();
    assert_eq!((a.get_int("n").unwrap(), b.get_int("n").unwrap()), (1, 2));
}

#[test]
fn test_truncated_body_is_an_error_not_a_default() {
    let bytes = encode_object(&every_kind()).unwrap();
    for cut in [1, 3, bytes.len() / 2, bytes.len() - 1] {
        let err = decode_object(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, ProtocolError::TruncatedInput { .. }),
            "cut at {cut}: {err}"
        );
    }
}

// =========================================================================
// Framing
// =========================================================================

#[test]
fn test_large_object_uses_long_frame_and_survives_fragmentation() {
    let mut obj = SfsObject::new();
    obj.put_byte_array("blob", vec![0xab; 100_000]);
    let packet = compile_packet(&obj).unwrap();
    assert_eq!(packet[0], 0x88);

    let mut decoder = FrameDecoder::new();
    let mut bodies = Vec::new();
    for chunk in packet.chunks(4096) {
        decoder.extend(chunk);
        while let Some(body) = decoder.next_frame().unwrap() {
            bodies.push(body);
        }
    }
    assert_eq!(bodies.len(), 1);
    assert_eq!(decode_object(&bodies[0]).unwrap(), obj);
}

#[test]
fn test_two_frames_in_one_read() {
    let mut a = SfsObject::new();
    a.put_utf_string("c", "a");
    let mut b = SfsObject::new();
    b.put_utf_string("c", "b");

    let mut bytes = compile_packet(&a).unwrap().to_vec();
    bytes.extend_from_slice(&compile_packet(&b).unwrap());

    let mut decoder = FrameDecoder::new();
    decoder.extend(&bytes);
    let first = decoder.next_frame().unwrap().unwrap();
    let second = decoder.next_frame().unwrap().unwrap();
    assert!(decoder.next_frame().unwrap().is_none());
    assert_eq!(decode_object(&first).unwrap(), a);
    assert_eq!(decode_object(&second).unwrap(), b);
}

// =========================================================================
// Session messages
// =========================================================================

#[test]
fn test_login_packet_bytes() {
    let packet = Request::login("Z", "u", "", SfsObject::new()).compile().unwrap();

    #[rustfmt::skip]
    let body: &[u8] = &[
        18, 0, 3,
        0, 1, b'c', 2, 0,
        0, 1, b'a', 3, 0, 1,
        0, 1, b'p', 18, 0, 4,
            0, 2, b'z', b'n', 8, 0, 1, b'Z',
            0, 2, b'u', b'n', 8, 0, 1, b'u',
            0, 2, b'p', b'w', 8, 0, 0,
            0, 1, b'p', 18, 0, 0,
    ];
    assert_eq!(packet[0], 0x80);
    assert_eq!(u16::from_be_bytes([packet[1], packet[2]]) as usize, body.len());
    assert_eq!(&packet[3..], body);
}

#[test]
fn test_login_reply_parses_as_envelope() {
    let mut p = SfsObject::new();
    p.put_utf_string("zn", "BasicExamples")
        .put_utf_string("un", "bob")
        .put_short("id", 7);
    let reply = Envelope::new(0, 1, p);

    let packet = reply.clone().compile().unwrap();
    let mut decoder = FrameDecoder::new();
    decoder.extend(&packet);
    let body = decoder.next_frame().unwrap().unwrap();

    let env = Envelope::from_object(decode_object(&body).unwrap()).unwrap();
    assert_eq!(env, reply);
    assert!(env.is_system());
    assert_eq!(env.payload.get_utf_string("un").unwrap(), "bob");
}

#[test]
fn test_extension_login_example_end_to_end() {
    let mut inner = SfsObject::new();
    inner.put_utf_string("n", "bob");
    let mut p = SfsObject::new();
    p.put_utf_string("c", "login").put_sfs_object("p", inner);

    let packet = Envelope::new(1, 12, p).compile().unwrap();
    assert_eq!(packet[0], 0x80);
    let n = u16::from_be_bytes([packet[1], packet[2]]) as usize;
    assert_eq!(packet.len(), 3 + n);

    let mut decoder = FrameDecoder::new();
    decoder.extend(&packet);
    let body = decoder.next_frame().unwrap().unwrap();
    assert_eq!(body.len(), n);

    let env = Envelope::from_object(decode_object(&body).unwrap()).unwrap();
    assert_eq!((env.controller, env.action), (1, 12));
    assert_eq!(env.command(), Some("login"));
    let params = env.payload.get_sfs_object("p").unwrap();
    assert_eq!(params.get_utf_string("n").unwrap(), "bob");
}

#[test]
fn test_compiled_record_at_the_short_frame_boundary() {
    // Root header (3) + key "k" (3) + tag (1) + byte array count (4).
    const OVERHEAD: usize = 11;

    for (body_len, marker, header_len) in [(65534, 0x80, 3), (65535, 0x88, 5)] {
        let mut obj = SfsObject::new();
        obj.put_byte_array("k", vec![7u8; body_len - OVERHEAD]);
        assert_eq!(encode_object(&obj).unwrap().len(), body_len);

        let packet = compile_packet(&obj).unwrap();
        assert_eq!(packet[0], marker, "body of {body_len} bytes");
        assert_eq!(packet.len(), header_len + body_len);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&packet);
        let body = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decode_object(&body).unwrap(), obj);
        assert!(decoder.next_frame().unwrap().is_none());
    }
}
