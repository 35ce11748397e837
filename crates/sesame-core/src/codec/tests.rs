use proptest::prelude::*;

use super::*;

fn attr_value() -> impl Strategy<Value = AttrValue> {
    prop_oneof![
        any::<bool>().prop_map(AttrValue::Bool),
        any::<i64>().prop_map(AttrValue::Int),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(AttrValue::Float),
        ".*".prop_map(AttrValue::Str),
    ]
}

fn attributes() -> impl Strategy<Value = Attributes> {
    prop::collection::btree_map(".*", attr_value(), 0..8)
}

proptest! {
    #[test]
    fn decode_inverts_encode(attrs in attributes()) {
        let bytes = encode(&attrs).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), attrs);
    }
}

#[test]
fn stored_form_is_a_json_object() {
    let mut attrs = Attributes::new();
    attrs.insert("authenticated".into(), true.into());

    assert_eq!(encode(&attrs).unwrap(), br#"{"authenticated":true}"#);
}

#[test]
fn integral_floats_stay_floats() {
    let mut attrs = Attributes::new();
    attrs.insert("ratio".into(), AttrValue::Float(3.0));
    attrs.insert("count".into(), AttrValue::Int(3));

    let decoded = decode(&encode(&attrs).unwrap()).unwrap();
    assert_eq!(decoded["ratio"], AttrValue::Float(3.0));
    assert_eq!(decoded["count"], AttrValue::Int(3));
}

#[test]
fn non_finite_numbers_are_rejected() {
    for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut attrs = Attributes::new();
        attrs.insert("x".into(), x.into());

        let err = encode(&attrs).unwrap_err();
        assert!(matches!(err, EncodeError::NonFiniteNumber { ref key } if key == "x"));
    }
}

#[test]
fn malformed_bytes_fail_to_decode() {
    let cases: [&[u8]; 8] = [
        b"",
        b"{",
        b"[true]",
        b"\"authenticated\"",
        b"{\"a\":null}",
        b"{\"a\":[1,2]}",
        b"{\"a\":{\"b\":1}}",
        b"\xff\xfe",
    ];
    for bytes in cases {
        assert!(
            matches!(decode(bytes), Err(DecodeError::Malformed { .. })),
            "expected failure for {bytes:?}"
        );
    }
}

#[test]
fn empty_object_decodes_to_empty_attributes() {
    assert!(decode(b"{}").unwrap().is_empty());
}
