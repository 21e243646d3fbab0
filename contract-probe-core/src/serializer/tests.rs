use super::*;
use chrono::{TimeZone, Timelike};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn test_plain_values_stay_plain() {
    let value = Value::Map(BTreeMap::from([
        ("a".to_string(), Value::Int(1)),
        ("b".to_string(), Value::List(vec![Value::Bool(true), Value::Null, Value::Float(1.5)])),
    ]));
    assert_eq!(value.to_wire(), json!({"a": 1, "b": [true, null, 1.5]}));
}

#[test]
fn test_tagged_forms() {
    let d = Value::decimal("12.50").unwrap();
    assert_eq!(d.to_wire(), json!({"__type__": "decimal", "value": "12.50"}));

    let offset = FixedOffset::east_opt(2 * 3600).unwrap();
    let dt = offset.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    assert_eq!(
        Value::DateTime(dt).to_wire(),
        json!({"__type__": "datetime", "value": "2024-03-01T12:30:00+02:00"})
    );

    assert_eq!(
        Value::Bytes(vec![0xde, 0xad]).to_wire(),
        json!({"__type__": "bytes", "value": "dead"})
    );
    assert_eq!(
        Value::Float(f64::NEG_INFINITY).to_wire(),
        json!({"__type__": "float", "value": "-inf"})
    );
    assert_eq!(
        Value::Tuple(vec![Value::Int(1), Value::Str("x".into())]).to_wire(),
        json!({"__type__": "tuple", "value": [1, "x"]})
    );
}

#[test]
fn test_map_with_reserved_key_is_wrapped() {
    let value = Value::Map(BTreeMap::from([(TYPE_KEY.to_string(), Value::Str("decimal".into()))]));
    let wire = value.to_wire();
    assert_eq!(wire, json!({"__type__": "map", "value": {"__type__": "decimal"}}));
    assert_eq!(Value::from_wire(&wire).unwrap(), value);
}

#[test]
fn test_object_round_trip() {
    let value = Value::Object {
        type_name: "Point".to_string(),
        fields: BTreeMap::from([("x".to_string(), Value::Int(1)), ("y".to_string(), Value::Int(2))]),
    };
    let wire = value.to_wire();
    assert_eq!(wire["class"], json!("Point"));
    assert_eq!(Value::from_wire(&wire).unwrap(), value);
}

#[test]
fn test_set_is_order_independent() {
    let a = Value::set(vec![Value::Int(3), Value::Int(1), Value::Int(3)]);
    let b = Value::set(vec![Value::Int(1), Value::Int(3)]);
    assert_eq!(a, b);
    assert_eq!(a.to_canonical_bytes(), b.to_canonical_bytes());
}

#[test]
fn test_unknown_tag_is_serialization_error() {
    let err = Value::from_wire(&json!({"__type__": "complex", "value": [1, 2]})).unwrap_err();
    assert!(matches!(err, ProbeError::Serialization(_)));
    assert!(err.to_string().contains("Unknown type tag 'complex'"));
}

#[test]
fn test_malformed_payloads_rejected() {
    assert!(Value::from_wire(&json!({"__type__": "decimal", "value": "12.5.1"})).is_err());
    assert!(Value::from_wire(&json!({"__type__": "date", "value": "2024-13-01"})).is_err());
    assert!(Value::from_wire(&json!({"__type__": "bytes", "value": "zz"})).is_err());
    assert!(Value::from_wire(&json!({"__type__": "tuple", "value": "x"})).is_err());
    assert!(Value::from_wire(&json!({"__type__": 7})).is_err());
}

#[test]
fn test_canonical_bytes_sort_keys() {
    let value = Value::Map(BTreeMap::from([
        ("zeta".to_string(), Value::Int(1)),
        ("alpha".to_string(), Value::decimal("0.1").unwrap()),
    ]));
    assert_eq!(
        value.to_canonical_string(),
        r#"{"alpha":{"__type__":"decimal","value":"0.1"},"zeta":1}"#
    );
}

#[test]
fn test_from_serialize() {
    #[derive(Serialize)]
    struct Order {
        id: u32,
        tags: Vec<String>,
    }

    let value = Value::from_serialize(&Order { id: 7, tags: vec!["a".into()] }).unwrap();
    assert_eq!(
        value,
        Value::Map(BTreeMap::from([
            ("id".to_string(), Value::Int(7)),
            ("tags".to_string(), Value::List(vec![Value::Str("a".into())])),
        ]))
    );

    let bad: BTreeMap<(i32, i32), i32> = BTreeMap::from([((1, 2), 3)]);
    assert!(matches!(Value::from_serialize(&bad), Err(ProbeError::Serialization(_))));
}

#[test]
fn test_serde_impls_use_wire_form() {
    let value: Value = serde_json::from_str(r#"{"__type__": "decimal", "value": "3.14"}"#).unwrap();
    assert_eq!(value, Value::Decimal("3.14".to_string()));
    assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"__type__":"decimal","value":"3.14"}"#);
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-zA-Z0-9 _#]{0,12}".prop_map(Value::Str),
        "-?[0-9]{1,18}\\.[0-9]{1,8}".prop_map(Value::Decimal),
        (0i64..4_000_000_000, 0u32..1_000_000_000, -720i32..720).prop_map(|(secs, nanos, minutes)| {
            let offset = FixedOffset::east_opt(minutes * 60).unwrap();
            let utc = DateTime::from_timestamp(secs, nanos).unwrap();
            Value::DateTime(utc.with_timezone(&offset))
        }),
        (0i64..4_000_000_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
            Value::NaiveDateTime(DateTime::from_timestamp(secs, nanos).unwrap().naive_utc())
        }),
        (0u32..86_400, 0u32..1_000_000).prop_map(|(secs, micros)| {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap();
            Value::Time(time.with_nanosecond(micros * 1000).unwrap())
        }),
    ]
}

fn nested() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("(__type__|[a-z_]{1,6})", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(value in nested()) {
        let wire = value.to_wire();
        prop_assert_eq!(Value::from_wire(&wire).unwrap(), value.clone());

        let bytes = value.to_canonical_bytes();
        let reparsed: Json = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(Value::from_wire(&reparsed).unwrap(), value);
    }
}
