// ABOUTME: Integration tests for the crate-level entry points.
// ABOUTME: Tests document round trips, size agreement, append semantics and serde helpers.

use crate::{
    calculate_object_size, deserialize, deserialize_value, deserialize_with_config, doc,
    from_slice, serialize, serialize_into, serialize_value, to_vec, Binary, Bson, Code,
    DbPointer, DbRef, Decimal128, DecoderConfig, Document, EncoderConfig, Long, ObjectId, Regex,
    Shared, Timestamp,
};
use serde::{Deserialize, Serialize};

fn every_kind() -> Document {
    let mut doc = Document::new();
    doc.insert("double", Bson::Double(1.25));
    doc.insert("string", "text");
    doc.insert("doc", doc! { "inner": true });
    doc.insert("array", vec![Bson::Int32(1), Bson::String("two".into())]);
    doc.insert("binary", Binary::new(0x80, vec![1, 2, 3]));
    doc.insert("old", Binary::new(2, vec![4, 5]));
    doc.insert("oid", ObjectId::from_bytes([9; 12]));
    doc.insert("bool", false);
    doc.insert("date", crate::DateTime::from_millis(1_700_000_000_000));
    doc.insert("null", Bson::Null);
    doc.insert("regex", Regex::from_parts("^a", "im"));
    doc.insert(
        "pointer",
        DbPointer { namespace: "db.c".into(), id: ObjectId::from_bytes([1; 12]) },
    );
    doc.insert("code", Code::new("f()"));
    doc.insert("symbol", Bson::Symbol("sym".into()));
    doc.insert("scoped", Code::with_scope("g()", doc! { "y": 1 }));
    doc.insert("int32", Bson::Int32(-7));
    doc.insert("ts", Timestamp::new(10, 20));
    doc.insert("int64", Long::from_i64(-(1 << 40)));
    doc.insert("decimal", "1.5E+10".parse::<Decimal128>().unwrap());
    doc.insert("min", Bson::MinKey);
    doc.insert("max", Bson::MaxKey);
    doc
}

fn exact() -> DecoderConfig {
    DecoderConfig::default()
        .with_promote_values(false)
        .with_bson_regexp(true)
}

#[test]
fn test_round_trip_every_kind() {
    let doc = every_kind();
    let bytes = serialize(&doc, &EncoderConfig::default()).unwrap();
    let decoded = deserialize_with_config(&bytes, exact()).unwrap();
    assert_eq!(decoded, doc);
    assert_eq!(serialize(&decoded, &EncoderConfig::default()).unwrap(), bytes);
}

#[test]
fn test_size_agrees_with_encoding() {
    let doc = every_kind();
    let bytes = serialize(&doc, &EncoderConfig::default()).unwrap();
    assert_eq!(
        calculate_object_size(&doc, &EncoderConfig::default()).unwrap(),
        bytes.len()
    );
    assert_eq!(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize, bytes.len());
}

#[test]
fn test_serialize_into_appends_and_restores() {
    let mut buf = vec![0xee];
    let written = serialize_into(&doc! { "a": 1 }, &mut buf, &EncoderConfig::default()).unwrap();
    assert_eq!(written, 12);
    assert_eq!(buf.len(), 13);
    assert_eq!(buf[0], 0xee);

    let err = serialize_into(&doc! { "bad\0": 1 }, &mut buf, &EncoderConfig::default()).unwrap_err();
    assert_eq!(err.error_type(), "null_byte");
    assert_eq!(buf.len(), 13);
}

#[test]
fn test_serialize_value_roots() {
    let config = EncoderConfig::default();
    let dbref = DbRef::new("c", ObjectId::from_bytes([2; 12]));
    let bytes = serialize_value(&Bson::DbRef(dbref.clone()), &config).unwrap();
    assert_eq!(deserialize_value(&bytes, DecoderConfig::default()).unwrap(), Bson::DbRef(dbref));

    let shared = Shared::new(doc! { "k": "v" });
    let bytes = serialize_value(&Bson::Shared(shared), &config).unwrap();
    assert_eq!(deserialize(&bytes).unwrap().get_str("k"), Some("v"));

    let err = serialize_value(&Bson::Array(vec![]), &config).unwrap_err();
    assert_eq!(err.error_type(), "unsupported_type");
}

#[test]
fn test_nested_cycle_rejected() {
    let node = Shared::new(Document::new());
    node.set(doc! { "child": { "back": (node.clone()) } });
    let root = doc! { "root": (node.clone()) };
    let err = serialize(&root, &EncoderConfig::default()).unwrap_err();
    assert_eq!(err.error_type(), "circular_reference");
    node.set(Document::new());
}

#[test]
fn test_default_promotion() {
    let doc = doc! {
        "i": 5,
        "l": (Long::from_i64(9)),
        "sym": (Bson::Symbol("s".into())),
        "u": (Bson::Undefined)
    };
    let bytes = serialize(&doc, &EncoderConfig::default()).unwrap();
    let decoded = deserialize(&bytes).unwrap();
    assert_eq!(decoded.get("i"), Some(&Bson::Number(5.0)));
    assert_eq!(decoded.get("l"), Some(&Bson::Number(9.0)));
    assert_eq!(decoded.get("sym"), Some(&Bson::String("s".into())));
    assert_eq!(decoded.get("u"), Some(&Bson::Null));
}

#[test]
fn test_roundtrip_struct() {
    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        tags: Vec<String>,
        score: Option<f64>,
    }

    let person = Person {
        name: "Alice".to_string(),
        age: 30,
        tags: vec!["a".into(), "b".into()],
        score: Some(2.5),
    };
    let bytes = to_vec(&person).unwrap();
    let decoded: Person = from_slice(&bytes).unwrap();
    assert_eq!(person, decoded);
}
