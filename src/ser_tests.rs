// ABOUTME: Unit tests for the serde serializer module.
// ABOUTME: Tests how Rust types map onto Bson values and then onto bytes.

use crate::ser::{to_bson, to_document};
use crate::{element_type, to_vec, Binary, Bson, Long};
use serde::Serialize;
use std::collections::BTreeMap;

#[test]
fn test_serialize_primitives() {
    assert_eq!(to_bson(&true).unwrap(), Bson::Boolean(true));
    assert_eq!(to_bson(&42i32).unwrap(), Bson::Int32(42));
    assert_eq!(to_bson(&7u8).unwrap(), Bson::Int32(7));
    assert_eq!(to_bson(&42i64).unwrap(), Bson::Int64(Long::from_i64(42)));
    assert_eq!(to_bson(&u32::MAX).unwrap(), Bson::Int64(Long::from_i64(i64::from(u32::MAX))));
    assert_eq!(to_bson(&1.0f64).unwrap(), Bson::Double(1.0));
    assert_eq!(to_bson(&"hello").unwrap(), Bson::String("hello".into()));
    assert_eq!(to_bson(&'c').unwrap(), Bson::String("c".into()));
}

#[test]
fn test_serialize_unrepresentable_integers() {
    let err = to_bson(&u64::MAX).unwrap_err();
    assert_eq!(err.error_type(), "numeric_ambiguity");
    assert_eq!(to_bson(&5i128).unwrap(), Bson::BigInt(5));
    assert!(to_bson(&i128::MAX).is_err());
}

#[test]
fn test_serialize_option_and_bytes() {
    assert_eq!(to_bson(&None::<i32>).unwrap(), Bson::Null);
    assert_eq!(to_bson(&Some(42i32)).unwrap(), Bson::Int32(42));

    struct Raw<'a>(&'a [u8]);

    impl Serialize for Raw<'_> {
        fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_bytes(self.0)
        }
    }

    assert_eq!(
        to_bson(&Raw(&[1, 2])).unwrap(),
        Bson::Binary(Binary::generic(vec![1, 2]))
    );
}

#[test]
fn test_serialize_struct_bytes() {
    #[derive(Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    let bytes = to_vec(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(
        bytes,
        vec![
            0x13, 0, 0, 0, 0x10, b'x', 0, 1, 0, 0, 0, 0x10, b'y', 0, 2, 0, 0, 0, 0
        ]
    );
}

#[test]
fn test_serialize_enums() {
    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: i32, h: i32 },
        Pair(i32, i32),
    }

    assert_eq!(to_bson(&Shape::Empty).unwrap(), Bson::String("Empty".into()));
    assert_eq!(
        to_bson(&Shape::Circle(1.5)).unwrap(),
        crate::bson!({ "Circle": (Bson::Double(1.5)) })
    );
    assert_eq!(
        to_bson(&Shape::Rect { w: 1, h: 2 }).unwrap(),
        crate::bson!({ "Rect": { "w": 1, "h": 2 } })
    );
    assert_eq!(
        to_bson(&Shape::Pair(1, 2)).unwrap(),
        crate::bson!({ "Pair": [1, 2] })
    );
}

#[test]
fn test_integer_map_keys() {
    let mut map = BTreeMap::new();
    map.insert(2u32, "b");
    map.insert(1u32, "a");
    let doc = to_document(&map).unwrap();
    let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
    assert_eq!(keys, ["1", "2"]);

    let mut bad = BTreeMap::new();
    bad.insert(true, 1);
    assert_eq!(to_bson(&bad).unwrap_err().error_type(), "unsupported_type");
}

#[test]
fn test_to_vec_requires_map() {
    assert_eq!(to_vec(&vec![1, 2]).unwrap_err().error_type(), "unsupported_type");
}

#[test]
fn test_bson_number_serializes_by_value() {
    let bytes = to_vec(&crate::doc! { "n": (Bson::Number(3.0)) }).unwrap();
    assert_eq!(bytes[4], element_type::INT32);
}

#[test]
fn test_self_referencing_shared_is_rejected() {
    use crate::{doc, Error, Shared};

    let node = Shared::new(Bson::Document(crate::Document::new()));
    node.set(doc! { "me": (node.clone()) });
    let root = Bson::Shared(node.clone());

    assert_eq!(
        to_bson(&root).unwrap_err(),
        Error::CircularReference { field: "me".into() }
    );
    assert_eq!(to_vec(&root).unwrap_err().error_type(), "circular_reference");

    // Foreign serializers get the message through their own error type.
    let err = serde_json::to_string(&root).unwrap_err();
    assert!(err.to_string().contains("cyclic dependency"), "{err}");

    // A loop through an array slot names the index.
    let list = Shared::new(Bson::Array(Vec::new()));
    list.set(Bson::Array(vec![Bson::Int32(1), Bson::Shared(list.clone())]));
    assert_eq!(
        to_bson(&Bson::Shared(list.clone())).unwrap_err(),
        Error::CircularReference { field: "1".into() }
    );

    // Break the cycles so the nodes can drop.
    node.set(crate::Document::new());
    list.set(Bson::Null);
}

#[test]
fn test_shared_siblings_serialize_twice() {
    use crate::{doc, Shared};

    let leaf = Shared::new(Bson::Int32(4));
    let doc = doc! { "a": (leaf.clone()), "b": [(leaf.clone())] };
    let value = to_bson(&doc).unwrap();
    assert_eq!(value, Bson::Document(doc! { "a": 4, "b": [4] }));
    // The open path is cleared after a failure, so later walks still succeed.
    let looped = Shared::new(Bson::Null);
    looped.set(doc! { "again": (looped.clone()) });
    assert!(to_bson(&Bson::Shared(looped.clone())).is_err());
    assert!(to_bson(&doc).is_ok());
    looped.set(Bson::Null);
}
