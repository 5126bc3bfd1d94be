// ABOUTME: Serde Deserializer that reads any Deserialize type out of a Bson value tree.
// ABOUTME: Also implements Deserialize for Bson, Document and ObjectId via visitors.

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::long::Long;
use crate::oid::ObjectId;
use crate::value::{Array, Bson, Document, OpenShared};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use std::fmt;

/// Convert a `Bson` value into a deserializable type.
pub fn from_bson<T: DeserializeOwned>(value: Bson) -> Result<T> {
    T::deserialize(Deserializer::new(value))
}

/// Convert a `Document` into a deserializable type.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    from_bson(Bson::Document(doc))
}

/// A serde Deserializer over an owned `Bson` value.
pub struct Deserializer {
    value: Bson,
    field: String,
}

impl Deserializer {
    #[must_use]
    pub fn new(value: Bson) -> Self {
        Self::in_field(value, String::new())
    }

    fn in_field(value: Bson, field: String) -> Self {
        Self { value, field }
    }
}

/// Integral numbers are offered as integers so that integer fields accept promoted values.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn visit_number<'de, V: Visitor<'de>>(f: f64, visitor: V) -> Result<V::Value> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        visitor.visit_i64(f as i64)
    } else {
        visitor.visit_f64(f)
    }
}

fn visit_document<'de, V: Visitor<'de>>(doc: Document, visitor: V) -> Result<V::Value> {
    let len = doc.len();
    let mut map = MapDeserializer {
        iter: doc.into_iter(),
        value: None,
    };
    let value = visitor.visit_map(&mut map)?;
    if map.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer fields"))
    }
}

fn visit_array<'de, V: Visitor<'de>>(items: Array, visitor: V) -> Result<V::Value> {
    let len = items.len();
    let mut seq = SeqDeserializer {
        iter: items.into_iter(),
        index: 0,
    };
    let value = visitor.visit_seq(&mut seq)?;
    if seq.iter.len() == 0 {
        Ok(value)
    } else {
        Err(de::Error::invalid_length(len, &"fewer elements"))
    }
}

fn marker(key: &str) -> Document {
    let mut doc = Document::new();
    doc.insert(key, 1);
    doc
}

impl<'de> de::Deserializer<'de> for Deserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Bson::Double(f) => visitor.visit_f64(f),
            Bson::Number(f) => visit_number(f, visitor),
            Bson::String(s) | Bson::Symbol(s) => visitor.visit_string(s),
            Bson::Document(doc) => visit_document(doc, visitor),
            Bson::Array(items) => visit_array(items, visitor),
            Bson::Binary(binary) => visitor.visit_byte_buf(binary.bytes),
            Bson::Bytes(bytes) => visitor.visit_byte_buf(bytes),
            Bson::Undefined | Bson::Null => visitor.visit_unit(),
            Bson::ObjectId(oid) => visitor.visit_string(oid.to_hex()),
            Bson::Boolean(b) => visitor.visit_bool(b),
            Bson::DateTime(dt) => match dt.timestamp_millis() {
                Some(millis) => visitor.visit_i64(millis),
                None => visitor.visit_unit(),
            },
            Bson::RegularExpression(regex) => {
                visitor.visit_string(format!("/{}/{}", regex.pattern, regex.options))
            }
            Bson::Pattern(pattern) => {
                visitor.visit_string(format!("/{}/{}", pattern.source(), pattern.flags()))
            }
            Bson::DbPointer(pointer) => {
                let mut doc = Document::new();
                doc.insert("$ref", pointer.namespace);
                doc.insert("$id", pointer.id);
                visit_document(doc, visitor)
            }
            Bson::DbRef(dbref) => visit_document(dbref.to_document(), visitor),
            Bson::JavaScriptCode(code) => match code.scope {
                None => visitor.visit_string(code.code),
                Some(scope) => {
                    let mut doc = Document::new();
                    doc.insert("$code", code.code);
                    doc.insert("$scope", scope);
                    visit_document(doc, visitor)
                }
            },
            Bson::Int32(n) => visitor.visit_i32(n),
            Bson::Timestamp(ts) => visitor.visit_u64(ts.to_u64()),
            Bson::Int64(long) => {
                if long.is_unsigned() {
                    visitor.visit_u64(long.to_u64())
                } else {
                    visitor.visit_i64(long.to_i64())
                }
            }
            Bson::BigInt(n) => visitor.visit_i128(n),
            Bson::Decimal128(d) => visitor.visit_string(d.to_string()),
            Bson::MinKey => visit_document(marker("$minKey"), visitor),
            Bson::MaxKey => visit_document(marker("$maxKey"), visitor),
            Bson::RawDocument(bytes) => {
                let doc = Decoder::new(&bytes).decode_document()?;
                visit_document(doc, visitor)
            }
            Bson::Shared(shared) => {
                let Some(_open) = OpenShared::enter(&shared) else {
                    return Err(Error::CircularReference { field: self.field });
                };
                let inner = shared.read().clone();
                Deserializer::in_field(inner, self.field).deserialize_any(visitor)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Bson::Null | Bson::Undefined => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Bson::String(variant) => visitor.visit_enum(variant.into_deserializer()),
            Bson::Document(doc) => {
                let mut iter = doc.into_iter();
                match (iter.next(), iter.next()) {
                    (Some((variant, value)), None) => {
                        visitor.visit_enum(EnumDeserializer { variant, value })
                    }
                    _ => Err(de::Error::invalid_value(
                        de::Unexpected::Map,
                        &"a map with a single key",
                    )),
                }
            }
            other => Err(de::Error::invalid_type(
                unexpected(&other),
                &"a string or a single-key map",
            )),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

fn unexpected(value: &Bson) -> de::Unexpected<'_> {
    match value {
        Bson::Boolean(b) => de::Unexpected::Bool(*b),
        Bson::Double(f) | Bson::Number(f) => de::Unexpected::Float(*f),
        Bson::String(s) => de::Unexpected::Str(s),
        Bson::Array(_) => de::Unexpected::Seq,
        Bson::Null | Bson::Undefined => de::Unexpected::Unit,
        Bson::Int32(n) => de::Unexpected::Signed(i64::from(*n)),
        _ => de::Unexpected::Other(crate::types::element_type::name(value.element_type())),
    }
}

// =============================================================================
// Access helpers
// =============================================================================

struct SeqDeserializer {
    iter: std::vec::IntoIter<Bson>,
    index: usize,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => {
                let field = self.index.to_string();
                self.index += 1;
                seed.deserialize(Deserializer::in_field(value, field)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: indexmap::map::IntoIter<String, Bson>,
    value: Option<(String, Bson)>,
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some((key.clone(), value));
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (key, value) = self
            .value
            .take()
            .ok_or_else(|| Error::Custom("map value requested before its key".into()))?;
        seed.deserialize(Deserializer::in_field(value, key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Bson,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(self.variant.into_deserializer())?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Bson,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            Bson::Null | Bson::Undefined => Ok(()),
            other => Err(de::Error::invalid_type(unexpected(&other), &"unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(Deserializer::new(self.value))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Bson::Array(items) => visit_array(items, visitor),
            other => Err(de::Error::invalid_type(unexpected(&other), &"tuple variant")),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.value {
            Bson::Document(doc) => visit_document(doc, visitor),
            other => Err(de::Error::invalid_type(unexpected(&other), &"struct variant")),
        }
    }
}

// =============================================================================
// Deserialize for the value model
// =============================================================================

struct BsonVisitor;

impl<'de> Visitor<'de> for BsonVisitor {
    type Value = Bson;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any BSON-representable value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Bson, E> {
        Ok(Bson::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Bson, E> {
        Ok(match i32::try_from(v) {
            Ok(n) => Bson::Int32(n),
            Err(_) => Bson::Int64(Long::from_i64(v)),
        })
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> std::result::Result<Bson, E> {
        match i64::try_from(v) {
            Ok(n) => self.visit_i64(n),
            Err(_) => Err(E::custom(format!("integer {v} does not fit in 64 bits"))),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Bson, E> {
        match i64::try_from(v) {
            Ok(n) => self.visit_i64(n),
            Err(_) => Ok(Bson::Int64(Long::from_u64(v))),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Bson, E> {
        Ok(Bson::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Bson, E> {
        Ok(Bson::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Bson, E> {
        Ok(Bson::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Bson, E> {
        Ok(Bson::Binary(crate::binary::Binary::generic(v.to_vec())))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Bson, E> {
        Ok(Bson::Binary(crate::binary::Binary::generic(v)))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Bson, E> {
        Ok(Bson::Null)
    }

    fn visit_some<D: de::Deserializer<'de>>(self, d: D) -> std::result::Result<Bson, D::Error> {
        de::Deserialize::deserialize(d)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Bson, E> {
        Ok(Bson::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Bson, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Bson::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Bson, A::Error> {
        DocumentVisitor.visit_map(map).map(Bson::Document)
    }
}

impl<'de> de::Deserialize<'de> for Bson {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_any(BsonVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Document, A::Error> {
        let mut doc = Document::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Bson>()? {
            doc.insert(key, value);
        }
        Ok(doc)
    }
}

impl<'de> de::Deserialize<'de> for Document {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_map(DocumentVisitor)
    }
}

struct ObjectIdVisitor;

impl<'de> Visitor<'de> for ObjectIdVisitor {
    type Value = ObjectId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 24 character hex string or 12 bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ObjectId, E> {
        ObjectId::parse_str(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<ObjectId, E> {
        let bytes: [u8; 12] = v
            .try_into()
            .map_err(|_| E::invalid_length(v.len(), &self))?;
        Ok(ObjectId::from_bytes(bytes))
    }
}

impl<'de> de::Deserialize<'de> for ObjectId {
    fn deserialize<D: de::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_any(ObjectIdVisitor)
    }
}
