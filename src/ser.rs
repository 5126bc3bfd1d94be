// ABOUTME: Serde Serializer that turns any Serialize type into a Bson value tree.
// ABOUTME: Also implements Serialize for Bson, Document and ObjectId so they can travel through other formats.

use crate::binary::Binary;
use crate::error::{Error, Result};
use crate::long::Long;
use crate::oid::ObjectId;
use crate::value::{number_fits_int32, Array, Bson, Document, OpenShared, Shared};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq};
use std::cell::RefCell;

/// Convert a serializable value into a `Bson` tree.
pub fn to_bson<T: ?Sized + Serialize>(value: &T) -> Result<Bson> {
    value.serialize(Serializer)
}

/// Convert a serializable value into a `Document`. Values that do not serialize as a map fail.
pub fn to_document<T: ?Sized + Serialize>(value: &T) -> Result<Document> {
    match to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(Error::UnsupportedType(format!(
            "expected a document, got {}",
            crate::types::element_type::name(other.element_type())
        ))),
    }
}

/// A serde Serializer that builds `Bson` values.
///
/// Integers up to 32 bits become `Int32`, wider ones `Int64`, floats `Double`,
/// byte slices generic `Binary`, and unit variants their name as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer;

impl ser::Serializer for Serializer {
    type Ok = Bson;
    type Error = Error;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = TupleVariantSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = StructVariantSerializer;

    fn serialize_bool(self, v: bool) -> Result<Bson> {
        Ok(Bson::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Bson> {
        Ok(Bson::Int32(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Bson> {
        Ok(Bson::Int32(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Bson> {
        Ok(Bson::Int32(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Bson> {
        Ok(Bson::Int64(Long::from_i64(v)))
    }

    fn serialize_i128(self, v: i128) -> Result<Bson> {
        if i64::try_from(v).is_ok() {
            Ok(Bson::BigInt(v))
        } else {
            Err(Error::NumericAmbiguity {
                value: v.to_string(),
            })
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Bson> {
        Ok(Bson::Int32(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Bson> {
        Ok(Bson::Int32(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Bson> {
        Ok(Bson::Int64(Long::from_i64(i64::from(v))))
    }

    fn serialize_u64(self, v: u64) -> Result<Bson> {
        i64::try_from(v)
            .map(|n| Bson::Int64(Long::from_i64(n)))
            .map_err(|_| Error::NumericAmbiguity {
                value: v.to_string(),
            })
    }

    fn serialize_u128(self, v: u128) -> Result<Bson> {
        match i128::try_from(v) {
            Ok(n) => self.serialize_i128(n),
            Err(_) => Err(Error::NumericAmbiguity {
                value: v.to_string(),
            }),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Bson> {
        Ok(Bson::Double(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Bson> {
        Ok(Bson::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Bson> {
        Ok(Bson::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Bson> {
        Ok(Bson::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Bson> {
        Ok(Bson::Binary(Binary::generic(v.to_vec())))
    }

    fn serialize_none(self) -> Result<Bson> {
        Ok(Bson::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Bson> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Bson> {
        Ok(Bson::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Bson> {
        Ok(Bson::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Bson> {
        Ok(Bson::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Bson> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Bson> {
        let mut doc = Document::new();
        doc.insert(variant, value.serialize(self)?);
        Ok(Bson::Document(doc))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer> {
        Ok(SeqSerializer {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TupleVariantSerializer> {
        Ok(TupleVariantSerializer {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapSerializer> {
        Ok(MapSerializer {
            doc: Document::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapSerializer> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructVariantSerializer> {
        Ok(StructVariantSerializer {
            variant,
            doc: Document::with_capacity(len),
        })
    }
}

// =============================================================================
// Compound serializers
// =============================================================================

pub struct SeqSerializer {
    items: Array,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(Serializer)?);
        Ok(())
    }

    fn end(self) -> Result<Bson> {
        Ok(Bson::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Bson> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Bson> {
        ser::SerializeSeq::end(self)
    }
}

pub struct TupleVariantSerializer {
    variant: &'static str,
    items: Array,
}

impl ser::SerializeTupleVariant for TupleVariantSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(Serializer)?);
        Ok(())
    }

    fn end(self) -> Result<Bson> {
        let mut doc = Document::new();
        doc.insert(self.variant, Bson::Array(self.items));
        Ok(Bson::Document(doc))
    }
}

pub struct MapSerializer {
    doc: Document,
    next_key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| Error::Custom("map value serialized before its key".into()))?;
        self.doc.insert(key, value.serialize(Serializer)?);
        Ok(())
    }

    fn end(self) -> Result<Bson> {
        Ok(Bson::Document(self.doc))
    }
}

impl ser::SerializeStruct for MapSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.doc.insert(key, value.serialize(Serializer)?);
        Ok(())
    }

    fn end(self) -> Result<Bson> {
        Ok(Bson::Document(self.doc))
    }
}

pub struct StructVariantSerializer {
    variant: &'static str,
    doc: Document,
}

impl ser::SerializeStructVariant for StructVariantSerializer {
    type Ok = Bson;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.doc.insert(key, value.serialize(Serializer)?);
        Ok(())
    }

    fn end(self) -> Result<Bson> {
        let mut outer = Document::new();
        outer.insert(self.variant, Bson::Document(self.doc));
        Ok(Bson::Document(outer))
    }
}

// =============================================================================
// Map keys
// =============================================================================

/// Map keys must be strings; integers and chars are stringified.
struct MapKeySerializer;

fn key_must_be_string() -> Error {
    Error::UnsupportedType("map keys must be strings".into())
}

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = Error;
    type SerializeSeq = ser::Impossible<String, Error>;
    type SerializeTuple = ser::Impossible<String, Error>;
    type SerializeTupleStruct = ser::Impossible<String, Error>;
    type SerializeTupleVariant = ser::Impossible<String, Error>;
    type SerializeMap = ser::Impossible<String, Error>;
    type SerializeStruct = ser::Impossible<String, Error>;
    type SerializeStructVariant = ser::Impossible<String, Error>;

    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_owned())
    }

    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }
    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(itoa::Buffer::new().format(v).to_owned())
    }

    fn serialize_bool(self, _v: bool) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_none(self) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_unit(self) -> Result<String> {
        Err(key_must_be_string())
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<String> {
        Err(key_must_be_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(key_must_be_string())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_must_be_string())
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_must_be_string())
    }
    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(key_must_be_string())
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_must_be_string())
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_must_be_string())
    }
    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_must_be_string())
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_must_be_string())
    }
}

// =============================================================================
// Serialize for the value model
// =============================================================================

impl Serialize for Document {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, &Field { name: key, value })?;
        }
        map.end()
    }
}

/// A value with the field name it is stored under, used to name the field of a cycle.
struct Field<'a> {
    name: &'a str,
    value: &'a Bson,
}

impl Serialize for Field<'_> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.value {
            Bson::Shared(shared) => serialize_shared(shared, self.name, serializer),
            value => value.serialize(serializer),
        }
    }
}

fn serialize_array<S: ser::Serializer>(
    items: &Array,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(items.len()))?;
    let mut index = itoa::Buffer::new();
    for (i, value) in items.iter().enumerate() {
        seq.serialize_element(&Field {
            name: index.format(i),
            value,
        })?;
    }
    seq.end()
}

fn serialize_shared<S: ser::Serializer>(
    shared: &Shared,
    field: &str,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let Some(_open) = OpenShared::enter(shared) else {
        return Err(circular_reference(field));
    };
    let inner = shared.read();
    let entry = Field {
        name: field,
        value: &*inner,
    };
    entry.serialize(serializer)
}

thread_local! {
    static PENDING_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

/// Build a serializer error for a cycle. `Error::custom` picks up the typed
/// error; other serializers only see its message.
fn circular_reference<E: ser::Error>(field: &str) -> E {
    let err = Error::CircularReference {
        field: field.to_owned(),
    };
    let message = err.to_string();
    PENDING_ERROR.with(|pending| *pending.borrow_mut() = Some(err));
    let out = E::custom(message);
    take_pending_error();
    out
}

/// The typed error waiting behind the `custom` call in progress, if any.
pub(crate) fn take_pending_error() -> Option<Error> {
    PENDING_ERROR.with(|pending| pending.borrow_mut().take())
}

impl Serialize for ObjectId {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Single-entry marker maps such as `{"$minKey": 1}`.
fn serialize_marker<S: ser::Serializer>(
    serializer: S,
    key: &str,
    value: &Bson,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

/// Maps onto the serde data model. Types with no serde counterpart use their text
/// form or a `$`-keyed marker map, so a round trip through `to_bson` is not lossless for them.
impl Serialize for Bson {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Bson::Double(f) => serializer.serialize_f64(*f),
            Bson::Number(f) => {
                if number_fits_int32(*f) {
                    #[allow(clippy::cast_possible_truncation)]
                    let n = *f as i32;
                    serializer.serialize_i32(n)
                } else {
                    serializer.serialize_f64(*f)
                }
            }
            Bson::String(s) | Bson::Symbol(s) => serializer.serialize_str(s),
            Bson::Document(doc) => doc.serialize(serializer),
            Bson::Array(items) => serialize_array(items, serializer),
            Bson::Binary(binary) => serializer.serialize_bytes(&binary.bytes),
            Bson::Bytes(bytes) | Bson::RawDocument(bytes) => serializer.serialize_bytes(bytes),
            Bson::Undefined | Bson::Null => serializer.serialize_unit(),
            Bson::ObjectId(oid) => oid.serialize(serializer),
            Bson::Boolean(b) => serializer.serialize_bool(*b),
            Bson::DateTime(dt) => match dt.timestamp_millis() {
                Some(millis) => serializer.serialize_i64(millis),
                None => serializer.serialize_unit(),
            },
            Bson::RegularExpression(regex) => {
                serializer.serialize_str(&format!("/{}/{}", regex.pattern, regex.options))
            }
            Bson::Pattern(pattern) => {
                serializer.serialize_str(&format!("/{}/{}", pattern.source(), pattern.flags()))
            }
            Bson::DbPointer(pointer) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$ref", &pointer.namespace)?;
                map.serialize_entry("$id", &pointer.id)?;
                map.end()
            }
            Bson::DbRef(dbref) => dbref.to_document().serialize(serializer),
            Bson::JavaScriptCode(code) => match &code.scope {
                None => serializer.serialize_str(&code.code),
                Some(scope) => {
                    let mut map = serializer.serialize_map(Some(2))?;
                    map.serialize_entry("$code", &code.code)?;
                    map.serialize_entry("$scope", scope)?;
                    map.end()
                }
            },
            Bson::Int32(n) => serializer.serialize_i32(*n),
            Bson::Timestamp(ts) => serializer.serialize_u64(ts.to_u64()),
            Bson::Int64(long) => {
                if long.is_unsigned() {
                    serializer.serialize_u64(long.to_u64())
                } else {
                    serializer.serialize_i64(long.to_i64())
                }
            }
            Bson::BigInt(n) => serializer.serialize_i128(*n),
            Bson::Decimal128(d) => serializer.serialize_str(&d.to_string()),
            Bson::MinKey => serialize_marker(serializer, "$minKey", &Bson::Int32(1)),
            Bson::MaxKey => serialize_marker(serializer, "$maxKey", &Bson::Int32(1)),
            Bson::Shared(shared) => serialize_shared(shared, "", serializer),
        }
    }
}
