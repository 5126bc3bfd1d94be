// ABOUTME: BSON (Binary JSON) encoder/decoder with bit-exact numeric codecs and a dynamic value model.
// ABOUTME: Provides document-level entry points plus serde integration through the Bson tree.

//! # bson-wire
//!
//! A BSON encoder and decoder for Rust. Documents round-trip byte for byte,
//! including the deprecated element types, and every scalar goes through an
//! exact codec: IEEE 754-2008 Decimal128, 64-bit `Long`, ObjectId, and a
//! byte-level UTF-8 validator.
//!
//! ## Quick Start
//!
//! ```rust
//! use bson_wire::{deserialize, doc, serialize, Bson, EncoderConfig};
//!
//! let doc = doc! { "hello": "world", "n": 1 };
//! let bytes = serialize(&doc, &EncoderConfig::default()).unwrap();
//! assert_eq!(bytes.len(), 29);
//!
//! // Int32 decodes to a bare number by default.
//! let decoded = deserialize(&bytes).unwrap();
//! assert_eq!(decoded.get("n"), Some(&Bson::Number(1.0)));
//! assert_eq!(decoded.get_str("hello"), Some("world"));
//! ```
//!
//! ## Serde
//!
//! ```rust
//! use bson_wire::{from_slice, to_vec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let person = Person { name: "Alice".to_string(), age: 30 };
//! let bytes = to_vec(&person).unwrap();
//! let decoded: Person = from_slice(&bytes).unwrap();
//! assert_eq!(person, decoded);
//! ```
//!
//! ## Decoder options
//!
//! ```rust
//! use bson_wire::{deserialize_with_config, doc, serialize, Bson, DecoderConfig, EncoderConfig, Long};
//!
//! let bytes = serialize(&doc! { "big": (Long::from_i64(1 << 60)) }, &EncoderConfig::default()).unwrap();
//! let config = DecoderConfig::default().with_bigint64(true);
//! let decoded = deserialize_with_config(&bytes, config).unwrap();
//! assert_eq!(decoded.get("big"), Some(&Bson::BigInt(1 << 60)));
//! ```
//!
//! ## Resource Limits
//!
//! - Maximum document size: `i32::MAX` bytes
//! - Maximum nesting depth on decode: 512 (configurable)
//! - Self-referencing value graphs are rejected on encode

pub mod binary;
pub mod buffer;
pub mod de;
pub mod decimal128;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod long;
pub mod oid;
pub mod ser;
pub mod types;
pub mod utf8;
pub mod value;

// Re-export commonly used items at the crate root
pub use binary::{Binary, VectorDType};
pub use de::{from_bson, from_document, Deserializer};
pub use decimal128::Decimal128;
pub use decoder::{Decoder, DecoderConfig, Utf8Validation};
pub use encoder::{Encoder, EncoderConfig};
pub use error::{Error, ErrorKind, Result};
pub use long::Long;
pub use oid::ObjectId;
pub use ser::{to_bson, to_document, Serializer};
pub use types::{binary_subtype, element_type, limits};
pub use value::{
    Array, Bson, Code, DateTime, DbPointer, DbRef, Document, Pattern, Regex, Shared, Timestamp,
};

// The bson! and doc! macros are exported at the crate root via #[macro_export]

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Emit one debug event for a failed operation and pass the result through.
fn traced<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        tracing::debug!(operation, kind = ?err.kind(), error = %err, "bson operation failed");
    }
    result
}

/// Encode a document.
///
/// # Example
///
/// ```rust
/// use bson_wire::{doc, serialize, EncoderConfig};
///
/// let bytes = serialize(&doc! {}, &EncoderConfig::default()).unwrap();
/// assert_eq!(bytes, vec![5, 0, 0, 0, 0]);
/// ```
pub fn serialize(doc: &Document, config: &EncoderConfig) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    serialize_into(doc, &mut out, config)?;
    Ok(out)
}

/// Encode a top-level value. It must be a document, a DBRef, raw document
/// bytes, or a shared node holding one of those.
pub fn serialize_value(value: &Bson, config: &EncoderConfig) -> Result<Vec<u8>> {
    let mut encoder = Encoder::with_config(Vec::new(), *config);
    traced("serialize", encoder.write_root(value))?;
    let out = encoder.into_inner();
    tracing::trace!(size = out.len(), "serialized value");
    Ok(out)
}

/// Append an encoded document to `buf`, returning the number of bytes written.
///
/// On failure `buf` is truncated back to its original length.
pub fn serialize_into(doc: &Document, buf: &mut Vec<u8>, config: &EncoderConfig) -> Result<usize> {
    let start = buf.len();
    let mut encoder = Encoder::with_config(std::mem::take(buf), *config);
    let result = encoder.write_document(doc);
    *buf = encoder.into_inner();
    if let Err(err) = traced("serialize", result) {
        buf.truncate(start);
        return Err(err);
    }
    let written = buf.len() - start;
    tracing::trace!(size = written, keys = doc.len(), "serialized document");
    Ok(written)
}

/// Exact number of bytes `serialize` would produce for `doc`.
pub fn calculate_object_size(doc: &Document, config: &EncoderConfig) -> Result<usize> {
    traced(
        "calculate_object_size",
        encoder::calculate_document_size(doc, *config),
    )
}

/// Decode a document with the default options.
pub fn deserialize(data: &[u8]) -> Result<Document> {
    deserialize_with_config(data, DecoderConfig::default())
}

/// Decode a document with custom options.
pub fn deserialize_with_config(data: &[u8], config: DecoderConfig) -> Result<Document> {
    tracing::trace!(len = data.len(), index = config.index, "deserializing document");
    let mut decoder = Decoder::with_config(data, config);
    traced("deserialize", decoder.decode_document())
}

/// Decode a top-level document, promoting it to `Bson::DbRef` when it has the DBRef shape.
///
/// # Example
///
/// ```rust
/// use bson_wire::{deserialize_value, doc, serialize, Bson, DecoderConfig, EncoderConfig};
///
/// let bytes = serialize(&doc! { "$ref": "users", "$id": 7 }, &EncoderConfig::default()).unwrap();
/// let value = deserialize_value(&bytes, DecoderConfig::default()).unwrap();
/// assert!(matches!(value, Bson::DbRef(_)));
/// ```
pub fn deserialize_value(data: &[u8], config: DecoderConfig) -> Result<Bson> {
    tracing::trace!(len = data.len(), index = config.index, "deserializing value");
    let mut decoder = Decoder::with_config(data, config);
    traced("deserialize", decoder.decode_value())
}

/// Serialize any map-shaped value to BSON bytes.
pub fn to_vec<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    let doc = traced("to_vec", to_document(value))?;
    serialize(&doc, &EncoderConfig::default())
}

/// Deserialize a value from BSON bytes using the default decoder options.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let doc = deserialize(data)?;
    traced("from_slice", from_document(doc))
}

#[cfg(test)]
mod lib_tests;
#[cfg(test)]
mod ser_tests;
