// ABOUTME: BSON binary encoder over a Sink, shared by real encoding and size precomputation.
// ABOUTME: Length prefixes are written as placeholders and patched once each container closes.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use crate::binary::Binary;
use crate::buffer::{SizeCounter, Sink};
use crate::error::{Error, Result};
use crate::types::{binary_subtype, element_type, limits};
use crate::value::{sort_options, Bson, Code, DbRef, Document, Regex, Shared};

/// Keys allowed to start with `$` even when key checking is on.
const RESERVED_KEYS: [&str; 4] = ["$ref", "$id", "$db", "$clusterTime"];

/// Configuration options for the encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderConfig {
    /// Reject keys starting with `$` or containing `.` (default: false)
    pub check_keys: bool,
    /// Omit `Undefined` document fields instead of writing null (default: false)
    pub ignore_undefined: bool,
}

impl EncoderConfig {
    #[must_use]
    pub fn with_check_keys(mut self, check: bool) -> Self {
        self.check_keys = check;
        self
    }

    #[must_use]
    pub fn with_ignore_undefined(mut self, ignore: bool) -> Self {
        self.ignore_undefined = ignore;
        self
    }
}

/// A BSON encoder that writes to a sink.
///
/// The encoder tracks the chain of shared nodes it is inside so that a graph
/// referring back to one of its ancestors fails instead of recursing forever.
pub struct Encoder<S: Sink> {
    sink: S,
    config: EncoderConfig,
    /// Identities of the shared nodes currently being encoded, outermost first.
    path: Vec<usize>,
}

impl<S: Sink> Encoder<S> {
    /// Create a new encoder that writes to the given sink.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, EncoderConfig::default())
    }

    /// Create a new encoder with custom configuration.
    pub fn with_config(sink: S, config: EncoderConfig) -> Self {
        Self {
            sink,
            config,
            path: Vec::new(),
        }
    }

    /// Consume the encoder and return the underlying sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Get a reference to the underlying sink.
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Encode a top-level value, which must be document-shaped.
    pub fn write_root(&mut self, value: &Bson) -> Result<()> {
        match value {
            Bson::Document(doc) => self.write_document(doc),
            Bson::DbRef(dbref) => self.write_dbref(dbref),
            Bson::RawDocument(bytes) => self.write_raw_document(bytes),
            Bson::Shared(shared) => {
                let guard = self.enter(shared, "")?;
                let result = self.write_root(&guard);
                drop(guard);
                self.path.pop();
                result
            }
            other => Err(Error::UnsupportedType(format!(
                "cannot serialize {} as a top-level document",
                element_type::name(other.element_type())
            ))),
        }
    }

    /// Encode a document with its length prefix and terminator.
    pub fn write_document(&mut self, doc: &Document) -> Result<()> {
        let start = self.begin_container();
        for (key, value) in doc {
            self.check_key(key)?;
            self.write_element(key, value, false)?;
        }
        self.end_container(start)
    }

    // =========================================================================
    // Containers
    // =========================================================================

    #[inline]
    fn begin_container(&mut self) -> usize {
        let start = self.sink.position();
        self.sink.write_i32(0);
        start
    }

    fn end_container(&mut self, start: usize) -> Result<()> {
        self.sink.write_u8(0);
        let size = self.sink.position() - start;
        if size > limits::MAX_DOCUMENT_SIZE {
            return Err(Error::DocumentTooLarge { size });
        }
        self.sink.patch_i32(start, size as i32);
        Ok(())
    }

    fn write_array(&mut self, items: &[Bson]) -> Result<()> {
        let start = self.begin_container();
        let mut index = itoa::Buffer::new();
        for (i, item) in items.iter().enumerate() {
            self.write_element(index.format(i), item, true)?;
        }
        self.end_container(start)
    }

    /// A DBRef is written as `{$ref, $id, $db?, ...fields}`; its keys bypass key checking.
    fn write_dbref(&mut self, dbref: &DbRef) -> Result<()> {
        let saved = self.config.check_keys;
        self.config.check_keys = false;
        let result = self.write_dbref_fields(dbref);
        self.config.check_keys = saved;
        result
    }

    fn write_dbref_fields(&mut self, dbref: &DbRef) -> Result<()> {
        let start = self.begin_container();
        self.write_tagged("$ref", element_type::STRING);
        self.write_string(&dbref.collection);
        self.write_element("$id", &dbref.id, false)?;
        if let Some(db) = &dbref.db {
            self.write_tagged("$db", element_type::STRING);
            self.write_string(db);
        }
        for (key, value) in &dbref.fields {
            self.check_key(key)?;
            self.write_element(key, value, false)?;
        }
        self.end_container(start)
    }

    /// Pre-encoded bytes are checked for a consistent size prefix and terminator, then copied.
    fn write_raw_document(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < limits::MIN_DOCUMENT_SIZE {
            return Err(Error::InvalidDocumentSize {
                offset: 0,
                size: bytes.len() as i64,
            });
        }
        let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if i64::from(declared) != bytes.len() as i64 {
            return Err(Error::BufferSizeMismatch {
                size: declared.max(0) as usize,
                available: bytes.len(),
            });
        }
        if bytes[bytes.len() - 1] != 0 {
            return Err(Error::MissingTerminator {
                offset: bytes.len() - 1,
            });
        }
        self.sink.write_bytes(bytes);
        Ok(())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn check_key(&self, key: &str) -> Result<()> {
        if key.contains('\0') {
            return Err(Error::NullByte {
                context: "key",
                value: key.to_owned(),
            });
        }
        if !self.config.check_keys {
            return Ok(());
        }
        if key.starts_with('$') && !RESERVED_KEYS.contains(&key) {
            return Err(Error::InvalidKey {
                key: key.to_owned(),
                reason: "must not start with '$'",
            });
        }
        if key.contains('.') {
            return Err(Error::InvalidKey {
                key: key.to_owned(),
                reason: "must not contain '.'",
            });
        }
        Ok(())
    }

    /// Mark a shared node as entered, failing if it is already on the path.
    fn enter<'s>(
        &mut self,
        shared: &'s Shared,
        field: &str,
    ) -> Result<std::sync::RwLockReadGuard<'s, Bson>> {
        let id = shared.id();
        if self.path.contains(&id) {
            return Err(Error::CircularReference {
                field: field.to_owned(),
            });
        }
        self.path.push(id);
        Ok(shared.read())
    }

    #[inline]
    fn write_tagged(&mut self, key: &str, tag: u8) {
        self.sink.write_u8(tag);
        self.sink.write_cstring(key.as_bytes());
    }

    fn write_element(&mut self, key: &str, value: &Bson, in_array: bool) -> Result<()> {
        match value {
            Bson::Shared(shared) => {
                let guard = self.enter(shared, key)?;
                let result = self.write_element(key, &guard, in_array);
                drop(guard);
                self.path.pop();
                return result;
            }
            Bson::Undefined if self.config.ignore_undefined && !in_array => return Ok(()),
            _ => {}
        }

        self.write_tagged(key, value.element_type());
        match value {
            Bson::Double(f) => self.sink.write_f64(*f),
            Bson::Number(f) => {
                if value.element_type() == element_type::INT32 {
                    self.sink.write_i32(*f as i32);
                } else {
                    self.sink.write_f64(*f);
                }
            }
            Bson::String(s) | Bson::Symbol(s) => self.write_string(s),
            Bson::Document(doc) => self.write_document(doc)?,
            Bson::DbRef(dbref) => self.write_dbref(dbref)?,
            Bson::RawDocument(bytes) => self.write_raw_document(bytes)?,
            Bson::Array(items) => self.write_array(items)?,
            Bson::Binary(binary) => self.write_binary(binary)?,
            Bson::Bytes(bytes) => {
                self.sink.write_i32(bytes.len() as i32);
                self.sink.write_u8(binary_subtype::GENERIC);
                self.sink.write_bytes(bytes);
            }
            Bson::Undefined | Bson::Null | Bson::MinKey | Bson::MaxKey => {}
            Bson::ObjectId(oid) => self.sink.write_bytes(&oid.bytes()),
            Bson::Boolean(b) => self.sink.write_u8(u8::from(*b)),
            Bson::DateTime(dt) => self.sink.write_i64(dt.timestamp_millis().unwrap_or(0)),
            Bson::RegularExpression(regex) => self.write_regex(regex)?,
            Bson::Pattern(pattern) => {
                self.write_regex(&Regex::from_parts(pattern.source(), pattern.flags()))?;
            }
            Bson::DbPointer(pointer) => {
                self.write_string(&pointer.namespace);
                self.sink.write_bytes(&pointer.id.bytes());
            }
            Bson::JavaScriptCode(code) => self.write_code(code)?,
            Bson::Int32(n) => self.sink.write_i32(*n),
            Bson::Timestamp(ts) => {
                self.sink.write_u32(ts.increment);
                self.sink.write_u32(ts.time);
            }
            Bson::Int64(long) => self.sink.write_i64(long.to_i64()),
            Bson::BigInt(n) => {
                let narrowed = i64::try_from(*n).map_err(|_| Error::NumericAmbiguity {
                    value: n.to_string(),
                })?;
                self.sink.write_i64(narrowed);
            }
            Bson::Decimal128(d) => self.sink.write_bytes(&d.bytes()),
            Bson::Shared(_) => {}
        }
        Ok(())
    }

    /// int32 byte length including the terminator, the UTF-8 bytes, then NUL.
    #[inline]
    fn write_string(&mut self, s: &str) {
        self.sink.write_i32(s.len() as i32 + 1);
        self.sink.write_cstring(s.as_bytes());
    }

    fn write_binary(&mut self, binary: &Binary) -> Result<()> {
        binary.validate_vector()?;
        let len = binary.bytes.len() as i32;
        if binary.subtype == binary_subtype::BINARY_OLD {
            self.sink.write_i32(len + 4);
            self.sink.write_u8(binary.subtype);
            self.sink.write_i32(len);
        } else {
            self.sink.write_i32(len);
            self.sink.write_u8(binary.subtype);
        }
        self.sink.write_bytes(&binary.bytes);
        Ok(())
    }

    fn write_regex(&mut self, regex: &Regex) -> Result<()> {
        if regex.pattern.contains('\0') {
            return Err(Error::NullByte {
                context: "regex pattern",
                value: regex.pattern.clone(),
            });
        }
        if regex.options.contains('\0') {
            return Err(Error::NullByte {
                context: "regex options",
                value: regex.options.clone(),
            });
        }
        self.sink.write_cstring(regex.pattern.as_bytes());
        self.sink.write_cstring(sort_options(&regex.options).as_bytes());
        Ok(())
    }

    fn write_code(&mut self, code: &Code) -> Result<()> {
        let Some(scope) = &code.scope else {
            self.write_string(&code.code);
            return Ok(());
        };
        let start = self.sink.position();
        self.sink.write_i32(0);
        self.write_string(&code.code);
        self.write_document(scope)?;
        let size = self.sink.position() - start;
        self.sink.patch_i32(start, size as i32);
        Ok(())
    }
}

/// Exact encoded size of a document, computed by running the encoder over a counting sink.
pub fn calculate_document_size(doc: &Document, config: EncoderConfig) -> Result<usize> {
    let mut encoder = Encoder::with_config(SizeCounter::new(), config);
    encoder.write_document(doc)?;
    Ok(encoder.into_inner().position())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal128::Decimal128;
    use crate::long::Long;
    use crate::oid::ObjectId;
    use crate::value::{DateTime, Timestamp};

    fn encode(doc: &Document) -> Result<Vec<u8>> {
        let mut encoder = Encoder::new(Vec::new());
        encoder.write_document(doc)?;
        Ok(encoder.into_inner())
    }

    fn encode_with(doc: &Document, config: EncoderConfig) -> Result<Vec<u8>> {
        let mut encoder = Encoder::with_config(Vec::new(), config);
        encoder.write_document(doc)?;
        Ok(encoder.into_inner())
    }

    #[test]
    fn test_encode_empty_document() {
        assert_eq!(encode(&Document::new()).unwrap(), vec![5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_int_and_double_numbers() {
        let mut doc = Document::new();
        doc.insert("a", Bson::Number(1.0));
        assert_eq!(
            encode(&doc).unwrap(),
            vec![0x0c, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]
        );

        let mut doc = Document::new();
        doc.insert("a", Bson::Number(-0.0));
        let bytes = encode(&doc).unwrap();
        assert_eq!(bytes[4], element_type::DOUBLE);
        assert_eq!(&bytes[7..15], &(-0.0f64).to_le_bytes());

        let mut doc = Document::new();
        doc.insert("a", Bson::Number(2_147_483_648.0));
        assert_eq!(encode(&doc).unwrap()[4], element_type::DOUBLE);
    }

    #[test]
    fn test_encode_string() {
        let mut doc = Document::new();
        doc.insert("s", "é");
        assert_eq!(
            encode(&doc).unwrap(),
            vec![0x0f, 0, 0, 0, 0x02, b's', 0, 3, 0, 0, 0, 0xc3, 0xa9, 0, 0]
        );
    }

    #[test]
    fn test_array_keys_are_indices() {
        let mut doc = Document::new();
        doc.insert("a", vec![Bson::Boolean(true), Bson::Null]);
        let bytes = encode(&doc).unwrap();
        let expected: &[u8] = &[
            0x14, 0, 0, 0, 0x04, b'a', 0, 0x0c, 0, 0, 0, 0x08, b'0', 0, 1, 0x0a, b'1', 0, 0, 0,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_null_byte_in_key_rejected() {
        let mut doc = Document::new();
        doc.insert("a\0b", 1);
        assert_eq!(encode(&doc).unwrap_err().error_type(), "null_byte");
    }

    #[test]
    fn test_check_keys() {
        let config = EncoderConfig::default().with_check_keys(true);
        let mut doc = Document::new();
        doc.insert("$bad", 1);
        assert_eq!(encode_with(&doc, config).unwrap_err().error_type(), "invalid_key");

        let mut doc = Document::new();
        doc.insert("a.b", 1);
        assert_eq!(encode_with(&doc, config).unwrap_err().error_type(), "invalid_key");

        let mut doc = Document::new();
        doc.insert("$clusterTime", 1);
        doc.insert("$db", "x");
        assert!(encode_with(&doc, config).is_ok());
        assert!(encode(&doc).is_ok());
    }

    #[test]
    fn test_undefined_handling() {
        let mut doc = Document::new();
        doc.insert("u", Bson::Undefined);
        doc.insert("a", vec![Bson::Undefined]);
        let plain = encode(&doc).unwrap();
        assert_eq!(plain[4], element_type::NULL);

        let config = EncoderConfig::default().with_ignore_undefined(true);
        let skipped = encode_with(&doc, config).unwrap();
        assert_eq!(skipped[4], element_type::ARRAY);
        assert_eq!(skipped.len(), plain.len() - 3);
    }

    #[test]
    fn test_regex_options_sorted() {
        let mut doc = Document::new();
        doc.insert("r", Bson::RegularExpression(Regex {
            pattern: "a".into(),
            options: "mi".into(),
        }));
        let bytes = encode(&doc).unwrap();
        assert_eq!(&bytes[7..12], b"a\0im\0");

        let mut doc = Document::new();
        doc.insert("r", Bson::RegularExpression(Regex {
            pattern: "a\0".into(),
            options: String::new(),
        }));
        assert_eq!(encode(&doc).unwrap_err().error_type(), "null_byte");
    }

    #[test]
    fn test_old_binary_has_inner_length() {
        let mut doc = Document::new();
        doc.insert("b", Binary::new(binary_subtype::BINARY_OLD, vec![9, 9]));
        let bytes = encode(&doc).unwrap();
        assert_eq!(&bytes[7..18], &[6, 0, 0, 0, 2, 2, 0, 0, 0, 9, 9]);
    }

    #[test]
    fn test_invalid_vector_rejected() {
        let mut doc = Document::new();
        doc.insert("v", Binary::new(binary_subtype::VECTOR, vec![0x03, 0x02, 1]));
        assert_eq!(encode(&doc).unwrap_err().error_type(), "invalid_vector");

        let mut doc = Document::new();
        doc.insert("v", Binary::from_int8_array(&[1, 2, 3]));
        let bytes = encode(&doc).unwrap();
        assert_eq!(&bytes[7..17], &[5, 0, 0, 0, 9, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_code_with_scope_length() {
        let mut scope = Document::new();
        scope.insert("x", 1);
        let mut doc = Document::new();
        doc.insert("c", Code::with_scope("f", scope));
        let bytes = encode(&doc).unwrap();
        assert_eq!(bytes[4], element_type::JAVASCRIPT_CODE_WITH_SCOPE);
        let total = i32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        // total length, string (4 + "f\0"), scope (12 bytes)
        assert_eq!(total, 4 + 6 + 12);
        assert_eq!(bytes.len(), 7 + 22 + 1);
    }

    #[test]
    fn test_scalar_layouts() {
        let oid = ObjectId::from_bytes([1; 12]);
        let mut doc = Document::new();
        doc.insert("o", oid);
        doc.insert("t", Timestamp::new(2, 1));
        doc.insert("l", Long::from_i64(-1));
        doc.insert("d", DateTime::INVALID);
        doc.insert("n", Decimal128::from_bytes([7; 16]));
        let bytes = encode(&doc).unwrap();
        let mut expected = vec![0u8; 4];
        expected.extend_from_slice(&[0x07, b'o', 0]);
        expected.extend_from_slice(&[1; 12]);
        expected.extend_from_slice(&[0x11, b't', 0, 1, 0, 0, 0, 2, 0, 0, 0]);
        expected.extend_from_slice(&[0x12, b'l', 0]);
        expected.extend_from_slice(&[0xff; 8]);
        expected.extend_from_slice(&[0x09, b'd', 0]);
        expected.extend_from_slice(&[0; 8]);
        expected.extend_from_slice(&[0x13, b'n', 0]);
        expected.extend_from_slice(&[7; 16]);
        expected.push(0);
        let len = expected.len() as i32;
        expected[..4].copy_from_slice(&len.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_bigint_out_of_range() {
        let mut doc = Document::new();
        doc.insert("b", Bson::BigInt(i128::from(i64::MAX) + 1));
        assert_eq!(encode(&doc).unwrap_err().error_type(), "numeric_ambiguity");
        let mut doc = Document::new();
        doc.insert("b", Bson::BigInt(-5));
        assert_eq!(encode(&doc).unwrap()[4], element_type::INT64);
    }

    #[test]
    fn test_cycle_detected() {
        let node = Shared::new(Document::new());
        let mut inner = Document::new();
        inner.insert("self", node.clone());
        node.set(inner);

        let mut encoder = Encoder::new(Vec::new());
        let err = encoder.write_root(&Bson::Shared(node.clone())).unwrap_err();
        assert_eq!(err, Error::CircularReference { field: "self".into() });

        // Clear the cycle so the Arc can drop.
        node.set(Document::new());
    }

    #[test]
    fn test_shared_siblings_are_not_cycles() {
        let leaf = Shared::new(Bson::Int32(3));
        let mut doc = Document::new();
        doc.insert("a", leaf.clone());
        doc.insert("b", leaf);
        let bytes = encode(&doc).unwrap();
        assert_eq!(bytes.len(), 4 + 2 * 7 + 1);
    }

    #[test]
    fn test_dbref_layout_ignores_check_keys() {
        let dbref = DbRef::new("c", Bson::Int32(1)).with_db("d");
        let config = EncoderConfig::default().with_check_keys(true);
        let mut encoder = Encoder::with_config(Vec::new(), config);
        encoder.write_root(&Bson::DbRef(dbref.clone())).unwrap();
        assert_eq!(encoder.into_inner(), encode(&dbref.to_document()).unwrap());
    }

    #[test]
    fn test_root_must_be_document() {
        let mut encoder = Encoder::new(Vec::new());
        let err = encoder.write_root(&Bson::Int32(1)).unwrap_err();
        assert_eq!(err.error_type(), "unsupported_type");
    }

    #[test]
    fn test_raw_document_copied() {
        let raw = vec![5, 0, 0, 0, 0];
        let mut doc = Document::new();
        doc.insert("r", Bson::RawDocument(raw));
        let bytes = encode(&doc).unwrap();
        assert_eq!(&bytes[4..12], &[0x03, b'r', 0, 5, 0, 0, 0, 0]);

        let mut doc = Document::new();
        doc.insert("r", Bson::RawDocument(vec![6, 0, 0, 0, 0]));
        assert!(encode(&doc).is_err());
    }

    #[test]
    fn test_size_matches_encoding() {
        let mut doc = Document::new();
        doc.insert("s", "text");
        doc.insert("n", vec![Bson::Number(1.5), Bson::Undefined]);
        doc.insert("c", Code::with_scope("x", Document::new()));
        assert_eq!(
            calculate_document_size(&doc, EncoderConfig::default()).unwrap(),
            encode(&doc).unwrap().len()
        );
    }
}
