// ABOUTME: BSON binary decoder: validates sizes and terminators, then walks elements recursively.
// ABOUTME: DecoderConfig carries the promotion, raw, regex and UTF-8 validation options.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]

use crate::binary::Binary;
use crate::buffer::Reader;
use crate::decimal128::Decimal128;
use crate::error::{Error, Result};
use crate::long::Long;
use crate::oid::ObjectId;
use crate::types::{binary_subtype, element_type, limits};
use crate::utf8;
use crate::value::{Array, Bson, Code, DateTime, DbPointer, DbRef, Document, Pattern, Regex, Timestamp};
use std::collections::HashSet;

/// Which strings are checked for well-formed UTF-8.
///
/// Checked strings fail the decode when ill-formed; unchecked strings are
/// decoded with U+FFFD replacement. Per-key settings name top-level keys and
/// apply to everything beneath them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Utf8Validation {
    /// Check every string (default).
    #[default]
    All,
    /// Check nothing.
    Disabled,
    /// Check only values under these top-level keys.
    Only(HashSet<String>),
    /// Check everything except values under these top-level keys.
    Except(HashSet<String>),
}

/// Configuration options for the decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Decode int32 and double as `Number`, and symbol as `String` (default: true)
    pub promote_values: bool,
    /// With `promote_values`, decode int64 within ±2^53 as `Number` (default: true)
    pub promote_longs: bool,
    /// With `promote_values`, decode generic binary as `Bytes` (default: false)
    pub promote_buffers: bool,
    /// Decode regexes as `RegularExpression` instead of compiling a `Pattern` (default: false)
    pub bson_regexp: bool,
    /// Decode int64 as `BigInt` (default: false)
    pub use_bigint64: bool,
    /// Return embedded documents as `RawDocument` (default: false)
    pub raw: bool,
    /// Field names whose array values decode their documents raw
    pub fields_as_raw: HashSet<String>,
    /// UTF-8 checking policy (default: All)
    pub utf8_validation: Utf8Validation,
    /// Offset of the document within the input (default: 0)
    pub index: usize,
    /// Accept input longer than the declared document size (default: false)
    pub allow_object_smaller_than_buffer_size: bool,
    /// Maximum nesting depth
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            promote_values: true,
            promote_longs: true,
            promote_buffers: false,
            bson_regexp: false,
            use_bigint64: false,
            raw: false,
            fields_as_raw: HashSet::new(),
            utf8_validation: Utf8Validation::All,
            index: 0,
            allow_object_smaller_than_buffer_size: false,
            max_depth: limits::MAX_DEPTH,
        }
    }
}

impl DecoderConfig {
    #[must_use]
    pub fn with_promote_values(mut self, promote: bool) -> Self {
        self.promote_values = promote;
        self
    }

    #[must_use]
    pub fn with_promote_longs(mut self, promote: bool) -> Self {
        self.promote_longs = promote;
        self
    }

    #[must_use]
    pub fn with_promote_buffers(mut self, promote: bool) -> Self {
        self.promote_buffers = promote;
        self
    }

    #[must_use]
    pub fn with_bson_regexp(mut self, structured: bool) -> Self {
        self.bson_regexp = structured;
        self
    }

    #[must_use]
    pub fn with_bigint64(mut self, bigint: bool) -> Self {
        self.use_bigint64 = bigint;
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub fn with_fields_as_raw<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_as_raw = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_utf8_validation(mut self, validation: Utf8Validation) -> Self {
        self.utf8_validation = validation;
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub fn with_allow_object_smaller_than_buffer_size(mut self, allow: bool) -> Self {
        self.allow_object_smaller_than_buffer_size = allow;
        self
    }

    /// Reject option combinations that cannot be honored.
    pub fn validate(&self) -> Result<()> {
        if self.use_bigint64 && (!self.promote_values || !self.promote_longs) {
            return Err(Error::InvalidOptions(
                "must either request bigint or Long for int64 deserialization".into(),
            ));
        }
        match &self.utf8_validation {
            Utf8Validation::Only(keys) | Utf8Validation::Except(keys) if keys.is_empty() => Err(
                Error::InvalidOptions("UTF-8 validation setting cannot be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Validation applied to top-level key names.
    fn key_validation(&self) -> bool {
        matches!(
            self.utf8_validation,
            Utf8Validation::All | Utf8Validation::Only(_)
        )
    }

    /// Validation applied to the value under a top-level key.
    fn value_validation(&self, key: &str) -> bool {
        match &self.utf8_validation {
            Utf8Validation::All => true,
            Utf8Validation::Disabled => false,
            Utf8Validation::Only(keys) => keys.contains(key),
            Utf8Validation::Except(keys) => !keys.contains(key),
        }
    }
}

/// Per-container decoding state inherited by nested containers.
#[derive(Clone, Copy)]
struct Scope {
    top_level: bool,
    validate_utf8: bool,
    raw: bool,
}

/// A BSON decoder over a byte slice.
pub struct Decoder<'a> {
    data: &'a [u8],
    config: DecoderConfig,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, DecoderConfig::default())
    }

    /// Create a new decoder with custom configuration.
    #[must_use]
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            data,
            config,
            depth: 0,
        }
    }

    /// Get the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the top-level document. A DBRef-shaped top level stays a plain document.
    pub fn decode_document(&mut self) -> Result<Document> {
        let mut reader = self.begin()?;
        let scope = self.top_scope();
        let entries = self.read_container(&mut reader, false, scope)?;
        Ok(entries.into_iter().collect())
    }

    /// Decode the top-level document, promoting it to a DBRef when it has that shape.
    pub fn decode_value(&mut self) -> Result<Bson> {
        let mut reader = self.begin()?;
        let scope = self.top_scope();
        self.read_document(&mut reader, scope)
    }

    fn top_scope(&self) -> Scope {
        Scope {
            top_level: true,
            validate_utf8: self.config.key_validation(),
            raw: self.config.raw,
        }
    }

    /// Validate the outer size, bounds and terminator, returning a reader over exactly the document.
    fn begin(&self) -> Result<Reader<'a>> {
        self.config.validate()?;
        let index = self.config.index;
        let available = self.data.len().saturating_sub(index);
        if available < 4 {
            return Err(Error::InvalidDocumentSize {
                offset: index,
                size: available as i64,
            });
        }

        let size = Reader::new(self.data, index).peek_i32()?;
        if size < limits::MIN_DOCUMENT_SIZE as i32 {
            return Err(Error::InvalidDocumentSize {
                offset: index,
                size: i64::from(size),
            });
        }
        let size = size as usize;
        if self.config.allow_object_smaller_than_buffer_size {
            if available < size {
                return Err(Error::BufferTooSmall { size, available });
            }
        } else if available != size {
            return Err(Error::BufferSizeMismatch { size, available });
        }

        let end = index + size;
        if self.data[end - 1] != 0 {
            return Err(Error::MissingTerminator { offset: end - 1 });
        }
        Ok(Reader::new(&self.data[..end], index))
    }

    /// Read a document and apply DBRef promotion.
    fn read_document(&mut self, r: &mut Reader<'a>, scope: Scope) -> Result<Bson> {
        let entries = self.read_container(r, false, scope)?;
        Ok(promote_dbref(entries))
    }

    fn read_array(&mut self, r: &mut Reader<'a>, scope: Scope) -> Result<Array> {
        let entries = self.read_container(r, true, scope)?;
        Ok(entries.into_iter().map(|(_, v)| v).collect())
    }

    /// Read one length-prefixed container. Array entries carry empty names.
    fn read_container(
        &mut self,
        r: &mut Reader<'a>,
        is_array: bool,
        scope: Scope,
    ) -> Result<Vec<(String, Bson)>> {
        let start = r.position();
        if self.depth >= self.config.max_depth {
            return Err(Error::MaxDepthExceeded { offset: start });
        }
        self.depth += 1;

        let size = r.read_i32()? as usize;
        let mut entries = Vec::new();
        loop {
            let tag_offset = r.position();
            let tag = r.read_u8()?;
            if tag == 0 {
                break;
            }
            let name_offset = r.position();
            let name_bytes = r.read_cstring_bytes()?;
            let name = if is_array {
                String::new()
            } else {
                decode_text(name_bytes, scope.validate_utf8, name_offset)?
            };

            let child = if scope.top_level {
                Scope {
                    top_level: false,
                    validate_utf8: self.config.value_validation(&name),
                    raw: scope.raw,
                }
            } else {
                scope
            };

            let Some(value) = self.read_element(r, tag, &name, child)? else {
                return Err(Error::UnknownElementType {
                    tag,
                    field: if is_array {
                        entries.len().to_string()
                    } else {
                        name
                    },
                    offset: tag_offset,
                });
            };
            entries.push((name, value));
        }

        if r.position() - start != size {
            return Err(Error::CorruptDocument {
                offset: start,
                is_array,
            });
        }
        self.depth -= 1;
        Ok(entries)
    }

    /// Read one element value. Unknown tags yield `None` so the caller can name the field.
    fn read_element(
        &mut self,
        r: &mut Reader<'a>,
        tag: u8,
        name: &str,
        scope: Scope,
    ) -> Result<Option<Bson>> {
        let value = match tag {
            element_type::STRING => Bson::String(read_string(r, scope.validate_utf8)?),
            element_type::OBJECT_ID => Bson::ObjectId(ObjectId::from_bytes(r.read_array()?)),
            element_type::INT32 => {
                let n = r.read_i32()?;
                if self.config.promote_values {
                    Bson::Number(f64::from(n))
                } else {
                    Bson::Int32(n)
                }
            }
            element_type::DOUBLE => {
                let f = r.read_f64()?;
                if self.config.promote_values {
                    Bson::Number(f)
                } else {
                    Bson::Double(f)
                }
            }
            element_type::DATETIME => Bson::DateTime(DateTime::from_millis(r.read_i64()?)),
            element_type::BOOLEAN => {
                let offset = r.position();
                match r.read_u8()? {
                    0 => Bson::Boolean(false),
                    1 => Bson::Boolean(true),
                    byte => return Err(Error::InvalidBoolean { offset, byte }),
                }
            }
            element_type::DOCUMENT => {
                let size = check_embedded(r)?;
                if scope.raw {
                    Bson::RawDocument(r.read_bytes(size)?.to_vec())
                } else {
                    self.read_document(r, scope)?
                }
            }
            element_type::ARRAY => {
                check_embedded(r)?;
                let scope = Scope {
                    raw: scope.raw || self.config.fields_as_raw.contains(name),
                    ..scope
                };
                Bson::Array(self.read_array(r, scope)?)
            }
            element_type::UNDEFINED => Bson::Undefined,
            element_type::NULL => Bson::Null,
            element_type::INT64 => {
                let n = r.read_i64()?;
                if self.config.use_bigint64 {
                    Bson::BigInt(i128::from(n))
                } else if self.config.promote_values
                    && self.config.promote_longs
                    && n.unsigned_abs() <= limits::MAX_SAFE_INTEGER.unsigned_abs()
                {
                    Bson::Number(n as f64)
                } else {
                    Bson::Int64(Long::from_i64(n))
                }
            }
            element_type::DECIMAL128 => Bson::Decimal128(Decimal128::from_bytes(r.read_array()?)),
            element_type::BINARY => self.read_binary(r)?,
            element_type::REGEX => {
                let pattern = read_cstring(r, scope.validate_utf8)?;
                let options = read_cstring(r, scope.validate_utf8)?;
                if self.config.bson_regexp {
                    Bson::RegularExpression(Regex::from_parts(pattern, &options))
                } else {
                    match Pattern::new(&pattern, &options) {
                        Ok(compiled) => Bson::Pattern(compiled),
                        // Look-around, backreferences and the like stay in text form.
                        Err(_) => Bson::RegularExpression(Regex::from_parts(pattern, &options)),
                    }
                }
            }
            element_type::SYMBOL => {
                let symbol = read_string(r, scope.validate_utf8)?;
                if self.config.promote_values {
                    Bson::String(symbol)
                } else {
                    Bson::Symbol(symbol)
                }
            }
            element_type::TIMESTAMP => {
                let increment = r.read_u32()?;
                let time = r.read_u32()?;
                Bson::Timestamp(Timestamp::new(time, increment))
            }
            element_type::MIN_KEY => Bson::MinKey,
            element_type::MAX_KEY => Bson::MaxKey,
            element_type::JAVASCRIPT_CODE => {
                Bson::JavaScriptCode(Code::new(read_string(r, scope.validate_utf8)?))
            }
            element_type::JAVASCRIPT_CODE_WITH_SCOPE => self.read_code_with_scope(r, scope)?,
            element_type::DB_POINTER => {
                let namespace = read_string(r, scope.validate_utf8)?;
                let id = ObjectId::from_bytes(r.read_array()?);
                Bson::DbPointer(DbPointer { namespace, id })
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn read_binary(&mut self, r: &mut Reader<'a>) -> Result<Bson> {
        let offset = r.position();
        let length = r.read_i32()?;
        let subtype = r.read_u8()?;
        if length < 0 || length as usize > r.remaining() {
            return Err(Error::InvalidBinaryLength {
                offset,
                length: i64::from(length),
            });
        }

        let mut length = length as usize;
        if subtype == binary_subtype::BINARY_OLD {
            let inner_offset = r.position();
            let inner = r.read_i32()?;
            if inner < 0 {
                return Err(Error::InvalidBinaryLength {
                    offset: inner_offset,
                    length: i64::from(inner),
                });
            }
            let expected = length as i64 - 4;
            match i64::from(inner).cmp(&expected) {
                std::cmp::Ordering::Greater => return Err(Error::OldBinaryTooLong { offset }),
                std::cmp::Ordering::Less => return Err(Error::OldBinaryTooShort { offset }),
                std::cmp::Ordering::Equal => {}
            }
            length = inner as usize;
        }

        let bytes = r.read_bytes(length)?.to_vec();
        if subtype == binary_subtype::GENERIC && self.config.promote_buffers && self.config.promote_values {
            return Ok(Bson::Bytes(bytes));
        }
        Ok(Bson::Binary(Binary::new(subtype, bytes)))
    }

    fn read_code_with_scope(&mut self, r: &mut Reader<'a>, scope: Scope) -> Result<Bson> {
        let offset = r.position();
        let total = r.read_i32()?;
        // length, string length, empty string and empty document
        if total < 4 + 4 + 1 + 5 {
            return Err(Error::CodeWithScopeTooSmall {
                offset,
                size: i64::from(total),
            });
        }

        let string_start = r.position();
        let code = read_string(r, scope.validate_utf8)?;
        let string_size = r.position() - string_start;

        let scope_start = r.position();
        let scope_size = check_embedded(r)?;
        let scope_doc: Document = self
            .read_container(r, false, Scope { raw: false, ..scope })?
            .into_iter()
            .collect();
        debug_assert_eq!(r.position() - scope_start, scope_size);

        let consumed = 4 + string_size + scope_size;
        match (total as usize).cmp(&consumed) {
            std::cmp::Ordering::Less => Err(Error::CodeWithScopeTooShort { offset }),
            std::cmp::Ordering::Greater => Err(Error::CodeWithScopeTooLong { offset }),
            std::cmp::Ordering::Equal => Ok(Bson::JavaScriptCode(Code::with_scope(code, scope_doc))),
        }
    }
}

/// Check an embedded document's size prefix and terminator, returning the size.
fn check_embedded(r: &Reader<'_>) -> Result<usize> {
    let offset = r.position();
    let size = r.peek_i32()?;
    if size < limits::MIN_DOCUMENT_SIZE as i32 || size as usize > r.remaining() {
        return Err(Error::InvalidEmbeddedLength {
            offset,
            size: i64::from(size),
        });
    }
    let size = size as usize;
    if r.data()[offset + size - 1] != 0 {
        return Err(Error::MissingTerminator {
            offset: offset + size - 1,
        });
    }
    Ok(size)
}

fn decode_text(bytes: &[u8], validate: bool, offset: usize) -> Result<String> {
    if validate {
        utf8::decode_strict(bytes).map_err(|at| Error::InvalidUtf8 { offset: offset + at })
    } else {
        Ok(utf8::decode_lossy(bytes))
    }
}

/// Read an int32-length-prefixed, NUL-terminated string.
fn read_string(r: &mut Reader<'_>, validate: bool) -> Result<String> {
    let offset = r.position();
    let length = r.read_i32()?;
    if length <= 0 || length as usize > r.remaining() {
        return Err(Error::InvalidStringLength {
            offset,
            length: i64::from(length),
        });
    }
    let bytes = r.read_bytes(length as usize)?;
    let (text, terminator) = bytes.split_at(bytes.len() - 1);
    if terminator[0] != 0 {
        return Err(Error::InvalidStringLength {
            offset,
            length: i64::from(length),
        });
    }
    decode_text(text, validate, offset + 4)
}

fn read_cstring(r: &mut Reader<'_>, validate: bool) -> Result<String> {
    let offset = r.position();
    let bytes = r.read_cstring_bytes()?;
    decode_text(bytes, validate, offset)
}

/// Turn `{$ref, $id, $db?, ...}` into a DBRef; anything else becomes a plain document.
///
/// Every `$`-prefixed key must be one of `$ref`, `$id`, `$db`; `$ref` must be a
/// string, `$id` must be present and non-null, and `$db` must be a string when present.
fn promote_dbref(entries: Vec<(String, Bson)>) -> Bson {
    let mut saw_dollar = false;
    for (key, _) in &entries {
        if key.starts_with('$') {
            if !matches!(key.as_str(), "$ref" | "$id" | "$db") {
                return Bson::Document(entries.into_iter().collect());
            }
            saw_dollar = true;
        }
    }
    let doc: Document = entries.into_iter().collect();
    if !saw_dollar {
        return Bson::Document(doc);
    }

    let shape_ok = matches!(doc.get("$ref"), Some(Bson::String(_)))
        && matches!(doc.get("$id"), Some(id) if !id.is_null() && !id.is_undefined())
        && matches!(doc.get("$db"), None | Some(Bson::String(_)));
    if !shape_ok {
        return Bson::Document(doc);
    }

    let mut fields = doc;
    let collection = match fields.remove("$ref") {
        Some(Bson::String(s)) => s,
        _ => String::new(),
    };
    let id = fields.remove("$id").unwrap_or(Bson::Null);
    let db = match fields.remove("$db") {
        Some(Bson::String(s)) => Some(s),
        _ => None,
    };
    Bson::DbRef(DbRef {
        collection,
        id: Box::new(id),
        db,
        fields,
    })
}
