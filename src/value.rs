// ABOUTME: The Bson value union, the insertion-ordered Document, and the small wrapper types they carry.
// ABOUTME: Includes the shared reference node used for aliasing graphs and the doc!/bson! macros.

use crate::binary::Binary;
use crate::decimal128::Decimal128;
use crate::error::{Error, Result};
use crate::long::Long;
use crate::oid::ObjectId;
use crate::types::{element_type, limits};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// An ordered list of values, encoded as a document keyed "0", "1", ...
pub type Array = Vec<Bson>;

/// Any BSON value.
///
/// Besides one variant per wire tag, this carries the bare forms the
/// decoder promotes to (`Number`, `Bytes`, `Pattern`, `BigInt`) and the
/// forms a caller may hand to the encoder (`RawDocument`, `Shared`).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Bson {
    /// An explicit 64-bit float; always encoded as a double.
    Double(f64),
    /// A bare number; encoded as int32 when integral and in range, otherwise as a double.
    Number(f64),
    String(String),
    Document(Document),
    Array(Array),
    Binary(Binary),
    /// Bare bytes; encoded as generic (subtype 0) binary.
    Bytes(Vec<u8>),
    /// Deprecated. Encoded as null, or omitted from documents when asked.
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    #[default]
    Null,
    /// The structured regular expression form.
    RegularExpression(Regex),
    /// A compiled native regular expression.
    Pattern(Pattern),
    /// Deprecated.
    DbPointer(DbPointer),
    DbRef(DbRef),
    JavaScriptCode(Code),
    /// Deprecated.
    Symbol(String),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(Long),
    /// A bare wide integer; must fit in 64 bits to encode.
    BigInt(i128),
    Decimal128(Decimal128),
    MinKey,
    MaxKey,
    /// An undecoded embedded document, including its length prefix and terminator.
    RawDocument(Vec<u8>),
    /// A reference node that may be aliased within a graph.
    Shared(Shared),
}

impl Bson {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Bson::Null)
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Bson::Undefined)
    }

    /// Returns true if this value is any numeric kind.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Bson::Double(_)
                | Bson::Number(_)
                | Bson::Int32(_)
                | Bson::Int64(_)
                | Bson::BigInt(_)
                | Bson::Decimal128(_)
        )
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bson::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String or symbol contents.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) | Bson::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Bson::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Bson::Int32(n) => Some(*n),
            _ => self.as_i64().and_then(|n| i32::try_from(n).ok()),
        }
    }

    /// Integral value of any integer kind, or of an integral bare number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => i64::try_from(n.to_i128()).ok(),
            Bson::BigInt(n) => i64::try_from(*n).ok(),
            Bson::Number(f) if f.fract() == 0.0 && f.abs() <= limits::MAX_SAFE_INTEGER as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Value of any binary-float or integer kind as a double.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bson::Double(f) | Bson::Number(f) => Some(*f),
            Bson::Int32(n) => Some(f64::from(*n)),
            Bson::Int64(n) => Some(n.to_f64()),
            Bson::BigInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Bson::ObjectId(oid) => Some(*oid),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_decimal128(&self) -> Option<Decimal128> {
        match self {
            Bson::Decimal128(d) => Some(*d),
            _ => None,
        }
    }

    /// Look up a key when this is a document.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&Bson> {
        self.as_document().and_then(|d| d.get(key))
    }

    /// The tag this value is written with. `Undefined` reports null, the tag it encodes as.
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            Bson::Double(_) => element_type::DOUBLE,
            Bson::Number(f) => {
                if number_fits_int32(*f) {
                    element_type::INT32
                } else {
                    element_type::DOUBLE
                }
            }
            Bson::String(_) => element_type::STRING,
            Bson::Document(_) | Bson::DbRef(_) | Bson::RawDocument(_) => element_type::DOCUMENT,
            Bson::Array(_) => element_type::ARRAY,
            Bson::Binary(_) | Bson::Bytes(_) => element_type::BINARY,
            Bson::Undefined | Bson::Null => element_type::NULL,
            Bson::ObjectId(_) => element_type::OBJECT_ID,
            Bson::Boolean(_) => element_type::BOOLEAN,
            Bson::DateTime(_) => element_type::DATETIME,
            Bson::RegularExpression(_) | Bson::Pattern(_) => element_type::REGEX,
            Bson::DbPointer(_) => element_type::DB_POINTER,
            Bson::JavaScriptCode(code) => {
                if code.scope.is_some() {
                    element_type::JAVASCRIPT_CODE_WITH_SCOPE
                } else {
                    element_type::JAVASCRIPT_CODE
                }
            }
            Bson::Symbol(_) => element_type::SYMBOL,
            Bson::Int32(_) => element_type::INT32,
            Bson::Timestamp(_) => element_type::TIMESTAMP,
            Bson::Int64(_) | Bson::BigInt(_) => element_type::INT64,
            Bson::Decimal128(_) => element_type::DECIMAL128,
            Bson::MinKey => element_type::MIN_KEY,
            Bson::MaxKey => element_type::MAX_KEY,
            Bson::Shared(shared) => shared.read().element_type(),
        }
    }
}

/// True when a bare number is written as int32: integral, in range, and not negative zero.
#[allow(clippy::float_cmp)]
pub(crate) fn number_fits_int32(value: f64) -> bool {
    value.fract() == 0.0
        && value >= f64::from(i32::MIN)
        && value <= f64::from(i32::MAX)
        && !(value == 0.0 && value.is_sign_negative())
}

/// An insertion-ordered map of string keys to values.
///
/// Re-inserting an existing key replaces its value in place. Equality is order-sensitive.
#[derive(Debug, Clone, Default)]
pub struct Document {
    inner: IndexMap<String, Bson>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.inner.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.inner.get_mut(key)
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.inner.shift_remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Bson> {
        self.inner.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Bson> {
        self.inner.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, Bson> {
        self.inner.values()
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Bson::as_str)
    }

    #[must_use]
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Bson::as_i32)
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Bson::as_i64)
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Bson::as_f64)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Bson::as_bool)
    }

    #[must_use]
    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Bson::as_document)
    }

    #[must_use]
    pub fn get_array(&self, key: &str) -> Option<&Array> {
        self.get(key).and_then(Bson::as_array)
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Bson);
    type IntoIter = indexmap::map::Iter<'a, String, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, Bson);
    type IntoIter = indexmap::map::IntoIter<String, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl<K: Into<String>, V: Into<Bson>> Extend<(K, V)> for Document {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Increment and seconds pair, ordered as one unsigned 64-bit integer with seconds high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

impl Timestamp {
    #[must_use]
    pub const fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_u64(value: u64) -> Self {
        Self::new((value >> 32) as u32, value as u32)
    }

    #[must_use]
    pub const fn to_u64(&self) -> u64 {
        ((self.time as u64) << 32) | self.increment as u64
    }
}

/// Milliseconds since the Unix epoch, or the invalid sentinel for out-of-range instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    millis: Option<i64>,
}

impl DateTime {
    /// The invalid sentinel. Encodes as zero.
    pub const INVALID: DateTime = DateTime { millis: None };

    /// Millis outside ±8.64e15 become the invalid sentinel.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        if millis >= -limits::MAX_DATETIME_MILLIS && millis <= limits::MAX_DATETIME_MILLIS {
            Self {
                millis: Some(millis),
            }
        } else {
            Self::INVALID
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self::from_millis(millis)
    }

    #[must_use]
    pub const fn timestamp_millis(&self) -> Option<i64> {
        self.millis
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.millis.is_some()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.millis {
            Some(ms) => write!(f, "DateTime({ms})"),
            None => f.write_str("Invalid Date"),
        }
    }
}

const REGEX_OPTIONS: &[char] = &['i', 'l', 'm', 's', 'u', 'x'];

pub(crate) fn sort_options(options: &str) -> String {
    let mut chars: Vec<char> = options.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

/// A regular expression in its wire form: pattern text and alphabetized option flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    /// Build a regex, rejecting NUL bytes and option flags outside `ilmsux`.
    pub fn new(pattern: impl Into<String>, options: impl AsRef<str>) -> Result<Self> {
        let pattern = pattern.into();
        let options = options.as_ref();
        if pattern.contains('\0') {
            return Err(Error::NullByte {
                context: "regex pattern",
                value: pattern,
            });
        }
        if options.contains('\0') {
            return Err(Error::NullByte {
                context: "regex options",
                value: options.to_owned(),
            });
        }
        if let Some(option) = options.chars().find(|c| !REGEX_OPTIONS.contains(c)) {
            return Err(Error::InvalidRegexOption { option });
        }
        Ok(Self {
            pattern,
            options: sort_options(options),
        })
    }

    /// Build without validation; options are still alphabetized.
    #[must_use]
    pub fn from_parts(pattern: impl Into<String>, options: &str) -> Self {
        Self {
            pattern: pattern.into(),
            options: sort_options(options),
        }
    }

    /// Compile into a native pattern.
    pub fn compile(&self) -> Result<Pattern> {
        Pattern::new(&self.pattern, &self.options)
    }
}

/// A compiled native regular expression that remembers the source and flags it came from.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    regex: regex::Regex,
}

impl Pattern {
    /// Compile `source` honoring `i`, `m`, `s`, `x` and `u`. `l` has no native counterpart and is kept only as text.
    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let mut builder = regex::RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'u' => builder.unicode(true),
                _ => &mut builder,
            };
        }
        let regex = builder.build().map_err(|e| Error::InvalidPattern {
            pattern: source.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_owned(),
            flags: sort_options(flags),
            regex,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    #[must_use]
    pub fn regex(&self) -> &regex::Regex {
        &self.regex
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// JavaScript source, optionally with a scope document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub code: String,
    pub scope: Option<Document>,
}

impl Code {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            scope: None,
        }
    }

    #[must_use]
    pub fn with_scope(code: impl Into<String>, scope: Document) -> Self {
        Self {
            code: code.into(),
            scope: Some(scope),
        }
    }
}

/// A database reference: `{$ref, $id, $db?}` plus any extra fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRef {
    pub collection: String,
    pub id: Box<Bson>,
    pub db: Option<String>,
    pub fields: Document,
}

impl DbRef {
    #[must_use]
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            collection: collection.into(),
            id: Box::new(id.into()),
            db: None,
            fields: Document::new(),
        }
    }

    #[must_use]
    pub fn with_db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    /// The document shape this reference encodes as.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::with_capacity(self.fields.len() + 3);
        doc.insert("$ref", self.collection.as_str());
        doc.insert("$id", (*self.id).clone());
        if let Some(db) = &self.db {
            doc.insert("$db", db.as_str());
        }
        for (k, v) in &self.fields {
            doc.insert(k.as_str(), v.clone());
        }
        doc
    }
}

/// Deprecated namespace plus ObjectId reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbPointer {
    pub namespace: String,
    pub id: ObjectId,
}

/// A value node that can be referenced from several places in a graph, including from itself.
///
/// Equality is identity. The encoder detects cycles through these nodes.
#[derive(Clone)]
pub struct Shared(Arc<RwLock<Bson>>);

impl Shared {
    #[must_use]
    pub fn new(value: impl Into<Bson>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Read the current value. A poisoned lock still yields its data.
    pub fn read(&self) -> RwLockReadGuard<'_, Bson> {
        self.0.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Bson> {
        self.0.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the value.
    pub fn set(&self, value: impl Into<Bson>) {
        *self.write() = value.into();
    }

    /// Identity of the node, stable for its lifetime.
    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

thread_local! {
    static OPEN_SHARED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a shared node as open on this thread's serde walk until dropped.
pub(crate) struct OpenShared(usize);

impl OpenShared {
    /// Returns `None` when the node is already open, i.e. the graph loops back into it.
    pub(crate) fn enter(shared: &Shared) -> Option<Self> {
        let id = shared.id();
        OPEN_SHARED.with(|path| {
            let mut path = path.borrow_mut();
            if path.contains(&id) {
                None
            } else {
                path.push(id);
                Some(Self(id))
            }
        })
    }
}

impl Drop for OpenShared {
    fn drop(&mut self) {
        OPEN_SHARED.with(|path| {
            let mut path = path.borrow_mut();
            if let Some(pos) = path.iter().rposition(|&id| id == self.0) {
                path.remove(pos);
            }
        });
    }
}

impl PartialEq for Shared {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared(0x{:x})", self.id())
    }
}

impl From<bool> for Bson {
    fn from(b: bool) -> Self {
        Bson::Boolean(b)
    }
}

impl From<i32> for Bson {
    fn from(n: i32) -> Self {
        Bson::Int32(n)
    }
}

impl From<i64> for Bson {
    fn from(n: i64) -> Self {
        Bson::Int64(Long::from_i64(n))
    }
}

impl From<u32> for Bson {
    fn from(n: u32) -> Self {
        Bson::Int64(Long::from_i64(i64::from(n)))
    }
}

impl From<i128> for Bson {
    fn from(n: i128) -> Self {
        Bson::BigInt(n)
    }
}

impl From<f32> for Bson {
    fn from(f: f32) -> Self {
        Bson::Double(f64::from(f))
    }
}

impl From<f64> for Bson {
    fn from(f: f64) -> Self {
        Bson::Double(f)
    }
}

impl From<&str> for Bson {
    fn from(s: &str) -> Self {
        Bson::String(s.to_owned())
    }
}

impl From<String> for Bson {
    fn from(s: String) -> Self {
        Bson::String(s)
    }
}

impl From<&String> for Bson {
    fn from(s: &String) -> Self {
        Bson::String(s.clone())
    }
}

impl From<Document> for Bson {
    fn from(d: Document) -> Self {
        Bson::Document(d)
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Bson {
    fn from(v: Vec<T>) -> Self {
        Bson::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Bson>> From<Option<T>> for Bson {
    fn from(v: Option<T>) -> Self {
        v.map_or(Bson::Null, Into::into)
    }
}

impl From<Binary> for Bson {
    fn from(b: Binary) -> Self {
        Bson::Binary(b)
    }
}

impl From<ObjectId> for Bson {
    fn from(oid: ObjectId) -> Self {
        Bson::ObjectId(oid)
    }
}

impl From<DateTime> for Bson {
    fn from(dt: DateTime) -> Self {
        Bson::DateTime(dt)
    }
}

impl From<Regex> for Bson {
    fn from(r: Regex) -> Self {
        Bson::RegularExpression(r)
    }
}

impl From<Pattern> for Bson {
    fn from(p: Pattern) -> Self {
        Bson::Pattern(p)
    }
}

impl From<Code> for Bson {
    fn from(c: Code) -> Self {
        Bson::JavaScriptCode(c)
    }
}

impl From<DbRef> for Bson {
    fn from(r: DbRef) -> Self {
        Bson::DbRef(r)
    }
}

impl From<DbPointer> for Bson {
    fn from(p: DbPointer) -> Self {
        Bson::DbPointer(p)
    }
}

impl From<Timestamp> for Bson {
    fn from(ts: Timestamp) -> Self {
        Bson::Timestamp(ts)
    }
}

impl From<Long> for Bson {
    fn from(l: Long) -> Self {
        Bson::Int64(l)
    }
}

impl From<Decimal128> for Bson {
    fn from(d: Decimal128) -> Self {
        Bson::Decimal128(d)
    }
}

impl From<Shared> for Bson {
    fn from(s: Shared) -> Self {
        Bson::Shared(s)
    }
}

impl<T: Into<Bson>> FromIterator<T> for Bson {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Bson::Array(iter.into_iter().map(Into::into).collect())
    }
}

/// Build a [`Bson`] value.
///
/// Object and array literals nest; anything else goes through `Bson::from`.
/// Negative literals need parentheses: `bson!((-1))`.
///
/// ```rust
/// use bson_wire::bson;
///
/// let value = bson!({
///     "name": "test",
///     "values": [1, 2, 3],
///     "active": true,
///     "missing": null
/// });
/// assert_eq!(value.get_key("name").and_then(|v| v.as_str()), Some("test"));
/// ```
#[macro_export]
macro_rules! bson {
    (null) => {
        $crate::Bson::Null
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Bson::Array(vec![ $( $crate::bson!($elem) ),* ])
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::Bson::Document($crate::doc! { $($key : $value),* })
    };

    ($other:expr) => {
        $crate::Bson::from($other)
    };
}

/// Build a [`Document`].
///
/// ```rust
/// use bson_wire::doc;
///
/// let doc = doc! { "a": 1, "nested": { "b": [true, null] } };
/// assert_eq!(doc.len(), 2);
/// assert_eq!(doc.keys().next().map(String::as_str), Some("a"));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };

    ( $($key:tt : $value:tt),* $(,)? ) => {
        {
            let mut doc = $crate::Document::new();
            $(
                doc.insert($key, $crate::bson!($value));
            )*
            doc
        }
    };
}
