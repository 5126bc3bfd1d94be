// ABOUTME: Error types for BSON encoding and decoding.
// ABOUTME: Each variant carries its diagnosing context and maps to one ErrorKind category.

use std::fmt;
use thiserror::Error;

/// The result type for BSON operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`], for callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input bytes.
    Format,
    /// A value graph or option set that breaks an encoding rule.
    Constraint,
    /// A numeric or textual value outside what its codec can represent.
    Range,
    /// A value kind with no BSON counterpart.
    UnsupportedType,
    /// Raised from a serde implementation.
    Custom,
}

/// Errors that can occur during BSON encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Input ended before a fixed-width or length-prefixed read completed.
    #[error("unexpected end of input at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    /// A document length prefix below the 5-byte minimum or negative.
    #[error("bson size must be >= 5, is {size} (offset {offset})")]
    InvalidDocumentSize { offset: usize, size: i64 },

    /// The buffer is shorter than the declared document size.
    #[error("buffer length {available} must be >= bson size {size}")]
    BufferTooSmall { size: usize, available: usize },

    /// The buffer is longer than the declared document size.
    #[error("buffer length {available} must equal bson size {size}")]
    BufferSizeMismatch { size: usize, available: usize },

    /// The byte at the declared end of a document is not 0x00.
    #[error("document not terminated with 0x00 at offset {offset}")]
    MissingTerminator { offset: usize },

    /// A C-string with no NUL terminator inside the document.
    #[error("unterminated C-string at offset {offset}")]
    InvalidCString { offset: usize },

    /// A string length prefix that is non-positive, runs past the buffer, or lacks its NUL.
    #[error("bad string length {length} at offset {offset}")]
    InvalidStringLength { offset: usize, length: i64 },

    /// A string payload that is not well-formed UTF-8.
    #[error("invalid UTF-8 string in BSON document at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A boolean byte other than 0x00 or 0x01.
    #[error("illegal boolean type value 0x{byte:02x} at offset {offset}")]
    InvalidBoolean { offset: usize, byte: u8 },

    /// An embedded document or array whose size prefix is invalid for the space left.
    #[error("bad embedded document length {size} at offset {offset}")]
    InvalidEmbeddedLength { offset: usize, size: i64 },

    /// A document whose terminator was not where its size prefix said.
    #[error("corrupt {} bson at offset {offset}", document_label(.is_array))]
    CorruptDocument { offset: usize, is_array: bool },

    /// A binary length prefix that is negative or runs past the buffer.
    #[error("binary length {length} out of bounds at offset {offset}")]
    InvalidBinaryLength { offset: usize, length: i64 },

    /// Legacy binary (subtype 2) whose inner length exceeds the outer length minus 4.
    #[error("binary type with subtype 0x02 contains too long binary size at offset {offset}")]
    OldBinaryTooLong { offset: usize },

    /// Legacy binary (subtype 2) whose inner length is below the outer length minus 4.
    #[error("binary type with subtype 0x02 contains too short binary size at offset {offset}")]
    OldBinaryTooShort { offset: usize },

    /// Code-with-scope whose total length cannot hold its fixed parts.
    #[error("code_w_scope total size {size} is below the minimum length at offset {offset}")]
    CodeWithScopeTooSmall { offset: usize, size: i64 },

    /// Code-with-scope whose total length is smaller than its parts.
    #[error("code_w_scope total size is too short, truncating scope at offset {offset}")]
    CodeWithScopeTooShort { offset: usize },

    /// Code-with-scope whose total length is larger than its parts.
    #[error("code_w_scope total size is too long, clips outer document at offset {offset}")]
    CodeWithScopeTooLong { offset: usize },

    /// A tag byte the format does not define.
    #[error("detected unknown BSON type 0x{tag:02x} for fieldname \"{field}\" at offset {offset}")]
    UnknownElementType { tag: u8, field: String, offset: usize },

    /// Nesting deeper than the decoder accepts.
    #[error("maximum nesting depth exceeded at offset {offset}")]
    MaxDepthExceeded { offset: usize },

    /// A regex the native pattern engine cannot compile.
    #[error("cannot compile pattern /{pattern}/: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A NUL byte in a key, regex pattern or regex options.
    #[error("{context} cannot contain null bytes: {value:?}")]
    NullByte { context: &'static str, value: String },

    /// A key rejected by the `check_keys` rules.
    #[error("key {key:?} {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A document or array that contains itself.
    #[error("cyclic dependency detected at field {field:?}")]
    CircularReference { field: String },

    /// A bare wide integer that cannot be encoded without picking a representation.
    #[error("{value} does not fit in 64 bits; wrap it in Long, Double or Decimal128 explicitly")]
    NumericAmbiguity { value: String },

    /// A binary vector (subtype 9) that breaks a layout rule.
    #[error("invalid binary vector: {0}")]
    InvalidVector(String),

    /// A regex option flag outside `i`, `l`, `m`, `s`, `u`, `x`.
    #[error("invalid regular expression option {option:?}")]
    InvalidRegexOption { option: char },

    /// An option combination that cannot be honored.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A string that does not denote a representable Decimal128.
    #[error("{input:?} is not a valid Decimal128 string - {reason}")]
    InvalidDecimal128 { input: String, reason: &'static str },

    /// A string that does not denote a representable Long.
    #[error("{input:?} is not a valid Long string - {reason}")]
    InvalidLong { input: String, reason: &'static str },

    /// Text that is not 24 hex digits.
    #[error("{input:?} is not a valid ObjectId hex string")]
    InvalidObjectId { input: String },

    /// An encoded document whose size exceeds the 32-bit length prefix.
    #[error("document size {size} exceeds the maximum BSON size")]
    DocumentTooLarge { size: usize },

    /// A value kind that cannot be represented in this position.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Custom error message (for serde integration).
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Returns the category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Truncated { .. }
            | Error::InvalidDocumentSize { .. }
            | Error::BufferTooSmall { .. }
            | Error::BufferSizeMismatch { .. }
            | Error::MissingTerminator { .. }
            | Error::InvalidCString { .. }
            | Error::InvalidStringLength { .. }
            | Error::InvalidUtf8 { .. }
            | Error::InvalidBoolean { .. }
            | Error::InvalidEmbeddedLength { .. }
            | Error::CorruptDocument { .. }
            | Error::InvalidBinaryLength { .. }
            | Error::OldBinaryTooLong { .. }
            | Error::OldBinaryTooShort { .. }
            | Error::CodeWithScopeTooSmall { .. }
            | Error::CodeWithScopeTooShort { .. }
            | Error::CodeWithScopeTooLong { .. }
            | Error::UnknownElementType { .. }
            | Error::MaxDepthExceeded { .. }
            | Error::InvalidPattern { .. } => ErrorKind::Format,
            Error::NullByte { .. }
            | Error::InvalidKey { .. }
            | Error::CircularReference { .. }
            | Error::NumericAmbiguity { .. }
            | Error::InvalidVector(_)
            | Error::InvalidRegexOption { .. }
            | Error::InvalidOptions(_) => ErrorKind::Constraint,
            Error::InvalidDecimal128 { .. }
            | Error::InvalidLong { .. }
            | Error::InvalidObjectId { .. }
            | Error::DocumentTooLarge { .. } => ErrorKind::Range,
            Error::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Error::Custom(_) => ErrorKind::Custom,
        }
    }

    /// Returns a stable snake_case name for the variant, used for test matching.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Truncated { .. } => "truncated",
            Error::InvalidDocumentSize { .. } => "invalid_document_size",
            Error::BufferTooSmall { .. } => "buffer_too_small",
            Error::BufferSizeMismatch { .. } => "buffer_size_mismatch",
            Error::MissingTerminator { .. } => "missing_terminator",
            Error::InvalidCString { .. } => "invalid_cstring",
            Error::InvalidStringLength { .. } => "invalid_string_length",
            Error::InvalidUtf8 { .. } => "invalid_utf8",
            Error::InvalidBoolean { .. } => "invalid_boolean",
            Error::InvalidEmbeddedLength { .. } => "invalid_embedded_length",
            Error::CorruptDocument { .. } => "corrupt_document",
            Error::InvalidBinaryLength { .. } => "invalid_binary_length",
            Error::OldBinaryTooLong { .. } => "old_binary_too_long",
            Error::OldBinaryTooShort { .. } => "old_binary_too_short",
            Error::CodeWithScopeTooSmall { .. } => "code_with_scope_too_small",
            Error::CodeWithScopeTooShort { .. } => "code_with_scope_too_short",
            Error::CodeWithScopeTooLong { .. } => "code_with_scope_too_long",
            Error::UnknownElementType { .. } => "unknown_element_type",
            Error::MaxDepthExceeded { .. } => "max_depth_exceeded",
            Error::InvalidPattern { .. } => "invalid_pattern",
            Error::NullByte { .. } => "null_byte",
            Error::InvalidKey { .. } => "invalid_key",
            Error::CircularReference { .. } => "circular_reference",
            Error::NumericAmbiguity { .. } => "numeric_ambiguity",
            Error::InvalidVector(_) => "invalid_vector",
            Error::InvalidRegexOption { .. } => "invalid_regex_option",
            Error::InvalidOptions(_) => "invalid_options",
            Error::InvalidDecimal128 { .. } => "invalid_decimal128",
            Error::InvalidLong { .. } => "invalid_long",
            Error::InvalidObjectId { .. } => "invalid_object_id",
            Error::DocumentTooLarge { .. } => "document_too_large",
            Error::UnsupportedType(_) => "unsupported_type",
            Error::Custom(_) => "custom",
        }
    }
}

fn document_label(is_array: &bool) -> &'static str {
    if *is_array {
        "array"
    } else {
        "object"
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        crate::ser::take_pending_error().unwrap_or_else(|| Error::Custom(msg.to_string()))
    }
}
