// ABOUTME: Defines BSON element type tags, binary subtypes and codec limits.
// ABOUTME: Tag and subtype values map directly to the BSON wire format bytes.

/// Element type tags. These match the BSON wire format exactly.
pub mod element_type {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    /// Deprecated.
    pub const UNDEFINED: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const DATETIME: u8 = 0x09;
    pub const NULL: u8 = 0x0a;
    pub const REGEX: u8 = 0x0b;
    /// Deprecated.
    pub const DB_POINTER: u8 = 0x0c;
    pub const JAVASCRIPT_CODE: u8 = 0x0d;
    /// Deprecated.
    pub const SYMBOL: u8 = 0x0e;
    /// Deprecated.
    pub const JAVASCRIPT_CODE_WITH_SCOPE: u8 = 0x0f;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
    pub const DECIMAL128: u8 = 0x13;
    pub const MIN_KEY: u8 = 0xff;
    pub const MAX_KEY: u8 = 0x7f;

    /// Human-readable name of a tag, used in diagnostics.
    #[must_use]
    pub const fn name(tag: u8) -> &'static str {
        match tag {
            DOUBLE => "double",
            STRING => "string",
            DOCUMENT => "document",
            ARRAY => "array",
            BINARY => "binary",
            UNDEFINED => "undefined",
            OBJECT_ID => "objectId",
            BOOLEAN => "bool",
            DATETIME => "date",
            NULL => "null",
            REGEX => "regex",
            DB_POINTER => "dbPointer",
            JAVASCRIPT_CODE => "javascript",
            SYMBOL => "symbol",
            JAVASCRIPT_CODE_WITH_SCOPE => "javascriptWithScope",
            INT32 => "int",
            TIMESTAMP => "timestamp",
            INT64 => "long",
            DECIMAL128 => "decimal",
            MIN_KEY => "minKey",
            MAX_KEY => "maxKey",
            _ => "unknown",
        }
    }
}

/// Binary subtypes carried in the first byte after a binary length.
pub mod binary_subtype {
    pub const GENERIC: u8 = 0x00;
    pub const FUNCTION: u8 = 0x01;
    /// Legacy binary with a redundant inner length prefix.
    pub const BINARY_OLD: u8 = 0x02;
    pub const UUID_OLD: u8 = 0x03;
    pub const UUID: u8 = 0x04;
    pub const MD5: u8 = 0x05;
    pub const ENCRYPTED: u8 = 0x06;
    pub const COLUMN: u8 = 0x07;
    pub const SENSITIVE: u8 = 0x08;
    pub const VECTOR: u8 = 0x09;
    pub const USER_DEFINED: u8 = 0x80;
}

/// Size limits and numeric boundaries used by the codec.
pub mod limits {
    /// Smallest legal document: a 4-byte length plus the terminator.
    pub const MIN_DOCUMENT_SIZE: usize = 5;

    /// Largest size a document length prefix can declare.
    pub const MAX_DOCUMENT_SIZE: usize = i32::MAX as usize;

    /// Maximum nesting depth accepted by the decoder.
    pub const MAX_DEPTH: usize = 512;

    /// Largest integer magnitude a double represents exactly (2^53).
    pub const MAX_SAFE_INTEGER: i64 = 1 << 53;

    /// Millisecond bound of the representable calendar range (±100,000,000 days).
    pub const MAX_DATETIME_MILLIS: i64 = 8_640_000_000_000_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names() {
        assert_eq!(element_type::name(element_type::DECIMAL128), "decimal");
        assert_eq!(element_type::name(element_type::MIN_KEY), "minKey");
        assert_eq!(element_type::name(0x42), "unknown");
    }

    #[test]
    fn test_limits() {
        assert_eq!(limits::MAX_SAFE_INTEGER, 9_007_199_254_740_992);
        assert_eq!(limits::MAX_DOCUMENT_SIZE, 2_147_483_647);
    }
}
