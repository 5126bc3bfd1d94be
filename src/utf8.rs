// ABOUTME: Byte-level UTF-8 decoding with a strict mode that rejects and a lossy mode that replaces.
// ABOUTME: Accepts exactly the well-formed sequences of Unicode Table 3-7; simdutf8 fronts the fast path.

const REPLACEMENT: char = '\u{FFFD}';

/// Decode `bytes`, failing on the first ill-formed sequence.
///
/// The error carries the offset of the first byte of the offending sequence.
#[inline]
pub fn decode_strict(bytes: &[u8]) -> Result<String, usize> {
    if let Some(s) = fast_path(bytes) {
        return Ok(s.to_owned());
    }
    decode(bytes, false)
}

/// Decode `bytes`, substituting U+FFFD for each maximal ill-formed subpart.
#[must_use]
pub fn decode_lossy(bytes: &[u8]) -> String {
    if let Some(s) = fast_path(bytes) {
        return s.to_owned();
    }
    decode(bytes, true).unwrap_or_default()
}

/// Returns true when `bytes` is well-formed UTF-8.
#[must_use]
pub fn is_valid(bytes: &[u8]) -> bool {
    first_invalid(bytes).is_none()
}

/// Offset of the first ill-formed sequence, if any.
#[must_use]
pub fn first_invalid(bytes: &[u8]) -> Option<usize> {
    if fast_path(bytes).is_some() {
        return None;
    }
    let mut i = 0;
    while i < bytes.len() {
        match sequence_at(bytes, i) {
            Ok((_, len)) => i += len,
            Err(_) => return Some(i),
        }
    }
    None
}

#[cfg(feature = "simd-utf8")]
#[inline]
fn fast_path(bytes: &[u8]) -> Option<&str> {
    simdutf8::basic::from_utf8(bytes).ok()
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
fn fast_path(bytes: &[u8]) -> Option<&str> {
    if bytes.is_ascii() {
        std::str::from_utf8(bytes).ok()
    } else {
        None
    }
}

fn decode(bytes: &[u8], lossy: bool) -> Result<String, usize> {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match sequence_at(bytes, i) {
            Ok((c, len)) => {
                out.push(c);
                i += len;
            }
            Err(consumed) => {
                if !lossy {
                    return Err(i);
                }
                out.push(REPLACEMENT);
                i += consumed;
            }
        }
    }
    Ok(out)
}

/// Decode one scalar value starting at `i`.
///
/// On failure returns the length of the maximal ill-formed subpart (at least 1).
#[inline]
fn sequence_at(bytes: &[u8], i: usize) -> Result<(char, usize), usize> {
    let lead = bytes[i];
    if lead < 0x80 {
        return Ok((char::from(lead), 1));
    }

    // (sequence length, allowed range of the second byte)
    let (len, lo, hi) = match lead {
        0xc2..=0xdf => (2, 0x80, 0xbf),
        0xe0 => (3, 0xa0, 0xbf),
        0xe1..=0xec | 0xee..=0xef => (3, 0x80, 0xbf),
        0xed => (3, 0x80, 0x9f),
        0xf0 => (4, 0x90, 0xbf),
        0xf1..=0xf3 => (4, 0x80, 0xbf),
        0xf4 => (4, 0x80, 0x8f),
        _ => return Err(1),
    };

    let mut code_point = u32::from(lead) & (0x7f >> len);
    for n in 1..len {
        let Some(&byte) = bytes.get(i + n) else {
            return Err(n);
        };
        let (min, max) = if n == 1 { (lo, hi) } else { (0x80, 0xbf) };
        if byte < min || byte > max {
            return Err(n);
        }
        code_point = (code_point << 6) | u32::from(byte & 0x3f);
    }

    match char::from_u32(code_point) {
        Some(c) => Ok((c, len)),
        None => Err(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed() {
        let text = "ascii é € 😀 \u{10FFFF}";
        assert_eq!(decode_strict(text.as_bytes()).unwrap(), text);
        assert!(is_valid(text.as_bytes()));
    }

    #[test]
    fn test_rejects_overlong() {
        assert_eq!(decode_strict(&[b'a', 0xc0, 0x80]), Err(1));
        assert_eq!(decode_strict(&[0xe0, 0x80, 0xaf]), Err(0));
        assert_eq!(decode_strict(&[0xf0, 0x80, 0x80, 0xaf]), Err(0));
    }

    #[test]
    fn test_rejects_surrogates() {
        assert_eq!(decode_strict(&[0xed, 0xa0, 0x80]), Err(0));
        assert_eq!(decode_strict(&[0xed, 0xbf, 0xbf]), Err(0));
        assert!(decode_strict(&[0xed, 0x9f, 0xbf]).is_ok());
    }

    #[test]
    fn test_rejects_truncated_and_out_of_range() {
        assert_eq!(decode_strict(&[b'x', b'y', 0xe2, 0x82]), Err(2));
        assert_eq!(decode_strict(&[0xf4, 0x90, 0x80, 0x80]), Err(0));
        assert_eq!(decode_strict(&[0xff]), Err(0));
        assert_eq!(first_invalid(&[b'o', b'k', 0x80]), Some(2));
    }

    #[test]
    fn test_lossy_replaces_maximal_subparts() {
        assert_eq!(decode_lossy(&[b'a', 0xf0, 0x9f, 0x98, b'b']), "a\u{FFFD}b");
        assert_eq!(decode_lossy(&[0xc0, 0x80]), "\u{FFFD}\u{FFFD}");
        assert_eq!(decode_lossy(&[0xed, 0xa0, 0x80]), "\u{FFFD}\u{FFFD}\u{FFFD}");
        assert_eq!(decode_lossy(b"plain"), "plain");
    }
}
