// ABOUTME: IEEE 754-2008 decimal128 (binary integer decimal encoding) parsing, formatting and bytes.
// ABOUTME: Strict parsing rejects inexact input; the rounding entry point rounds half-even instead.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Inputs this long are rejected before any digit work.
const MAX_INPUT_LENGTH: usize = 7000;

/// Cap for parsed exponent magnitudes, well past anything representable.
const EXPONENT_CAP: i64 = 1 << 40;

const SIGN_BIT: u64 = 1 << 63;
const SIGNIFICAND_HIGH_MASK: u64 = (1 << 49) - 1;
const COMBINATION_INFINITY: u64 = 30;
const COMBINATION_NAN: u64 = 31;

/// A 128-bit decimal floating-point value, held as its 16 little-endian wire bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    bytes: [u8; 16],
}

impl Decimal128 {
    pub const EXPONENT_MAX: i32 = 6111;
    pub const EXPONENT_MIN: i32 = -6176;
    pub const EXPONENT_BIAS: i32 = 6176;
    pub const MAX_DIGITS: usize = 34;
    /// 10^34 - 1, the largest canonical significand.
    pub const MAX_SIGNIFICAND: u128 = 9_999_999_999_999_999_999_999_999_999_999_999;

    pub const NAN: Decimal128 = Decimal128::from_words(0x7c00_0000_0000_0000, 0);
    pub const INFINITY: Decimal128 = Decimal128::from_words(0x7800_0000_0000_0000, 0);
    pub const NEG_INFINITY: Decimal128 = Decimal128::from_words(0xf800_0000_0000_0000, 0);
    pub const ZERO: Decimal128 = Decimal128::from_words(0x3040_0000_0000_0000, 0);

    /// Wrap 16 wire bytes as-is. Any bit pattern is accepted.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// The 16 wire bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 16] {
        self.bytes
    }

    const fn from_words(high: u64, low: u64) -> Self {
        let lo = low.to_le_bytes();
        let hi = high.to_le_bytes();
        let mut bytes = [0u8; 16];
        let mut i = 0;
        while i < 8 {
            bytes[i] = lo[i];
            bytes[i + 8] = hi[i];
            i += 1;
        }
        Self { bytes }
    }

    fn low(&self) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[..8]);
        u64::from_le_bytes(raw)
    }

    fn high(&self) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[8..]);
        u64::from_le_bytes(raw)
    }

    /// Assemble a finite value. The exponent must be in range and the significand at most 113 bits.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_parts(negative: bool, exponent: i32, significand: u128) -> Self {
        let biased = (exponent + Self::EXPONENT_BIAS) as u64 & 0x3fff;
        let mut high = (biased << 49) | ((significand >> 64) as u64 & SIGNIFICAND_HIGH_MASK);
        if negative {
            high |= SIGN_BIT;
        }
        Self::from_words(high, significand as u64)
    }

    fn combination(&self) -> u64 {
        (self.high() >> 58) & 0x1f
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.combination() == COMBINATION_NAN
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.combination() == COMBINATION_INFINITY
    }

    /// True when the sign bit is set, including negative zero and negative NaN.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.high() & SIGN_BIT != 0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        !self.is_nan() && !self.is_infinite() && self.decompose().1 == 0
    }

    /// Unbiased exponent and significand of a finite value.
    ///
    /// Non-canonical encodings (the "11" combination form, or a significand
    /// above 10^34 - 1) read as a zero significand.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn decompose(&self) -> (i32, u128) {
        let high = self.high();
        if self.combination() >> 3 == 3 {
            let biased = ((high >> 47) & 0x3fff) as i32;
            return (biased - Self::EXPONENT_BIAS, 0);
        }
        let biased = ((high >> 49) & 0x3fff) as i32;
        let significand = (u128::from(high & SIGNIFICAND_HIGH_MASK) << 64) | u128::from(self.low());
        let significand = if significand > Self::MAX_SIGNIFICAND {
            0
        } else {
            significand
        };
        (biased - Self::EXPONENT_BIAS, significand)
    }

    /// Parse a decimal string exactly.
    ///
    /// Input that needs more than 34 significant digits, or an exponent
    /// outside the representable range, is rejected rather than rounded.
    pub fn parse(input: &str) -> Result<Self> {
        parse_impl(input, false)
    }

    /// Parse a decimal string, rounding half-even to 34 significant digits.
    ///
    /// Values too small to represent round to zero (or the smallest step);
    /// values whose rounding carries past the largest exponent become infinite.
    pub fn parse_with_rounding(input: &str) -> Result<Self> {
        parse_impl(input, true)
    }
}

fn split_sign(input: &str) -> (bool, &str) {
    match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    }
}

fn parse_impl(input: &str, rounding: bool) -> Result<Decimal128> {
    let invalid = |reason: &'static str| Error::InvalidDecimal128 {
        input: input.to_owned(),
        reason,
    };

    if input.len() >= MAX_INPUT_LENGTH {
        return Err(invalid("not a valid Decimal128 string"));
    }

    let (negative, body) = split_sign(input);
    if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity") {
        return Ok(if negative {
            Decimal128::NEG_INFINITY
        } else {
            Decimal128::INFINITY
        });
    }
    if body.eq_ignore_ascii_case("nan") {
        return Ok(Decimal128::NAN);
    }

    // Significand digits with leading zeros stripped.
    let bytes = body.as_bytes();
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut saw_digit = false;
    let mut saw_point = false;
    let mut fraction_digits: i64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b @ b'0'..=b'9' => {
                saw_digit = true;
                if !(digits.is_empty() && b == b'0') {
                    digits.push(b - b'0');
                }
                if saw_point {
                    fraction_digits += 1;
                }
            }
            b'.' => {
                if saw_point {
                    return Err(invalid("contains multiple periods"));
                }
                saw_point = true;
            }
            b'e' | b'E' => break,
            b'+' | b'-' if saw_digit => return Err(invalid("missing e before exponent")),
            _ => return Err(invalid("not a valid Decimal128 string")),
        }
        i += 1;
    }

    let mut exponent: i64 = 0;
    if i < bytes.len() {
        if !saw_digit {
            return Err(invalid("missing exponent base"));
        }
        let power = &bytes[i + 1..];
        let (power_negative, power_digits) = match power.first() {
            Some(b'-') => (true, &power[1..]),
            Some(b'+') => (false, &power[1..]),
            _ => (false, power),
        };
        if power_digits.is_empty() {
            return Err(invalid("missing exponent power"));
        }
        for &b in power_digits {
            if !b.is_ascii_digit() {
                return Err(invalid("not a valid Decimal128 string"));
            }
            exponent = (exponent * 10 + i64::from(b - b'0')).min(EXPONENT_CAP);
        }
        if power_negative {
            exponent = -exponent;
        }
    }
    if !saw_digit {
        return Err(invalid("not a valid Decimal128 string"));
    }
    exponent -= fraction_digits;

    let max = i64::from(Decimal128::EXPONENT_MAX);
    let min = i64::from(Decimal128::EXPONENT_MIN);

    if digits.is_empty() {
        #[allow(clippy::cast_possible_truncation)]
        let clamped = exponent.clamp(min, max) as i32;
        return Ok(Decimal128::from_parts(negative, clamped, 0));
    }

    // Trade exponent for trailing zeros while there is room for more digits.
    while exponent > max {
        if digits.len() >= Decimal128::MAX_DIGITS {
            return Err(invalid("overflow"));
        }
        digits.push(0);
        exponent -= 1;
    }

    #[allow(clippy::cast_possible_wrap)]
    let excess = (digits.len() as i64 - Decimal128::MAX_DIGITS as i64).max(min - exponent);
    if excess > 0 {
        let drop = usize::try_from(excess).unwrap_or(usize::MAX);
        if rounding {
            round_half_even(&mut digits, drop);
            if digits.len() > Decimal128::MAX_DIGITS {
                digits.pop();
                exponent += 1;
            }
        } else {
            check_exact(&digits, drop).map_err(invalid)?;
            digits.truncate(digits.len() - drop);
        }
        exponent += excess;
    }

    if exponent > max {
        if rounding {
            return Ok(if negative {
                Decimal128::NEG_INFINITY
            } else {
                Decimal128::INFINITY
            });
        }
        return Err(invalid("overflow"));
    }

    let significand = digits
        .iter()
        .fold(0u128, |acc, &d| acc * 10 + u128::from(d));
    #[allow(clippy::cast_possible_truncation)]
    Ok(Decimal128::from_parts(negative, exponent as i32, significand))
}

/// Confirm the last `drop` digits are zeros that can be shed without changing the value.
fn check_exact(digits: &[u8], drop: usize) -> std::result::Result<(), &'static str> {
    let n = digits.len();
    for k in 0..drop.min(n) {
        let idx = n - 1 - k;
        if idx == 0 {
            return Err("exponent underflow");
        }
        if digits[idx] != 0 {
            return Err("inexact rounding");
        }
    }
    Ok(())
}

/// Remove the last `drop` digits, rounding the remainder half-even.
fn round_half_even(digits: &mut Vec<u8>, drop: usize) {
    let n = digits.len();
    if drop > n {
        digits.clear();
        return;
    }
    let keep = n - drop;
    let round_digit = digits[keep];
    let sticky = digits[keep + 1..].iter().any(|&d| d != 0);
    let last_odd = keep > 0 && digits[keep - 1] % 2 == 1;
    digits.truncate(keep);

    if round_digit > 5 || (round_digit == 5 && (sticky || last_odd)) {
        for d in digits.iter_mut().rev() {
            if *d == 9 {
                *d = 0;
            } else {
                *d += 1;
                return;
            }
        }
        digits.insert(0, 1);
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("NaN");
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        if self.is_infinite() {
            return f.write_str("Infinity");
        }

        let (exponent, significand) = self.decompose();
        let digits = significand.to_string();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let scientific_exponent = digits.len() as i32 - 1 + exponent;

        if scientific_exponent >= 34 || scientific_exponent <= -7 || exponent > 0 {
            let (first, rest) = digits.split_at(1);
            f.write_str(first)?;
            if !rest.is_empty() {
                write!(f, ".{rest}")?;
            }
            return if scientific_exponent >= 0 {
                write!(f, "E+{scientific_exponent}")
            } else {
                write!(f, "E{scientific_exponent}")
            };
        }

        if exponent == 0 {
            return f.write_str(&digits);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let point = digits.len() as i32 + exponent;
        if point > 0 {
            #[allow(clippy::cast_sign_loss)]
            let (whole, fraction) = digits.split_at(point as usize);
            write!(f, "{whole}.{fraction}")
        } else {
            f.write_str("0.")?;
            for _ in 0..-point {
                f.write_str("0")?;
            }
            f.write_str(&digits)
        }
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal128(\"{self}\")")
    }
}

impl FromStr for Decimal128 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<i32> for Decimal128 {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<i64> for Decimal128 {
    fn from(value: i64) -> Self {
        Self::from_parts(value < 0, 0, u128::from(value.unsigned_abs()))
    }
}

impl Default for Decimal128 {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(d: Decimal128) -> String {
        d.bytes().iter().map(|b| format!("{b:02X}")).collect()
    }

    fn from_hex(text: &str) -> Decimal128 {
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).unwrap();
        }
        Decimal128::from_bytes(bytes)
    }

    #[test]
    fn test_special_values() {
        assert_eq!(Decimal128::parse("NaN").unwrap().to_string(), "NaN");
        assert_eq!(Decimal128::parse("-nan").unwrap(), Decimal128::NAN);
        assert_eq!(Decimal128::parse("Inf").unwrap(), Decimal128::INFINITY);
        assert_eq!(Decimal128::parse("-infinity").unwrap(), Decimal128::NEG_INFINITY);
        assert_eq!(Decimal128::NEG_INFINITY.to_string(), "-Infinity");
        // Signaling and negative NaN normalize on output.
        assert_eq!(from_hex("0000000000000000000000000000007E").to_string(), "NaN");
        assert_eq!(from_hex("000000000000000000000000000000FC").to_string(), "NaN");
    }

    #[test]
    fn test_zeros() {
        assert_eq!(hex(Decimal128::parse("0").unwrap()), "00000000000000000000000000004030");
        assert_eq!(hex(Decimal128::parse("-0").unwrap()), "000000000000000000000000000040B0");
        assert_eq!(Decimal128::parse("-0.0").unwrap().to_string(), "-0.0");
        assert_eq!(Decimal128::parse("0e+6000").unwrap().to_string(), "0E+6000");
        assert_eq!(Decimal128::parse("0E+8000").unwrap().to_string(), "0E+6111");
        assert_eq!(Decimal128::parse("0E-8000").unwrap().to_string(), "0E-6176");
    }

    #[test]
    fn test_non_canonical_forms_differ() {
        let one = Decimal128::parse("1").unwrap();
        let one_point_zero = Decimal128::parse("1.0").unwrap();
        assert_ne!(one.bytes(), one_point_zero.bytes());
        assert_eq!(one.to_string(), "1");
        assert_eq!(one_point_zero.to_string(), "1.0");
    }

    #[test]
    fn test_plain_and_scientific_output() {
        for (input, expected) in [
            ("0.001234", "0.001234"),
            ("0.1", "0.1"),
            ("2.000", "2.000"),
            ("-100E-10", "-1.00E-8"),
            ("1E+3", "1E+3"),
            ("1050E+1", "1.050E+4"),
            ("1.234567890123456789012345678901234E-7", "1.234567890123456789012345678901234E-7"),
            ("0.0000001", "1E-7"),
            ("0.000001", "0.000001"),
            ("1E6112", "1.0E+6112"),
            ("1E+6144", "1.000000000000000000000000000000000E+6144"),
        ] {
            assert_eq!(Decimal128::parse(input).unwrap().to_string(), expected, "{input}");
        }
    }

    #[test]
    fn test_strict_errors() {
        let reason = |input: &str| match Decimal128::parse(input) {
            Err(Error::InvalidDecimal128 { reason, .. }) => reason,
            other => panic!("{input}: {other:?}"),
        };
        assert_eq!(reason("12345678901234567890123456789012345"), "inexact rounding");
        assert_eq!(reason("1E-6177"), "exponent underflow");
        assert_eq!(reason("1E+6145"), "overflow");
        assert_eq!(reason("1..2"), "contains multiple periods");
        assert_eq!(reason("1e"), "missing exponent power");
        assert_eq!(reason("e5"), "missing exponent base");
        assert_eq!(reason("1+5"), "missing e before exponent");
        assert_eq!(reason("abc"), "not a valid Decimal128 string");
        assert_eq!(reason("-"), "not a valid Decimal128 string");
        assert_eq!(reason(&"1".repeat(7000)), "not a valid Decimal128 string");
    }

    #[test]
    fn test_exact_trailing_zeros_are_shed() {
        let d = Decimal128::parse("10E-6177").unwrap();
        assert_eq!(d.to_string(), "1E-6176");
        let d = Decimal128::parse("1234567890123456789012345678901234000").unwrap();
        assert_eq!(d.to_string(), "1.234567890123456789012345678901234E+36");
    }

    #[test]
    fn test_rounding() {
        let round = |input: &str| Decimal128::parse_with_rounding(input).unwrap().to_string();
        assert_eq!(
            round("12345678901234567890123456789012345"),
            "1.234567890123456789012345678901234E+34"
        );
        assert_eq!(
            round("12345678901234567890123456789012355"),
            "1.234567890123456789012345678901236E+34"
        );
        assert_eq!(round("1E-6177"), "0E-6176");
        assert_eq!(round("15E-6177"), "2E-6176");
        assert_eq!(round("25E-6177"), "2E-6176");
        assert_eq!(round("26E-6177"), "3E-6176");
        assert_eq!(
            round("99999999999999999999999999999999999"),
            "1.000000000000000000000000000000000E+35"
        );
        assert_eq!(round("99999999999999999999999999999999999E+6111"), "Infinity");
    }

    #[test]
    fn test_canonical_bytes_round_trip() {
        for text in [
            "F2AF967ED05C82DE3297FF6FDE3C4030",
            "F2AF967ED05C82DE3297FF6FDE3CFC2F",
            "FFFFFFFF638E8D37C087ADBE09ED0100",
            "000000000A5BC138938D44C64D31FE5F",
            "01000000000000000000000000000000",
            "D2040000000000000000000000003430",
        ] {
            let d = from_hex(text);
            let reparsed = Decimal128::parse(&d.to_string()).unwrap();
            assert_eq!(hex(reparsed), text);
        }
    }

    #[test]
    fn test_non_canonical_significand_reads_as_zero() {
        // Combination bits 11 without the Infinity or NaN pattern.
        let d = from_hex("0000000000000000000000000000006C");
        assert!(d.is_zero());
        assert_eq!(d.to_string(), "0E-32");
        // A 113-bit significand above 10^34 - 1.
        let d = from_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFF4130");
        assert!(d.is_zero());
        assert_eq!(d.to_string(), "0");
    }

    #[test]
    fn test_from_integers() {
        assert_eq!(Decimal128::from(-42i64).to_string(), "-42");
        assert_eq!(Decimal128::from(i64::MIN).to_string(), "-9223372036854775808");
        assert_eq!(Decimal128::from(0), Decimal128::ZERO);
    }
}
