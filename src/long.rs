// ABOUTME: The Long value type: a 64-bit two's-complement integer held as two 32-bit words.
// ABOUTME: The unsigned flag only changes presentation (decimal text and numeric conversions), never the bits.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

/// Longest accepted decimal digit run ("18446744073709551615" has 20).
const MAX_DIGITS: usize = 20;

/// A 64-bit integer stored as its low and high 32-bit words plus an unsigned presentation flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Long {
    low: i32,
    high: i32,
    unsigned: bool,
}

impl Long {
    pub const ZERO: Long = Long::new(0, 0, false);
    pub const ONE: Long = Long::new(1, 0, false);
    pub const MAX_VALUE: Long = Long::new(-1, i32::MAX, false);
    pub const MIN_VALUE: Long = Long::new(0, i32::MIN, false);
    pub const MAX_UNSIGNED_VALUE: Long = Long::new(-1, -1, true);

    /// Build from the two 32-bit words.
    #[must_use]
    pub const fn new(low: i32, high: i32, unsigned: bool) -> Self {
        Self { low, high, unsigned }
    }

    /// Build from a raw 64-bit pattern.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn from_bits(bits: u64, unsigned: bool) -> Self {
        Self::new(bits as u32 as i32, (bits >> 32) as u32 as i32, unsigned)
    }

    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i64(value: i64) -> Self {
        Self::from_bits(value as u64, false)
    }

    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self::from_bits(value, true)
    }

    /// Keep the low 64 bits of a wider integer (two's-complement wraparound).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn from_i128(value: i128, unsigned: bool) -> Self {
        Self::from_bits(value as u64, unsigned)
    }

    /// Convert a float, saturating at the type bounds. NaN maps to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64, unsigned: bool) -> Self {
        if unsigned {
            Self::from_u64(value as u64)
        } else {
            Self::from_i64(value as i64)
        }
    }

    /// Parse a decimal string.
    ///
    /// Accepts an optional sign followed by 1 to 20 decimal digits with no
    /// leading zeros (other than "0" itself). The value must fit the signed
    /// range, or the full unsigned range when `unsigned` is set.
    pub fn parse(text: &str, unsigned: bool) -> Result<Self> {
        let invalid = |reason| Error::InvalidLong {
            input: text.to_owned(),
            reason,
        };

        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        if digits.is_empty() {
            return Err(invalid("contains no digits"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("contains non-digit characters"));
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(invalid("contains leading zeros"));
        }
        if digits.len() > MAX_DIGITS {
            return Err(invalid("exceeds 20 digits"));
        }

        let magnitude = digits
            .bytes()
            .fold(0i128, |acc, b| acc * 10 + i128::from(b - b'0'));
        let value = if negative { -magnitude } else { magnitude };

        let (min, max) = if unsigned {
            (0, i128::from(u64::MAX))
        } else {
            (i128::from(i64::MIN), i128::from(i64::MAX))
        };
        if value < min {
            return Err(invalid(if unsigned {
                "negative value for unsigned long"
            } else {
                "out of range"
            }));
        }
        if value > max {
            return Err(invalid("out of range"));
        }
        Ok(Self::from_i128(value, unsigned))
    }

    #[must_use]
    pub const fn low(&self) -> i32 {
        self.low
    }

    #[must_use]
    pub const fn high(&self) -> i32 {
        self.high
    }

    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    /// The raw 64-bit pattern.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn bits(&self) -> u64 {
        ((self.high as u32 as u64) << 32) | (self.low as u32 as u64)
    }

    /// The bits read as a signed integer, regardless of the flag.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn to_i64(&self) -> i64 {
        self.bits() as i64
    }

    /// The bits read as an unsigned integer, regardless of the flag.
    #[must_use]
    pub const fn to_u64(&self) -> u64 {
        self.bits()
    }

    /// The numeric value honoring the unsigned flag.
    #[must_use]
    pub const fn to_i128(&self) -> i128 {
        if self.unsigned {
            self.to_u64() as i128
        } else {
            self.to_i64() as i128
        }
    }

    /// The nearest double to the numeric value.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        if self.unsigned {
            self.to_u64() as f64
        } else {
            self.to_i64() as f64
        }
    }

    #[must_use]
    pub const fn to_signed(self) -> Self {
        Self::new(self.low, self.high, false)
    }

    #[must_use]
    pub const fn to_unsigned(self) -> Self {
        Self::new(self.low, self.high, true)
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.low == 0 && self.high == 0
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        !self.unsigned && self.high < 0
    }

    /// True when the value lies within ±2^53, where a double holds it exactly.
    #[must_use]
    pub const fn is_safe_integer(&self) -> bool {
        let value = self.to_i128();
        let limit = crate::types::limits::MAX_SAFE_INTEGER as i128;
        value >= -limit && value <= limit
    }

    /// Division honoring the unsigned flag. `None` on a zero divisor.
    #[must_use]
    pub fn checked_div(self, rhs: Long) -> Option<Long> {
        if rhs.is_zero() {
            return None;
        }
        Some(if self.unsigned {
            Self::from_bits(self.to_u64() / rhs.to_u64(), true)
        } else {
            Self::from_i64(self.to_i64().wrapping_div(rhs.to_i64()))
        })
    }

    /// Remainder honoring the unsigned flag. `None` on a zero divisor.
    #[must_use]
    pub fn checked_rem(self, rhs: Long) -> Option<Long> {
        if rhs.is_zero() {
            return None;
        }
        Some(if self.unsigned {
            Self::from_bits(self.to_u64() % rhs.to_u64(), true)
        } else {
            Self::from_i64(self.to_i64().wrapping_rem(rhs.to_i64()))
        })
    }

    fn with_bits(self, bits: u64) -> Self {
        Self::from_bits(bits, self.unsigned)
    }
}

impl PartialEq for Long {
    /// Equal when the bits match, except that a signed and an unsigned value
    /// with the top bit set denote different numbers.
    fn eq(&self, other: &Self) -> bool {
        if self.unsigned != other.unsigned && self.high < 0 && other.high < 0 {
            return false;
        }
        self.low == other.low && self.high == other.high
    }
}

impl Eq for Long {}

impl Hash for Long {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl PartialOrd for Long {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Long {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_i128().cmp(&other.to_i128())
    }
}

impl Add for Long {
    type Output = Long;
    fn add(self, rhs: Long) -> Long {
        self.with_bits(self.bits().wrapping_add(rhs.bits()))
    }
}

impl Sub for Long {
    type Output = Long;
    fn sub(self, rhs: Long) -> Long {
        self.with_bits(self.bits().wrapping_sub(rhs.bits()))
    }
}

impl Mul for Long {
    type Output = Long;
    fn mul(self, rhs: Long) -> Long {
        self.with_bits(self.bits().wrapping_mul(rhs.bits()))
    }
}

impl Neg for Long {
    type Output = Long;
    fn neg(self) -> Long {
        self.with_bits(self.bits().wrapping_neg())
    }
}

impl fmt::Display for Long {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unsigned {
            write!(f, "{}", self.to_u64())
        } else {
            write!(f, "{}", self.to_i64())
        }
    }
}

impl FromStr for Long {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, false)
    }
}

impl From<i32> for Long {
    fn from(value: i32) -> Self {
        Self::from_i64(i64::from(value))
    }
}

impl From<u32> for Long {
    fn from(value: u32) -> Self {
        Self::from_u64(u64::from(value))
    }
}

impl From<i64> for Long {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<u64> for Long {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}
