// ABOUTME: Bounds-checked little-endian byte reading and writing for the BSON codec.
// ABOUTME: Reader scans C-strings with memchr; Sink abstracts over real output and size counting.

use crate::error::{Error, Result};

/// A cursor over an untrusted byte slice. Every read checks bounds first.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at `pos` within `data`.
    #[must_use]
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current offset into the underlying slice.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// The underlying slice.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    fn require(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        Ok(())
    }

    /// Read a single byte, advancing position.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Read exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.require(n)?;
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian binary64. The bit pattern is kept exactly, NaN payloads included.
    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.read_array()?)))
    }

    /// Read an i32 without advancing.
    #[inline]
    pub fn peek_i32(&self) -> Result<i32> {
        self.require(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        Ok(i32::from_le_bytes(raw))
    }

    /// Read the bytes of a NUL-terminated string, consuming the terminator.
    #[inline]
    pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(end) = memchr::memchr(0, rest) else {
            return Err(Error::InvalidCString { offset: self.pos });
        };
        let bytes = &rest[..end];
        self.pos += end + 1;
        Ok(bytes)
    }

    /// Move the cursor forward without reading.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }
}

/// Destination for encoded bytes.
///
/// The encoder is generic over this trait so that size precomputation walks
/// exactly the same code as encoding.
pub trait Sink {
    /// Bytes written so far.
    fn position(&self) -> usize;

    fn write_bytes(&mut self, bytes: &[u8]);

    /// Overwrite four bytes at `at` with a little-endian i32 written earlier as a placeholder.
    fn patch_i32(&mut self, at: usize, value: i32);

    #[inline]
    fn write_u8(&mut self, byte: u8) {
        self.write_bytes(&[byte]);
    }

    #[inline]
    fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    #[inline]
    fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a little-endian binary64 from its raw bits.
    #[inline]
    fn write_f64(&mut self, value: f64) {
        self.write_bytes(&value.to_bits().to_le_bytes());
    }

    /// Write the bytes followed by a NUL terminator.
    #[inline]
    fn write_cstring(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
        self.write_u8(0);
    }
}

impl Sink for Vec<u8> {
    #[inline]
    fn position(&self) -> usize {
        self.len()
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    #[inline]
    fn patch_i32(&mut self, at: usize, value: i32) {
        self[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// A sink that only counts bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for SizeCounter {
    #[inline]
    fn position(&self) -> usize {
        self.len
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }

    #[inline]
    fn patch_i32(&mut self, _at: usize, _value: i32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_little_endian() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff];
        let mut reader = Reader::new(&data, 0);
        assert_eq!(reader.read_i32().unwrap(), 1);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_reports_offset() {
        let data = [0x01, 0x02];
        let mut reader = Reader::new(&data, 0);
        let err = reader.read_i32().unwrap_err();
        assert_eq!(err, Error::Truncated { offset: 0, needed: 2 });
    }

    #[test]
    fn test_nan_payload_preserved() {
        let bits = 0x7ff8_0000_dead_beef_u64;
        let data = bits.to_le_bytes();
        let mut reader = Reader::new(&data, 0);
        let value = reader.read_f64().unwrap();
        assert!(value.is_nan());
        let mut out = Vec::new();
        out.write_f64(value);
        assert_eq!(out, data);
    }

    #[test]
    fn test_cstring() {
        let data = b"abc\0def";
        let mut reader = Reader::new(data, 0);
        assert_eq!(reader.read_cstring_bytes().unwrap(), b"abc");
        assert_eq!(reader.position(), 4);
        assert_eq!(
            reader.read_cstring_bytes().unwrap_err(),
            Error::InvalidCString { offset: 4 }
        );
    }

    #[test]
    fn test_sinks_agree() {
        let mut out = Vec::new();
        let mut counter = SizeCounter::new();
        for sink in [&mut out as &mut dyn Sink, &mut counter as &mut dyn Sink] {
            sink.write_i32(0);
            sink.write_cstring(b"key");
            sink.write_f64(1.5);
            sink.patch_i32(0, 16);
        }
        assert_eq!(out.len(), counter.position());
        assert_eq!(&out[..4], &16i32.to_le_bytes());
    }
}
