// ABOUTME: Binary values (subtype byte plus payload) and the subtype 9 vector layout.
// ABOUTME: Vector payloads are a dtype byte, a padding byte, then int8, float32 or packed-bit elements.

use crate::error::{Error, Result};
use crate::types::binary_subtype;

/// Element type marker in the first byte of a vector payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorDType {
    Int8,
    Float32,
    PackedBit,
}

impl VectorDType {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            VectorDType::Int8 => 0x03,
            VectorDType::Float32 => 0x27,
            VectorDType::PackedBit => 0x10,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x03 => Some(VectorDType::Int8),
            0x27 => Some(VectorDType::Float32),
            0x10 => Some(VectorDType::PackedBit),
            _ => None,
        }
    }
}

/// Opaque bytes tagged with a subtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    #[must_use]
    pub fn new(subtype: u8, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }

    /// Generic (subtype 0) bytes.
    #[must_use]
    pub fn generic(bytes: Vec<u8>) -> Self {
        Self::new(binary_subtype::GENERIC, bytes)
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn vector(dtype: VectorDType, padding: u8, elements: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(elements.len() + 2);
        bytes.push(dtype.code());
        bytes.push(padding);
        bytes.extend_from_slice(elements);
        Self::new(binary_subtype::VECTOR, bytes)
    }

    /// An int8 vector.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn from_int8_array(values: &[i8]) -> Self {
        let raw: Vec<u8> = values.iter().map(|&v| v as u8).collect();
        Self::vector(VectorDType::Int8, 0, &raw)
    }

    /// A float32 vector, elements little-endian.
    #[must_use]
    pub fn from_float32_array(values: &[f32]) -> Self {
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::vector(VectorDType::Float32, 0, &raw)
    }

    /// A packed-bit vector from already packed bytes; `padding` unused low bits in the last byte.
    pub fn from_packed_bits(packed: &[u8], padding: u8) -> Result<Self> {
        let binary = Self::vector(VectorDType::PackedBit, padding, packed);
        binary.validate_vector()?;
        Ok(binary)
    }

    /// A packed-bit vector from individual bits, most significant bit first.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut packed = vec![0u8; bits.len().div_ceil(8)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                packed[i / 8] |= 0x80 >> (i % 8);
            }
        }
        let padding = ((8 - bits.len() % 8) % 8) as u8;
        Self::vector(VectorDType::PackedBit, padding, &packed)
    }

    /// Dtype of a vector payload, if this is one.
    #[must_use]
    pub fn vector_dtype(&self) -> Option<VectorDType> {
        if self.subtype != binary_subtype::VECTOR {
            return None;
        }
        self.bytes.first().and_then(|&code| VectorDType::from_code(code))
    }

    /// Check the vector layout rules. Non-vector subtypes and unknown dtypes pass.
    pub fn validate_vector(&self) -> Result<()> {
        if self.subtype != binary_subtype::VECTOR {
            return Ok(());
        }
        let [code, padding, elements @ ..] = self.bytes.as_slice() else {
            return Ok(());
        };
        let Some(dtype) = VectorDType::from_code(*code) else {
            return Ok(());
        };
        match dtype {
            VectorDType::Int8 | VectorDType::Float32 if *padding != 0 => Err(Error::InvalidVector(
                "padding must be zero for int8 and float32 vectors".into(),
            )),
            VectorDType::Float32 if elements.len() % 4 != 0 => Err(Error::InvalidVector(
                "float32 vector byte length must be a multiple of 4".into(),
            )),
            VectorDType::PackedBit if *padding > 7 => Err(Error::InvalidVector(format!(
                "packed bit vector padding must be a value between 0 and 7, got {padding}"
            ))),
            VectorDType::PackedBit if elements.is_empty() && *padding != 0 => Err(
                Error::InvalidVector("padding must be zero for an empty packed bit vector".into()),
            ),
            _ => Ok(()),
        }
    }

    fn vector_elements(&self, expected: VectorDType) -> Result<&[u8]> {
        self.validate_vector()?;
        match self.vector_dtype() {
            Some(dtype) if dtype == expected && self.bytes.len() >= 2 => Ok(&self.bytes[2..]),
            _ => Err(Error::InvalidVector(format!(
                "binary is not a {expected:?} vector"
            ))),
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn to_int8_array(&self) -> Result<Vec<i8>> {
        Ok(self
            .vector_elements(VectorDType::Int8)?
            .iter()
            .map(|&b| b as i8)
            .collect())
    }

    pub fn to_float32_array(&self) -> Result<Vec<f32>> {
        Ok(self
            .vector_elements(VectorDType::Float32)?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Packed bytes and padding of a packed-bit vector.
    pub fn to_packed_bits(&self) -> Result<(Vec<u8>, u8)> {
        let elements = self.vector_elements(VectorDType::PackedBit)?;
        Ok((elements.to_vec(), self.bytes[1]))
    }

    /// Individual bits of a packed-bit vector, padding removed.
    pub fn to_bits(&self) -> Result<Vec<bool>> {
        let (packed, padding) = self.to_packed_bits()?;
        let count = packed.len() * 8 - usize::from(padding);
        Ok((0..count)
            .map(|i| packed[i / 8] & (0x80 >> (i % 8)) != 0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int8_layout() {
        let binary = Binary::from_int8_array(&[1, 2, 3]);
        assert_eq!(binary.subtype, binary_subtype::VECTOR);
        assert_eq!(binary.bytes, vec![0x03, 0x00, 1, 2, 3]);
        assert_eq!(binary.to_int8_array().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_int8_padding_rejected() {
        let binary = Binary::new(binary_subtype::VECTOR, vec![0x03, 0x01, 1, 2, 3]);
        let err = binary.validate_vector().unwrap_err();
        assert!(err.to_string().contains("padding must be zero"));
    }

    #[test]
    fn test_float32_round_trip() {
        let binary = Binary::from_float32_array(&[1.5, -0.25]);
        assert_eq!(binary.len(), 10);
        assert_eq!(binary.to_float32_array().unwrap(), vec![1.5, -0.25]);
        let ragged = Binary::new(binary_subtype::VECTOR, vec![0x27, 0, 1, 2, 3]);
        assert!(ragged.validate_vector().is_err());
    }

    #[test]
    fn test_packed_bits() {
        let binary = Binary::from_bits(&[true, false, true, true, false, false, false, false, true]);
        assert_eq!(binary.bytes, vec![0x10, 7, 0b1011_0000, 0b1000_0000]);
        assert_eq!(binary.to_bits().unwrap().len(), 9);
        assert!(binary.to_bits().unwrap()[8]);
        assert!(Binary::from_packed_bits(&[0xff], 8).is_err());
        assert!(Binary::from_packed_bits(&[], 1).is_err());
        assert!(Binary::from_packed_bits(&[], 0).is_ok());
    }

    #[test]
    fn test_dtype_mismatch() {
        let binary = Binary::from_int8_array(&[1]);
        assert!(binary.to_float32_array().is_err());
        assert!(Binary::generic(vec![1, 2]).to_int8_array().is_err());
        assert!(Binary::generic(vec![]).validate_vector().is_ok());
        let unknown = Binary::new(binary_subtype::VECTOR, vec![0x42, 9]);
        assert!(unknown.validate_vector().is_ok());
        assert!(unknown.to_int8_array().is_err());
    }
}
