//! Embedding blob format.
//!
//! A vector is stored as packed little-endian IEEE-754 `f32` values with no
//! header; the dimension is `len / 4`. Encoding is bit-exact in both
//! directions, so a decoded vector compares equal to the one that was stored.

use zerocopy::byteorder::little_endian::F32;
use zerocopy::{FromBytes, IntoBytes};

/// Name recorded in the `meta` table next to the embedding model.
pub const CODEC_NAME: &str = "f32le";

const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("blob length {0} is not a multiple of 4")]
    Length(usize),
    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
}

pub fn encode(vector: &[f32]) -> Vec<u8> {
    let packed: Vec<F32> = vector.iter().copied().map(F32::new).collect();
    packed.as_bytes().to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % ELEMENT_SIZE != 0 {
        return Err(CodecError::Length(bytes.len()));
    }
    let packed =
        <[F32]>::ref_from_bytes(bytes).map_err(|_| CodecError::Length(bytes.len()))?;

    packed
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let value = value.get();
            if value.is_finite() {
                Ok(value)
            } else {
                Err(CodecError::NonFinite { index })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(vector: &[f32]) -> Vec<u32> {
        vector.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn test_layout_is_little_endian() {
        assert_eq!(encode(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(encode(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_zero_vector_round_trip() {
        let zeros = vec![0.0_f32; 384];
        let decoded = decode(&encode(&zeros)).unwrap();
        assert_eq!(bits(&decoded), bits(&zeros));
    }

    #[test]
    fn test_high_dimension_round_trip_is_bit_exact() {
        // deterministic xorshift sample
        let mut state: u32 = 0x9e37_79b9;
        let vector: Vec<f32> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect();

        let blob = encode(&vector);
        assert_eq!(blob.len(), vector.len() * 4);
        let decoded = decode(&blob).unwrap();
        assert_eq!(bits(&decoded), bits(&vector));
    }

    #[test]
    fn test_negative_zero_and_subnormal_survive() {
        let vector = [-0.0_f32, f32::MIN_POSITIVE / 2.0, f32::MAX, f32::MIN];
        let decoded = decode(&encode(&vector)).unwrap();
        assert_eq!(bits(&decoded), bits(&vector));
    }

    #[test]
    fn test_rejects_truncated_blob() {
        assert_eq!(decode(&[0, 0, 128]), Err(CodecError::Length(3)));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let mut blob = encode(&[0.5, 0.25]);
        blob.extend_from_slice(&f32::NAN.to_le_bytes());
        assert_eq!(decode(&blob), Err(CodecError::NonFinite { index: 2 }));
    }
}
