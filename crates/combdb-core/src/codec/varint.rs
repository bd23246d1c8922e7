//! Length-prefixed big-endian integers.
//!
//! `encode(v) = [k] ‖ be_bytes(v)[8-k..]` where `k` in `1..=8` is the minimal
//! byte count for `v`. Shorter encodings carry a smaller first byte, so byte
//! order equals numeric order without a fixed width.

use crate::error::{ErrorOrigin, InternalError};
use thiserror::Error as ThisError;

/// Longest possible encoding: one length byte plus eight magnitude bytes.
pub const MAX_VARINT_LEN: usize = 9;

///
/// VarintError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum VarintError {
    #[error("cannot encode negative value {value}")]
    Negative { value: i64 },

    #[error("varint input is empty")]
    Empty,

    #[error("varint length prefix {len} out of range 1..=8")]
    InvalidLength { len: u8 },

    #[error("varint needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("varint encoding is not minimal")]
    NonCanonical,

    #[error("{trailing} trailing bytes after varint")]
    TrailingBytes { trailing: usize },
}

impl From<VarintError> for InternalError {
    fn from(err: VarintError) -> Self {
        match err {
            VarintError::Negative { .. } => Self::precondition(ErrorOrigin::Codec, err.to_string()),
            _ => Self::corruption(ErrorOrigin::Codec, err.to_string()),
        }
    }
}

/// Minimal number of big-endian bytes needed for `value` (at least one).
#[must_use]
pub const fn encoded_magnitude_len(value: u64) -> usize {
    let significant_bits = u64::BITS - value.leading_zeros();
    if significant_bits == 0 {
        1
    } else {
        significant_bits.div_ceil(8) as usize
    }
}

/// Append the encoding of `value` to `out`.
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    let len = encoded_magnitude_len(value);
    let bytes = value.to_be_bytes();

    #[expect(clippy::cast_possible_truncation)]
    let prefix = len as u8;
    out.push(prefix);
    out.extend_from_slice(&bytes[bytes.len() - len..]);
}

#[must_use]
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    encode_into(value, &mut out);

    out
}

/// Encode a signed value, rejecting negatives.
pub fn encode_i64(value: i64) -> Result<Vec<u8>, VarintError> {
    let unsigned = u64::try_from(value).map_err(|_| VarintError::Negative { value })?;

    Ok(encode(unsigned))
}

/// Decode one varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), VarintError> {
    let (&len, rest) = bytes.split_first().ok_or(VarintError::Empty)?;
    if !(1..=8).contains(&len) {
        return Err(VarintError::InvalidLength { len });
    }

    let len = usize::from(len);
    if rest.len() < len {
        return Err(VarintError::Truncated {
            needed: len + 1,
            available: bytes.len(),
        });
    }

    let magnitude = &rest[..len];
    if len > 1 && magnitude[0] == 0 {
        return Err(VarintError::NonCanonical);
    }

    let value = magnitude
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));

    Ok((value, len + 1))
}

/// Decode a buffer holding exactly one varint.
pub fn decode_exact(bytes: &[u8]) -> Result<u64, VarintError> {
    let (value, used) = decode(bytes)?;
    if used != bytes.len() {
        return Err(VarintError::TrailingBytes {
            trailing: bytes.len() - used,
        });
    }

    Ok(value)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_use_minimal_width() {
        assert_eq!(encode(0), vec![1, 0]);
        assert_eq!(encode(255), vec![1, 255]);
        assert_eq!(encode(256), vec![2, 1, 0]);
        assert_eq!(encode(u64::MAX), vec![8, 255, 255, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn negative_input_is_a_precondition_failure() {
        let err = encode_i64(-1).expect_err("negative must fail");
        assert_eq!(err, VarintError::Negative { value: -1 });

        let internal = InternalError::from(err);
        assert_eq!(internal.class, crate::error::ErrorClass::Precondition);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(decode(&[]), Err(VarintError::Empty));
        assert_eq!(decode(&[0]), Err(VarintError::InvalidLength { len: 0 }));
        assert_eq!(decode(&[9, 0]), Err(VarintError::InvalidLength { len: 9 }));
        assert!(matches!(decode(&[3, 1]), Err(VarintError::Truncated { .. })));
        assert_eq!(decode(&[2, 0, 7]), Err(VarintError::NonCanonical));
        assert_eq!(
            decode_exact(&[1, 7, 9]),
            Err(VarintError::TrailingBytes { trailing: 1 })
        );
    }

    #[test]
    fn decode_reports_consumed_length() {
        let mut buf = encode(70_000);
        buf.extend_from_slice(&[0xAA, 0xBB]);

        assert_eq!(decode(&buf), Ok((70_000, 4)));
    }

    proptest! {
        #[test]
        fn round_trip(value in any::<u64>()) {
            prop_assert_eq!(decode_exact(&encode(value)), Ok(value));
        }

        #[test]
        fn byte_order_matches_numeric_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(encode(a).cmp(&encode(b)), a.cmp(&b));
        }

        #[test]
        fn small_values_order_against_large_ones(a in 0u64..1 << 16, b in (1u64 << 40)..) {
            prop_assert!(encode(a) < encode(b));
        }
    }
}
