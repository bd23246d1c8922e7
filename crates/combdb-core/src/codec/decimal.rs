//! Fixed-point decimal ordering.
//!
//! A decimal cell is the unscaled value (`value × 10^scale`) as a 16-byte
//! big-endian `i128`. The ordered form packs the integer part into
//! `bytes_from_digits(precision - 2)` bytes and the fractional part into
//! `bytes_from_digits(scale)` bytes, flips the top bit, and complements
//! everything for negative values so larger magnitudes sort lower.

use crate::codec::value::ValueEncodeError;

/// Largest precision whose unscaled values always fit an `i128`.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Bytes needed to hold `digits` decimal digits, packed per nine-digit group.
#[must_use]
pub const fn bytes_from_digits(digits: u32) -> usize {
    (4 * (digits / 9) + (digits % 9).div_ceil(2)) as usize
}

/// Digits reserved for the integer part of a `decimal(precision, _)`.
#[must_use]
pub const fn integer_digits(precision: u8) -> u32 {
    precision.saturating_sub(2) as u32
}

/// Width of the ordered encoding for `decimal(precision, scale)`.
#[must_use]
pub const fn encoded_len(precision: u8, scale: u8) -> usize {
    bytes_from_digits(integer_digits(precision)) + bytes_from_digits(scale as u32)
}

/// Encode an unscaled value into its ordered form.
pub fn encode(unscaled: i128, precision: u8, scale: u8) -> Result<Vec<u8>, ValueEncodeError> {
    let len = encoded_len(precision, scale);
    if len == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
        return Err(ValueEncodeError::InvalidDecimal { precision, scale });
    }

    let pow = 10u128.pow(u32::from(scale));
    let magnitude = unscaled.unsigned_abs();
    let left = magnitude / pow;
    let right = magnitude % pow;

    let int_digits = integer_digits(precision);
    if left >= 10u128.pow(int_digits) {
        return Err(ValueEncodeError::DecimalOverflow { precision, scale });
    }

    let mut buff = Vec::with_capacity(len);
    push_fixed_be(&mut buff, left, bytes_from_digits(int_digits));
    push_fixed_be(&mut buff, right, bytes_from_digits(u32::from(scale)));

    buff[0] ^= 0x80;
    if unscaled < 0 {
        for byte in &mut buff {
            *byte = !*byte;
        }
    }

    Ok(buff)
}

/// Recover the unscaled value from its ordered form.
pub fn decode(bytes: &[u8], precision: u8, scale: u8) -> Result<i128, ValueEncodeError> {
    let len = encoded_len(precision, scale);
    if bytes.len() != len || len == 0 {
        return Err(ValueEncodeError::WidthMismatch {
            expected: len,
            found: bytes.len(),
        });
    }

    let mut buff = bytes.to_vec();
    let negative = buff[0] & 0x80 == 0;
    if negative {
        for byte in &mut buff {
            *byte = !*byte;
        }
    }
    buff[0] ^= 0x80;

    let left_len = bytes_from_digits(integer_digits(precision));
    let left = read_be(&buff[..left_len])?;
    let right = read_be(&buff[left_len..])?;

    let pow = 10u128.pow(u32::from(scale));
    let magnitude = left
        .checked_mul(pow)
        .and_then(|v| v.checked_add(right))
        .and_then(|v| i128::try_from(v).ok())
        .ok_or(ValueEncodeError::DecimalOverflow { precision, scale })?;

    Ok(if negative { -magnitude } else { magnitude })
}

// Write the low `width` bytes of `value`, left-padding with zeros past 16.
fn push_fixed_be(out: &mut Vec<u8>, value: u128, width: usize) {
    let be = value.to_be_bytes();
    if width > be.len() {
        out.resize(out.len() + width - be.len(), 0);
        out.extend_from_slice(&be);
    } else {
        out.extend_from_slice(&be[be.len() - width..]);
    }
}

fn read_be(bytes: &[u8]) -> Result<u128, ValueEncodeError> {
    bytes.iter().try_fold(0u128, |acc, &byte| {
        acc.checked_mul(256)
            .map(|v| v | u128::from(byte))
            .ok_or(ValueEncodeError::WidthMismatch {
                expected: 16,
                found: bytes.len(),
            })
    })
}

///
/// TESTS
///
