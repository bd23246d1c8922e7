//! Per-type ordered value encoding.
//!
//! Cells are the stored byte form of a column value (see [`ColumnType`]).
//! `encode_value` maps a cell to a fixed-width byte string whose
//! lexicographic order is the column's logical order; the descending form is
//! the bitwise complement of the ascending one.

use crate::{
    codec::{decimal, parse},
    error::{ErrorOrigin, InternalError},
    schema::{ColumnSchema, ColumnType},
};
use combdb_primitives::ColumnKind;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

const SIGN_BIT_64: u64 = 1 << 63;

///
/// SortOrder
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    #[must_use]
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::Descending)
    }
}

///
/// ValueEncodeError
///
/// Failures turning one cell into ordered bytes. None of these are
/// recoverable by retrying; the value itself is out of the column's domain.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ValueEncodeError {
    #[error("{kind} cell must be {expected} bytes, found {found}")]
    CellWidth {
        kind: ColumnKind,
        expected: usize,
        found: usize,
    },

    #[error("encoded value must be {expected} bytes, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("value for column '{column}' is {len} bytes, exceeding max length {max}")]
    TooLong {
        column: String,
        len: usize,
        max: usize,
    },

    #[error("column '{column}' has no declared max length")]
    MissingMaxLength { column: String },

    #[error("malformed {kind} value '{text}'")]
    InvalidText { kind: ColumnKind, text: String },

    #[error("invalid decimal layout ({precision}, {scale})")]
    InvalidDecimal { precision: u8, scale: u8 },

    #[error("value does not fit decimal({precision}, {scale})")]
    DecimalOverflow { precision: u8, scale: u8 },
}

impl From<ValueEncodeError> for InternalError {
    fn from(err: ValueEncodeError) -> Self {
        match err {
            ValueEncodeError::MissingMaxLength { .. } | ValueEncodeError::InvalidDecimal { .. } => {
                Self::precondition(ErrorOrigin::Codec, err.to_string())
            }
            ValueEncodeError::WidthMismatch { .. } => {
                Self::corruption(ErrorOrigin::Codec, err.to_string())
            }
            _ => Self::domain(ErrorOrigin::Codec, err.to_string()),
        }
    }
}

/// Width in bytes of the ordered encoding for one column.
pub fn encoded_width(column: &ColumnSchema) -> Result<usize, ValueEncodeError> {
    match column.column_type {
        ColumnType::Decimal { precision, scale } => Ok(decimal::encoded_len(precision, scale)),
        ColumnType::String | ColumnType::Binary => max_length(column),
        other => Ok(other.kind().cell_width().unwrap_or_default()),
    }
}

/// Encode one cell in the requested order.
pub fn encode_value(
    column: &ColumnSchema,
    cell: &[u8],
    order: SortOrder,
) -> Result<Vec<u8>, ValueEncodeError> {
    let mut encoded = encode_ascending(column, cell)?;
    if order.is_descending() {
        invert(&mut encoded);
    }

    Ok(encoded)
}

/// Inverse of [`encode_value`].
///
/// String and binary values come back with trailing `0x00` padding removed,
/// so only values without trailing NUL bytes round-trip exactly.
pub fn decode_value(
    column: &ColumnSchema,
    encoded: &[u8],
    order: SortOrder,
) -> Result<Vec<u8>, ValueEncodeError> {
    let expected = encoded_width(column)?;
    if encoded.len() != expected {
        return Err(ValueEncodeError::WidthMismatch {
            expected,
            found: encoded.len(),
        });
    }

    let mut bytes = encoded.to_vec();
    if order.is_descending() {
        invert(&mut bytes);
    }

    let cell = match column.column_type {
        ColumnType::SignedInt => {
            let raw = u64::from_be_bytes(fixed8(&bytes)?);
            (raw ^ SIGN_BIT_64).to_be_bytes().to_vec()
        }
        ColumnType::Double => {
            let raw = u64::from_be_bytes(fixed8(&bytes)?);
            let bits = if raw & SIGN_BIT_64 == 0 {
                !raw
            } else {
                raw ^ SIGN_BIT_64
            };
            bits.to_be_bytes().to_vec()
        }
        ColumnType::Decimal { precision, scale } => decimal::decode(&bytes, precision, scale)?
            .to_be_bytes()
            .to_vec(),
        ColumnType::String | ColumnType::Binary => {
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            bytes.truncate(end);
            bytes
        }
        ColumnType::UnsignedInt | ColumnType::Date | ColumnType::Time | ColumnType::DateTime => {
            bytes
        }
    };

    Ok(cell)
}

// Ascending encoding for one cell.
fn encode_ascending(column: &ColumnSchema, cell: &[u8]) -> Result<Vec<u8>, ValueEncodeError> {
    let kind = column.column_type.kind();

    match column.column_type {
        ColumnType::SignedInt => {
            let value = i64::from_be_bytes(cell_array(kind, cell)?);
            Ok(ordered_i64_bytes(value).to_vec())
        }
        ColumnType::UnsignedInt => Ok(cell_array::<8>(kind, cell)?.to_vec()),
        ColumnType::Double => {
            let value = f64::from_be_bytes(cell_array(kind, cell)?);
            Ok(ordered_f64_bytes(value).to_vec())
        }
        ColumnType::Decimal { precision, scale } => {
            let value = i128::from_be_bytes(cell_array(kind, cell)?);
            decimal::encode(value, precision, scale)
        }
        ColumnType::String | ColumnType::Binary => {
            let max = max_length(column)?;
            if cell.len() > max {
                return Err(ValueEncodeError::TooLong {
                    column: column.name.clone(),
                    len: cell.len(),
                    max,
                });
            }

            let mut padded = Vec::with_capacity(max);
            padded.extend_from_slice(cell);
            padded.resize(max, 0x00);
            Ok(padded)
        }
        ColumnType::Date | ColumnType::Time | ColumnType::DateTime => {
            let text = std::str::from_utf8(cell).ok().filter(|text| parse::is_canonical(kind, text));
            match text {
                Some(text) => Ok(text.as_bytes().to_vec()),
                None => Err(ValueEncodeError::InvalidText {
                    kind,
                    text: String::from_utf8_lossy(cell).into_owned(),
                }),
            }
        }
    }
}

fn max_length(column: &ColumnSchema) -> Result<usize, ValueEncodeError> {
    column
        .max_length
        .map(|max| max as usize)
        .ok_or_else(|| ValueEncodeError::MissingMaxLength {
            column: column.name.clone(),
        })
}

fn cell_array<const N: usize>(kind: ColumnKind, cell: &[u8]) -> Result<[u8; N], ValueEncodeError> {
    cell.try_into().map_err(|_| ValueEncodeError::CellWidth {
        kind,
        expected: N,
        found: cell.len(),
    })
}

fn fixed8(bytes: &[u8]) -> Result<[u8; 8], ValueEncodeError> {
    bytes.try_into().map_err(|_| ValueEncodeError::WidthMismatch {
        expected: 8,
        found: bytes.len(),
    })
}

/// Complement every byte in place.
pub fn invert(bytes: &mut [u8]) {
    for byte in bytes {
        *byte = !*byte;
    }
}

/// Append the complement of `bytes` to `out`.
pub fn push_inverted(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        out.push(!byte);
    }
}

/// Signed integers: flip the sign bit so negatives sort first.
#[must_use]
pub const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ SIGN_BIT_64;
    biased.to_be_bytes()
}

/// IEEE754 doubles: complement negatives, flip the sign bit of positives.
#[must_use]
pub const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & SIGN_BIT_64 == 0 {
        bits ^ SIGN_BIT_64
    } else {
        !bits
    };

    ordered.to_be_bytes()
}

///
/// TESTS
///
