//! Row-key model.
//!
//! Every physical key starts with a one-byte discriminant. Catalog kinds sort
//! before data rows, and data rows before both index spaces. After the
//! discriminant come varint ids, then (for index rows) the encoded member
//! values, then the 16-byte row id. Trailing fields may be omitted to form a
//! "floor" key that sorts before every key extending it.

mod index;

#[cfg(test)]
mod tests;

pub use index::{IndexRowKeyBuilder, decode_index_values, push_segment};

use crate::{
    codec::{SortOrder, VarintError, varint},
    error::{ErrorOrigin, InternalError},
    row::{ROW_ID_LEN, RowId},
};
use thiserror::Error as ThisError;

///
/// Discriminant bytes
///

pub mod prefix {
    pub const TABLES: u8 = 0x00;
    pub const COLUMNS: u8 = 0x01;
    pub const INDICES: u8 = 0x02;
    pub const SCHEMA: u8 = 0x03;
    pub const AUTO_INC: u8 = 0x04;
    pub const ROW_COUNT: u8 = 0x05;
    pub const DATA: u8 = 0x06;
    pub const ASC_INDEX: u8 = 0x07;
    pub const DESC_INDEX: u8 = 0x08;

    /// Every discriminant that carries a table id.
    pub const TABLE_SCOPED: [u8; 8] = [
        COLUMNS, INDICES, SCHEMA, AUTO_INC, ROW_COUNT, DATA, ASC_INDEX, DESC_INDEX,
    ];
}

///
/// KeyDecodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum KeyDecodeError {
    #[error("row key is empty")]
    Empty,

    #[error("unknown row key prefix 0x{0:02x}")]
    UnknownPrefix(u8),

    #[error("row key id: {0}")]
    Varint(#[from] VarintError),

    #[error("row key has {len} trailing bytes where a row id was expected")]
    RowId { len: usize },

    #[error("row key has {len} unexpected trailing bytes")]
    Trailing { len: usize },
}

impl From<KeyDecodeError> for InternalError {
    fn from(err: KeyDecodeError) -> Self {
        Self::corruption(ErrorOrigin::Key, err.to_string())
    }
}

///
/// IndexKey
///
/// Fields of an ascending or descending index row key. `values` holds the
/// already-encoded member segments; empty `values` with no row id is the
/// floor of the whole index space.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IndexKey {
    pub table_id: u64,
    pub index_id: u64,
    pub values: Vec<u8>,
    pub row_id: Option<RowId>,
}

impl IndexKey {
    #[must_use]
    pub const fn floor(table_id: u64, index_id: u64) -> Self {
        Self {
            table_id,
            index_id,
            values: Vec::new(),
            row_id: None,
        }
    }
}

///
/// RowKey
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RowKey {
    /// Table name → id catalog, plus the global table id counter.
    Tables,
    /// Column name → id map of one table, plus its column id counter.
    Columns { table_id: u64 },
    /// Index name → id map of one table, plus its index id counter.
    Indices { table_id: u64 },
    /// Table schema blob, or one column's schema when `column_id` is set.
    Schema {
        table_id: u64,
        column_id: Option<u64>,
    },
    AutoInc { table_id: u64 },
    RowCount { table_id: u64 },
    Data {
        table_id: u64,
        row_id: Option<RowId>,
    },
    AscIndex(IndexKey),
    DescIndex(IndexKey),
}

impl RowKey {
    /// Index row key for the given direction.
    #[must_use]
    pub const fn index(order: SortOrder, key: IndexKey) -> Self {
        match order {
            SortOrder::Ascending => Self::AscIndex(key),
            SortOrder::Descending => Self::DescIndex(key),
        }
    }

    /// Floor of one table's data rows.
    #[must_use]
    pub const fn data_floor(table_id: u64) -> Self {
        Self::Data {
            table_id,
            row_id: None,
        }
    }

    /// Floor of one index's key space in the given direction.
    #[must_use]
    pub const fn index_floor(order: SortOrder, table_id: u64, index_id: u64) -> Self {
        Self::index(order, IndexKey::floor(table_id, index_id))
    }

    #[must_use]
    pub const fn discriminant(&self) -> u8 {
        match self {
            Self::Tables => prefix::TABLES,
            Self::Columns { .. } => prefix::COLUMNS,
            Self::Indices { .. } => prefix::INDICES,
            Self::Schema { .. } => prefix::SCHEMA,
            Self::AutoInc { .. } => prefix::AUTO_INC,
            Self::RowCount { .. } => prefix::ROW_COUNT,
            Self::Data { .. } => prefix::DATA,
            Self::AscIndex(_) => prefix::ASC_INDEX,
            Self::DescIndex(_) => prefix::DESC_INDEX,
        }
    }

    #[must_use]
    pub const fn table_id(&self) -> Option<u64> {
        match self {
            Self::Tables => None,
            Self::Columns { table_id }
            | Self::Indices { table_id }
            | Self::Schema { table_id, .. }
            | Self::AutoInc { table_id }
            | Self::RowCount { table_id }
            | Self::Data { table_id, .. } => Some(*table_id),
            Self::AscIndex(key) | Self::DescIndex(key) => Some(key.table_id),
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.push(self.discriminant());

        match self {
            Self::Tables => {}
            Self::Columns { table_id }
            | Self::Indices { table_id }
            | Self::AutoInc { table_id }
            | Self::RowCount { table_id } => varint::encode_into(*table_id, &mut out),
            Self::Schema {
                table_id,
                column_id,
            } => {
                varint::encode_into(*table_id, &mut out);
                if let Some(column_id) = column_id {
                    varint::encode_into(*column_id, &mut out);
                }
            }
            Self::Data { table_id, row_id } => {
                varint::encode_into(*table_id, &mut out);
                if let Some(row_id) = row_id {
                    out.extend_from_slice(&row_id.to_bytes());
                }
            }
            Self::AscIndex(key) | Self::DescIndex(key) => {
                varint::encode_into(key.table_id, &mut out);
                varint::encode_into(key.index_id, &mut out);
                out.extend_from_slice(&key.values);
                if let Some(row_id) = key.row_id {
                    out.extend_from_slice(&row_id.to_bytes());
                }
            }
        }

        out
    }

    /// Decode a stored key.
    ///
    /// Index keys with any bytes after the ids are read as `values ‖ row id`,
    /// which is the only shape ever written.
    pub fn decode(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        let (&discriminant, rest) = bytes.split_first().ok_or(KeyDecodeError::Empty)?;
        let mut cursor = Cursor { rest };

        let key = match discriminant {
            prefix::TABLES => Self::Tables,
            prefix::COLUMNS => Self::Columns {
                table_id: cursor.id()?,
            },
            prefix::INDICES => Self::Indices {
                table_id: cursor.id()?,
            },
            prefix::SCHEMA => Self::Schema {
                table_id: cursor.id()?,
                column_id: cursor.optional_id()?,
            },
            prefix::AUTO_INC => Self::AutoInc {
                table_id: cursor.id()?,
            },
            prefix::ROW_COUNT => Self::RowCount {
                table_id: cursor.id()?,
            },
            prefix::DATA => Self::Data {
                table_id: cursor.id()?,
                row_id: cursor.optional_row_id()?,
            },
            prefix::ASC_INDEX | prefix::DESC_INDEX => {
                let table_id = cursor.id()?;
                let index_id = cursor.id()?;
                let key = cursor.index_tail(table_id, index_id)?;
                if discriminant == prefix::ASC_INDEX {
                    Self::AscIndex(key)
                } else {
                    Self::DescIndex(key)
                }
            }
            other => return Err(KeyDecodeError::UnknownPrefix(other)),
        };

        if !cursor.rest.is_empty() {
            return Err(KeyDecodeError::Trailing {
                len: cursor.rest.len(),
            });
        }

        Ok(key)
    }
}

// Forward-only reader over the bytes after the discriminant.
struct Cursor<'a> {
    rest: &'a [u8],
}

impl Cursor<'_> {
    fn id(&mut self) -> Result<u64, KeyDecodeError> {
        let (value, used) = varint::decode(self.rest)?;
        self.rest = &self.rest[used..];

        Ok(value)
    }

    fn optional_id(&mut self) -> Result<Option<u64>, KeyDecodeError> {
        if self.rest.is_empty() {
            Ok(None)
        } else {
            self.id().map(Some)
        }
    }

    fn optional_row_id(&mut self) -> Result<Option<RowId>, KeyDecodeError> {
        if self.rest.is_empty() {
            return Ok(None);
        }

        let row_id = RowId::try_from_slice(self.rest).ok_or(KeyDecodeError::RowId {
            len: self.rest.len(),
        })?;
        self.rest = &[];

        Ok(Some(row_id))
    }

    fn index_tail(&mut self, table_id: u64, index_id: u64) -> Result<IndexKey, KeyDecodeError> {
        if self.rest.is_empty() {
            return Ok(IndexKey::floor(table_id, index_id));
        }
        if self.rest.len() < ROW_ID_LEN {
            return Err(KeyDecodeError::RowId {
                len: self.rest.len(),
            });
        }

        let split = self.rest.len() - ROW_ID_LEN;
        let values = self.rest[..split].to_vec();
        let row_id = RowId::try_from_slice(&self.rest[split..]).ok_or(KeyDecodeError::RowId {
            len: self.rest.len() - split,
        })?;
        self.rest = &[];

        Ok(IndexKey {
            table_id,
            index_id,
            values,
            row_id: Some(row_id),
        })
    }
}

/// Successor of an id, used for exclusive upper bounds.
pub fn next_id(id: u64) -> Result<u64, InternalError> {
    id.checked_add(1).ok_or_else(|| {
        InternalError::precondition(ErrorOrigin::Key, format!("id {id} has no successor"))
    })
}

/// Add one to `key` read as an unsigned big-endian integer, keeping its
/// length. Every key extending `key` sorts before the result.
///
/// Returns `None` when every byte is `0xFF`.
#[must_use]
pub fn increment_key(key: &[u8]) -> Option<Vec<u8>> {
    let mut out = key.to_vec();
    for byte in out.iter_mut().rev() {
        if *byte == 0xFF {
            *byte = 0x00;
        } else {
            *byte += 1;
            return Some(out);
        }
    }

    None
}
