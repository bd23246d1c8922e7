use crate::{
    codec::SortOrder,
    error::InternalError,
    key::{RowKey, increment_key, next_id},
};

///
/// ScanRange
///
/// Half-open physical key range `[start, end)`. Exclusive lower bounds are
/// expressed by incrementing the start key, never by changing scan
/// semantics.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl ScanRange {
    /// Every data row of one table.
    pub fn table(table_id: u64) -> Result<Self, InternalError> {
        Ok(Self {
            start: RowKey::data_floor(table_id).encode(),
            end: RowKey::data_floor(next_id(table_id)?).encode(),
        })
    }

    /// One index's whole key space in the given direction.
    pub fn index_full(order: SortOrder, table_id: u64, index_id: u64) -> Result<Self, InternalError> {
        Ok(Self {
            start: RowKey::index_floor(order, table_id, index_id).encode(),
            end: index_end(order, table_id, index_id)?,
        })
    }

    /// Every index entry of one table in the given direction, across all
    /// index ids.
    pub fn table_indices(order: SortOrder, table_id: u64) -> Result<Self, InternalError> {
        Ok(Self {
            start: RowKey::index_floor(order, table_id, 0).encode(),
            end: RowKey::index_floor(order, next_id(table_id)?, 0).encode(),
        })
    }

    /// From `prefix` (inclusive) to the end of the index space.
    pub fn index_at(
        order: SortOrder,
        table_id: u64,
        index_id: u64,
        prefix: Vec<u8>,
    ) -> Result<Self, InternalError> {
        Ok(Self {
            start: prefix,
            end: index_end(order, table_id, index_id)?,
        })
    }

    /// Past every key extending `prefix`, to the end of the index space.
    pub fn index_after(
        order: SortOrder,
        table_id: u64,
        index_id: u64,
        prefix: &[u8],
    ) -> Result<Self, InternalError> {
        let end = index_end(order, table_id, index_id)?;
        // An all-0xFF prefix has no successor; nothing can sort after it.
        let start = increment_key(prefix).unwrap_or_else(|| end.clone());

        Ok(Self { start, end })
    }

    /// Every key extending `prefix`, regardless of row id.
    pub fn index_exact(
        order: SortOrder,
        table_id: u64,
        index_id: u64,
        prefix: Vec<u8>,
    ) -> Result<Self, InternalError> {
        let end = match increment_key(&prefix) {
            Some(end) => end,
            None => index_end(order, table_id, index_id)?,
        };

        Ok(Self { start: prefix, end })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.as_slice() <= key && key < self.end.as_slice()
    }
}

// Both spaces number index ids ascending, so either ends at the next id.
fn index_end(order: SortOrder, table_id: u64, index_id: u64) -> Result<Vec<u8>, InternalError> {
    Ok(RowKey::index_floor(order, table_id, next_id(index_id)?).encode())
}

///
/// TESTS
///
