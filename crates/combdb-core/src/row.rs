//! Rows and row ids.
//!
//! A row is a map from column name to an optional cell. A name mapped to
//! `None` is an explicit NULL; a name that is absent is also NULL but is not
//! written to the payload.

use crate::{
    error::{ErrorOrigin, InternalError},
    schema::TableSchema,
    serialize::{self, SerializeError},
};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::BTreeMap;
use ulid::Ulid;

/// Width of an encoded row id.
pub const ROW_ID_LEN: usize = 16;

/// Column name → optional cell.
pub type Records = BTreeMap<String, Option<Vec<u8>>>;

///
/// RowId
///
/// 128-bit row identifier, generated by the caller. The all-zero id is
/// reserved as a scan floor and is never stored.
///

#[derive(Clone, Copy, Debug, Deref, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowId(Ulid);

impl RowId {
    pub const NIL: Self = Self(Ulid::nil());

    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Ulid(value))
    }

    #[must_use]
    pub const fn to_u128(self) -> u128 {
        self.0.0
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; ROW_ID_LEN] {
        self.0.0.to_be_bytes()
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; ROW_ID_LEN]) -> Self {
        Self(Ulid(u128::from_be_bytes(bytes)))
    }

    /// Decode from a slice that must be exactly [`ROW_ID_LEN`] bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self::from_bytes)
    }

    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0.0 == 0
    }
}

impl From<Ulid> for RowId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

///
/// Row
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row {
    id: RowId,
    records: Records,
}

impl Row {
    #[must_use]
    pub const fn new(id: RowId) -> Self {
        Self {
            id,
            records: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn from_records(id: RowId, records: Records) -> Self {
        Self { id, records }
    }

    /// Builder-style setter for a present value.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Vec<u8>>) -> Self {
        self.set(column, cell);
        self
    }

    /// Builder-style setter for an explicit NULL.
    #[must_use]
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.records.insert(column.into(), None);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, cell: impl Into<Vec<u8>>) {
        self.records.insert(column.into(), Some(cell.into()));
    }

    #[must_use]
    pub const fn id(&self) -> RowId {
        self.id
    }

    #[must_use]
    pub const fn records(&self) -> &Records {
        &self.records
    }

    /// Return the cell for `column`; `None` for NULL or absent.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&[u8]> {
        self.records.get(column).and_then(Option::as_deref)
    }

    /// Drop cells for columns `schema` no longer declares.
    pub fn retain_columns(&mut self, schema: &TableSchema) {
        self.records.retain(|name, _| schema.column(name).is_some());
    }

    /// Serialize into the payload stored on data and index entries.
    pub fn to_payload(&self, max_bytes: usize) -> Result<Vec<u8>, SerializeError> {
        let payload = RowPayload {
            id: ByteBuf::from(self.id.to_bytes().to_vec()),
            records: self
                .records
                .iter()
                .map(|(name, cell)| (name.clone(), cell.clone().map(ByteBuf::from)))
                .collect(),
        };

        serialize::serialize(&payload, max_bytes)
    }

    /// Inverse of [`Row::to_payload`].
    pub fn from_payload(bytes: &[u8], max_bytes: usize) -> Result<Self, InternalError> {
        let payload: RowPayload = serialize::deserialize(bytes, max_bytes)?;
        let id = RowId::try_from_slice(&payload.id).ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Serialize,
                format!("row payload id is {} bytes", payload.id.len()),
            )
        })?;

        let records = payload
            .records
            .into_iter()
            .map(|(name, cell)| (name, cell.map(ByteBuf::into_vec)))
            .collect();

        Ok(Self { id, records })
    }
}

// Wire form of a row payload.
#[derive(Deserialize, Serialize)]
struct RowPayload {
    id: ByteBuf,
    records: BTreeMap<String, Option<ByteBuf>>,
}

///
/// TESTS
///
