//! Table, column and index schema types.
//!
//! Schemas are plain data; the metadata store persists them as CBOR blobs
//! and compares blobs byte-for-byte when updating them.

mod column;
mod index;
mod table;

pub use column::{ColumnSchema, ColumnType};
pub use index::IndexSchema;
pub use table::TableSchema;

use crate::error::{ErrorOrigin, InternalError};
use thiserror::Error as ThisError;

///
/// SchemaError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("{what} name must not be empty")]
    EmptyName { what: &'static str },

    #[error("table must declare at least one column")]
    NoColumns,

    #[error("table declares {count} columns, limit is {max}")]
    TooManyColumns { count: usize, max: usize },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{0}' not found")]
    UnknownColumn(String),

    #[error("column '{column}' of type {kind} requires a max length")]
    MissingMaxLength { column: String, kind: &'static str },

    #[error("column '{column}' of type {kind} does not take a max length")]
    UnexpectedMaxLength { column: String, kind: &'static str },

    #[error("column '{column}' has invalid decimal({precision}, {scale})")]
    InvalidDecimal {
        column: String,
        precision: u8,
        scale: u8,
    },

    #[error("column '{column}' of type {kind} cannot auto-increment")]
    AutoIncrementUnsupported { column: String, kind: &'static str },

    #[error("at most one auto-increment column is allowed")]
    MultipleAutoIncrement,

    #[error("duplicate index '{0}'")]
    DuplicateIndex(String),

    #[error("index '{0}' not found")]
    UnknownIndex(String),

    #[error("index '{index}' must list between 1 and {max} columns")]
    IndexWidth { index: String, max: usize },

    #[error("index '{index}' lists column '{column}' more than once")]
    DuplicateIndexColumn { index: String, column: String },

    #[error("index '{index}' references unknown column '{column}'")]
    IndexUnknownColumn { index: String, column: String },

    #[error("column '{column}' is still referenced by index '{index}'")]
    ColumnIndexed { column: String, index: String },
}

impl From<SchemaError> for InternalError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownColumn(_) | SchemaError::UnknownIndex(_) => {
                Self::not_found(ErrorOrigin::Metadata, err.to_string())
            }
            SchemaError::DuplicateColumn(_) | SchemaError::DuplicateIndex(_) => {
                Self::already_exists(ErrorOrigin::Metadata, err.to_string())
            }
            _ => Self::precondition(ErrorOrigin::Metadata, err.to_string()),
        }
    }
}
