//! Core runtime for CombDB: relational tables, rows and secondary indices
//! laid out over a single ordered key-value store.
//!
//! Layering, leaves first:
//! - `codec`: order-preserving byte encodings (varint, per-type values, text fields)
//! - `key`: the closed row-key model and the index row-key builder
//! - `mutation`: pure conversion of rows into KV put/delete operations
//! - `metadata`: id allocation, schema blobs, counters and the metadata cache
//! - `table`: scan-range construction and row-level operations
//! - `store`: the top-level facade tying the layers together

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod kv;
pub mod metadata;
pub mod mutation;
pub mod obs;
pub mod row;
pub mod schema;
pub mod serialize;
pub mod store;
pub mod table;

///
/// CONSTANTS
///

/// Maximum number of columns a table may declare.
pub const MAX_COLUMNS: usize = 4096;

/// Maximum number of member columns in one index.
pub const MAX_INDEX_COLUMNS: usize = 16;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        config::StoreConfig,
        error::{ErrorClass, ErrorOrigin, InternalError},
        kv::{KvStore, MemoryKv},
        row::{Row, RowId},
        schema::{ColumnSchema, ColumnType, IndexSchema, TableSchema},
        store::Store,
        table::{QueryKey, QueryType, Table},
    };
}
