//! CombDB: relational tables, rows and secondary indices over a sorted
//! key-value store.
//!
//! ## Crate layout
//! - `core`: codecs, row keys, metadata, tables and the [`Store`](core::store::Store) facade.
//! - `primitives`: column kind registry shared by the schema and codec layers.
//! - `error`: the public error type returned across the crate boundary.
//!
//! The `prelude` module carries everything needed to create a store, define
//! tables and read and write rows.

pub use combdb_core as core;
pub use combdb_primitives as primitives;

pub mod error;

pub use error::{Error, ErrorKind, ErrorOrigin};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result alias over the public [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        Error, ErrorKind, Result,
        core::{
            config::StoreConfig,
            kv::{KvStore, MemoryKv},
            row::{Row, RowId},
            schema::{ColumnSchema, ColumnType, IndexSchema, TableSchema},
            store::Store,
            table::{QueryKey, QueryType, Scanner, Table},
        },
    };
}
