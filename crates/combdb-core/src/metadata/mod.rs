//! Table catalog: ids, schema blobs and per-table counters.
//!
//! Layout in the KV store:
//! - `Tables`: one qualifier per table name holding its id, plus the global
//!   table id counter under the empty qualifier
//! - `Columns(t)` / `Indices(t)`: name → id qualifiers, plus the per-table id
//!   counter under the empty qualifier
//! - `Schema(t)`: the CBOR table schema; `Schema(t, c)`: one column's schema
//! - `AutoInc(t)` / `RowCount(t)`: 8-byte counters
//!
//! Names are never empty, so the empty qualifier cannot collide with one.

mod cache;
mod store;


pub use cache::MetadataCache;
pub use store::{Metadata, SchemaSnapshot};

use crate::{
    codec::varint,
    error::{ErrorOrigin, InternalError},
    kv::Qualifiers,
};
use std::collections::BTreeMap;

/// Qualifier for counters and blobs.
pub const VALUE_QUALIFIER: &[u8] = b"";

/// Upper bound for one serialized schema blob.
pub const MAX_SCHEMA_BYTES: usize = 1024 * 1024;

fn encode_id(id: u64) -> Vec<u8> {
    varint::encode(id)
}

fn decode_id(bytes: &[u8]) -> Result<u64, InternalError> {
    Ok(varint::decode_exact(bytes)?)
}

fn decode_counter(bytes: &[u8]) -> Result<i64, InternalError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        InternalError::corruption(
            ErrorOrigin::Metadata,
            format!("counter cell holds {} bytes, expected 8", bytes.len()),
        )
    })?;

    Ok(i64::from_be_bytes(raw))
}

fn validate_name(what: &str, name: &str) -> Result<(), InternalError> {
    if name.is_empty() {
        return Err(InternalError::precondition(
            ErrorOrigin::Metadata,
            format!("{what} name must not be empty"),
        ));
    }

    Ok(())
}

// Decode a name → id map, skipping the counter qualifier.
fn decode_name_map(qualifiers: &Qualifiers) -> Result<BTreeMap<String, u64>, InternalError> {
    qualifiers
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, id)| {
            let name = String::from_utf8(name.clone()).map_err(|_| {
                InternalError::corruption(ErrorOrigin::Metadata, "catalog name is not UTF-8")
            })?;

            Ok((name, decode_id(id)?))
        })
        .collect()
}
