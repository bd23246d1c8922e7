//! Row → KV operation planning.
//!
//! Nothing in here performs I/O beyond schema reads through [`SchemaSource`].
//! Every key and payload of a mutation is computed before any operation is
//! returned, so a failure leaves nothing half-planned.

use crate::{
    codec::{SortOrder, encode_value},
    error::{ErrorOrigin, InternalError},
    key::{IndexRowKeyBuilder, RowKey},
    kv::KvOp,
    row::{Row, RowId},
    schema::{IndexSchema, TableSchema},
};
use std::{collections::BTreeMap, sync::Arc};

/// Qualifier holding the row payload on data and index entries.
pub const PAYLOAD_QUALIFIER: &[u8] = b"";

///
/// SchemaSource
///
/// Read access to the schema and index ids of a table. Implemented by the
/// metadata store and by the metadata cache in front of it.
///

pub trait SchemaSource {
    fn schema(&self, table_id: u64) -> Result<Arc<TableSchema>, InternalError>;

    fn index_ids(&self, table_id: u64) -> Result<Arc<BTreeMap<String, u64>>, InternalError>;
}

///
/// MutationFactory
///

pub struct MutationFactory<'a, S: SchemaSource + ?Sized> {
    source: &'a S,
    max_row_bytes: usize,
}

impl<'a, S: SchemaSource + ?Sized> MutationFactory<'a, S> {
    #[must_use]
    pub const fn new(source: &'a S, max_row_bytes: usize) -> Self {
        Self {
            source,
            max_row_bytes,
        }
    }

    /// Data put plus both index puts for every index of the table.
    pub fn insert(&self, table_id: u64, row: &Row) -> Result<Vec<KvOp>, InternalError> {
        let ctx = self.context(table_id, row)?;
        validate_row(&ctx.schema, row)?;

        self.put_all(&ctx, row)
    }

    /// Same ops as [`Self::insert`] for a row that is already stored, without
    /// validating it against the current schema. Rows written before a
    /// column was added may not satisfy it.
    pub fn rewrite(&self, table_id: u64, row: &Row) -> Result<Vec<KvOp>, InternalError> {
        let ctx = self.context(table_id, row)?;

        self.put_all(&ctx, row)
    }

    /// Both index puts for the named indices only. Used by backfill.
    pub fn insert_indices(
        &self,
        table_id: u64,
        row: &Row,
        names: &[&str],
    ) -> Result<Vec<KvOp>, InternalError> {
        let ctx = self.context(table_id, row)?;
        let indices = ctx.select(names)?;
        let payload = row.to_payload(self.max_row_bytes)?;

        Ok(ctx
            .index_keys(row, &indices)?
            .into_iter()
            .map(|key| put(key, payload.clone()))
            .collect())
    }

    /// Both index deletes for the named indices, from the row image as it is
    /// currently stored.
    pub fn delete_indices(
        &self,
        table_id: u64,
        row: &Row,
        names: &[&str],
    ) -> Result<Vec<KvOp>, InternalError> {
        let ctx = self.context(table_id, row)?;
        let indices = ctx.select(names)?;

        Ok(ctx
            .index_keys(row, &indices)?
            .into_iter()
            .map(delete)
            .collect())
    }

    /// Every index delete plus the data row delete.
    pub fn delete(&self, table_id: u64, row: &Row) -> Result<Vec<KvOp>, InternalError> {
        let ctx = self.context(table_id, row)?;
        let indices: Vec<&IndexSchema> = ctx.schema.indices.iter().collect();

        let mut ops: Vec<KvOp> = ctx
            .index_keys(row, &indices)?
            .into_iter()
            .map(delete)
            .collect();
        ops.push(delete(
            RowKey::Data {
                table_id,
                row_id: Some(row.id()),
            }
            .encode(),
        ));

        Ok(ops)
    }

    /// Deletes computed from `old`, then the full insert of `new`.
    ///
    /// Only the indices in `changed` lose their old entries; the others are
    /// overwritten in place by the insert, since their keys are unchanged.
    pub fn update(
        &self,
        table_id: u64,
        old: &Row,
        new: &Row,
        changed: &[&str],
    ) -> Result<Vec<KvOp>, InternalError> {
        if old.id() != new.id() {
            return Err(InternalError::precondition(
                ErrorOrigin::Mutation,
                format!("update changes row id from {} to {}", old.id(), new.id()),
            ));
        }

        let mut ops = self.delete_indices(table_id, old, changed)?;
        ops.extend(self.insert(table_id, new)?);

        Ok(ops)
    }

    fn put_all(&self, ctx: &Context, row: &Row) -> Result<Vec<KvOp>, InternalError> {
        let payload = row.to_payload(self.max_row_bytes)?;
        let mut ops = Vec::with_capacity(1 + 2 * ctx.schema.indices.len());
        ops.push(put(
            RowKey::Data {
                table_id: ctx.table_id,
                row_id: Some(row.id()),
            }
            .encode(),
            payload.clone(),
        ));

        let indices: Vec<&IndexSchema> = ctx.schema.indices.iter().collect();
        for key in ctx.index_keys(row, &indices)? {
            ops.push(put(key, payload.clone()));
        }

        Ok(ops)
    }

    fn context(&self, table_id: u64, row: &Row) -> Result<Context, InternalError> {
        check_table_id(table_id)?;
        check_row_id(row.id())?;

        Ok(Context {
            table_id,
            schema: self.source.schema(table_id)?,
            index_ids: self.source.index_ids(table_id)?,
        })
    }
}

// Schema snapshot for one planning call.
struct Context {
    table_id: u64,
    schema: Arc<TableSchema>,
    index_ids: Arc<BTreeMap<String, u64>>,
}

impl Context {
    fn select(&self, names: &[&str]) -> Result<Vec<&IndexSchema>, InternalError> {
        names
            .iter()
            .map(|name| {
                self.schema
                    .index(name)
                    .ok_or_else(|| InternalError::index_not_found(self.table_id, name))
            })
            .collect()
    }

    // Ascending then descending key for each index, in index order.
    fn index_keys(&self, row: &Row, indices: &[&IndexSchema]) -> Result<Vec<Vec<u8>>, InternalError> {
        let mut keys = Vec::with_capacity(indices.len() * 2);
        for index in indices {
            let index_id = *self
                .index_ids
                .get(&index.name)
                .ok_or_else(|| InternalError::index_not_found(self.table_id, &index.name))?;
            let base = IndexRowKeyBuilder::new(self.table_id, index_id)
                .with_row_id(row.id())
                .with_row(row.records(), index, &self.schema);

            for order in [SortOrder::Ascending, SortOrder::Descending] {
                keys.push(base.clone().with_order(order).build()?.encode());
            }
        }

        Ok(keys)
    }
}

/// Reject a row that does not fit the schema.
///
/// Unknown columns are a caller error; a NULL in a not-null column and a
/// value that cannot be encoded are domain errors.
pub fn validate_row(schema: &TableSchema, row: &Row) -> Result<(), InternalError> {
    for name in row.records().keys() {
        if schema.column(name).is_none() {
            return Err(InternalError::precondition(
                ErrorOrigin::Mutation,
                format!("row {} sets unknown column '{name}'", row.id()),
            ));
        }
    }

    for column in &schema.columns {
        match row.get(&column.name) {
            Some(cell) => {
                encode_value(column, cell, SortOrder::Ascending)?;
            }
            None if !column.nullable => {
                return Err(InternalError::domain(
                    ErrorOrigin::Mutation,
                    format!("column '{}' is not nullable", column.name),
                ));
            }
            None => {}
        }
    }

    Ok(())
}

/// Names of the indices whose member values differ between two row images.
#[must_use]
pub fn changed_indices(schema: &TableSchema, old: &Row, new: &Row) -> Vec<String> {
    schema
        .indices
        .iter()
        .filter(|index| {
            index
                .columns
                .iter()
                .any(|column| old.get(column) != new.get(column))
        })
        .map(|index| index.name.clone())
        .collect()
}

/// Table ids are dispensed from 1; zero never names a table.
pub(crate) fn check_table_id(table_id: u64) -> Result<(), InternalError> {
    if table_id == 0 {
        return Err(InternalError::precondition(
            ErrorOrigin::Mutation,
            "table id 0 is not valid",
        ));
    }

    Ok(())
}

pub(crate) fn check_row_id(row_id: RowId) -> Result<(), InternalError> {
    if row_id.is_nil() {
        return Err(InternalError::precondition(
            ErrorOrigin::Mutation,
            "row id must not be nil",
        ));
    }

    Ok(())
}

fn put(key: Vec<u8>, value: Vec<u8>) -> KvOp {
    KvOp::Put {
        key,
        qualifier: PAYLOAD_QUALIFIER.to_vec(),
        value,
    }
}

const fn delete(key: Vec<u8>) -> KvOp {
    KvOp::Delete {
        key,
        qualifier: None,
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorClass,
        schema::{ColumnSchema, ColumnType},
    };

    struct FixedSource {
        schema: Arc<TableSchema>,
        index_ids: Arc<BTreeMap<String, u64>>,
    }

    impl FixedSource {
        fn new(schema: TableSchema) -> Self {
            let index_ids = schema
                .indices
                .iter()
                .zip(1u64..)
                .map(|(index, id)| (index.name.clone(), id))
                .collect();

            Self {
                schema: Arc::new(schema),
                index_ids: Arc::new(index_ids),
            }
        }
    }

    impl SchemaSource for FixedSource {
        fn schema(&self, table_id: u64) -> Result<Arc<TableSchema>, InternalError> {
            if table_id == 1 {
                Ok(self.schema.clone())
            } else {
                Err(InternalError::table_id_not_found(table_id))
            }
        }

        fn index_ids(&self, table_id: u64) -> Result<Arc<BTreeMap<String, u64>>, InternalError> {
            if table_id == 1 {
                Ok(self.index_ids.clone())
            } else {
                Err(InternalError::table_id_not_found(table_id))
            }
        }
    }

    fn source() -> FixedSource {
        FixedSource::new(
            TableSchema::new(vec![
                ColumnSchema::new("a", ColumnType::SignedInt),
                ColumnSchema::new("b", ColumnType::String).with_max_length(8),
                ColumnSchema::new("c", ColumnType::UnsignedInt).not_null(),
            ])
            .with_index(IndexSchema::new("by_a", ["a"]))
            .with_index(IndexSchema::new("by_b", ["b"]))
            .with_index(IndexSchema::new("by_a_b", ["a", "b"])),
        )
    }

    fn row(id: u128, a: i64, b: &str) -> Row {
        Row::new(RowId::from_u128(id))
            .with("a", a.to_be_bytes())
            .with("b", b.as_bytes())
            .with("c", 1u64.to_be_bytes())
    }

    #[test]
    fn insert_writes_data_plus_two_entries_per_index() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);

        let ops = factory.insert(1, &row(7, -5, "foo")).expect("insert");

        assert_eq!(ops.len(), 1 + 2 * 3);
        assert!(ops.iter().all(KvOp::is_put));
        let payloads: Vec<_> = ops
            .iter()
            .map(|op| match op {
                KvOp::Put { value, .. } => value.clone(),
                KvOp::Delete { .. } => unreachable!(),
            })
            .collect();
        assert!(payloads.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn rewrite_skips_validation_of_stored_rows() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);
        let stored = Row::new(RowId::from_u128(7))
            .with("a", 1i64.to_be_bytes())
            .with("b", b"foo".as_slice());

        assert!(factory.insert(1, &stored).is_err());
        let ops = factory.rewrite(1, &stored).expect("rewrite");
        assert_eq!(ops.len(), 1 + 2 * 3);
        assert!(ops.iter().all(KvOp::is_put));
    }

    #[test]
    fn delete_targets_exactly_the_inserted_keys() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);
        let row = row(7, -5, "foo");

        let mut puts: Vec<_> = factory
            .insert(1, &row)
            .expect("insert")
            .iter()
            .map(|op| op.key().to_vec())
            .collect();
        let mut deletes: Vec<_> = factory
            .delete(1, &row)
            .expect("delete")
            .iter()
            .inspect(|op| assert!(!op.is_put()))
            .map(|op| op.key().to_vec())
            .collect();
        puts.sort();
        deletes.sort();

        assert_eq!(puts, deletes);
    }

    #[test]
    fn update_deletes_old_keys_of_changed_indices_only() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);
        let old = row(7, -5, "foo");
        let new = row(7, -5, "bar");

        let changed = changed_indices(&source.schema, &old, &new);
        assert_eq!(changed, vec!["by_b".to_string(), "by_a_b".to_string()]);

        let changed: Vec<&str> = changed.iter().map(String::as_str).collect();
        let ops = factory.update(1, &old, &new, &changed).expect("update");
        let old_keys: Vec<_> = factory
            .delete_indices(1, &old, &changed)
            .expect("deletes")
            .iter()
            .map(|op| op.key().to_vec())
            .collect();

        assert_eq!(ops.len(), 2 * 2 + 1 + 2 * 3);
        assert!(ops[..4].iter().all(|op| !op.is_put()));
        assert!(ops[4..].iter().all(KvOp::is_put));
        // Deletes come from the old image and never collide with new puts.
        for op in &ops[4..] {
            assert!(!old_keys.contains(&op.key().to_vec()));
        }
    }

    #[test]
    fn nil_row_id_and_zero_table_id_are_preconditions() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);

        let nil = Row::new(RowId::NIL).with("c", 1u64.to_be_bytes());
        assert_eq!(
            factory.insert(1, &nil).expect_err("nil").class,
            ErrorClass::Precondition
        );
        assert_eq!(
            factory.insert(0, &row(1, 1, "x")).expect_err("zero").class,
            ErrorClass::Precondition
        );
    }

    #[test]
    fn unknown_table_is_not_found() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);

        let err = factory.insert(9, &row(1, 1, "x")).expect_err("unknown");
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_rows_are_rejected_before_planning() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);

        let unknown = row(1, 1, "x").with("zzz", vec![1]);
        assert_eq!(
            factory.insert(1, &unknown).expect_err("unknown").class,
            ErrorClass::Precondition
        );

        let missing = Row::new(RowId::from_u128(1)).with("a", 1i64.to_be_bytes());
        assert_eq!(
            factory.insert(1, &missing).expect_err("not null").class,
            ErrorClass::Domain
        );

        let too_long = row(1, 1, "much too long");
        assert_eq!(
            factory.insert(1, &too_long).expect_err("too long").class,
            ErrorClass::Domain
        );
    }

    #[test]
    fn oversized_payload_is_a_domain_error() {
        let source = source();
        let factory = MutationFactory::new(&source, 16);

        let err = factory.insert(1, &row(1, 1, "x")).expect_err("too large");
        assert_eq!(err.class, ErrorClass::Domain);
    }

    #[test]
    fn unknown_index_in_subset_is_not_found() {
        let source = source();
        let factory = MutationFactory::new(&source, 4096);

        let err = factory
            .insert_indices(1, &row(1, 1, "x"), &["nope"])
            .expect_err("unknown index");
        assert!(err.is_not_found());
    }
}
