//! Row-level operations and scans on one table.
//!
//! A [`Table`] is a cheap handle: it resolves ids and schema through the
//! metadata cache on every call and holds no state of its own.

mod query;
mod range;
mod scanner;


pub use query::{QueryKey, QueryType};
pub use range::ScanRange;
pub use scanner::Scanner;

use crate::{
    codec::SortOrder,
    config::StoreConfig,
    error::{ErrorOrigin, InternalError},
    key::{IndexRowKeyBuilder, RowKey},
    kv::{KvOp, KvScan, KvStore},
    metadata::MetadataCache,
    mutation::{MutationFactory, PAYLOAD_QUALIFIER},
    obs::sink::{self, MetricsEvent, ScanKind},
    row::{Row, RowId},
    schema::{IndexSchema, TableSchema},
};
use std::sync::Arc;
use tracing::debug;

///
/// Table
///

pub struct Table<'a, K: KvStore> {
    kv: &'a K,
    cache: &'a MetadataCache<K>,
    config: &'a StoreConfig,
    table_id: u64,
}

impl<'a, K: KvStore> Table<'a, K> {
    pub(crate) const fn new(
        kv: &'a K,
        cache: &'a MetadataCache<K>,
        config: &'a StoreConfig,
        table_id: u64,
    ) -> Self {
        Self {
            kv,
            cache,
            config,
            table_id,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.table_id
    }

    pub fn schema(&self) -> Result<Arc<TableSchema>, InternalError> {
        self.cache.schema(self.table_id)
    }

    ///
    /// ROWS
    ///

    pub fn insert_row(&self, row: &Row) -> Result<(), InternalError> {
        let ops = self.factory().insert(self.table_id, row)?;
        self.kv.apply(&ops)?;

        let index_puts = ops.len() as u64 - 1;
        self.record(MetricsEvent::RowsWritten {
            table_id: self.table_id,
            rows: 1,
        });
        self.record_index_delta(index_puts, 0);
        debug!(table_id = self.table_id, row_id = %row.id(), "inserted row");

        Ok(())
    }

    /// Replace `old` with `new`. `changed` names the indices whose member
    /// values differ; see [`changed_indices`](crate::mutation::changed_indices).
    pub fn update_row(&self, old: &Row, new: &Row, changed: &[&str]) -> Result<(), InternalError> {
        let ops = self.factory().update(self.table_id, old, new, changed)?;
        self.kv.apply(&ops)?;

        let removes = ops.iter().filter(|op| !op.is_put()).count() as u64;
        let puts = ops.len() as u64 - removes;
        self.record(MetricsEvent::RowsWritten {
            table_id: self.table_id,
            rows: 1,
        });
        self.record_index_delta(puts - 1, removes);
        debug!(table_id = self.table_id, row_id = %new.id(), changed = changed.len(), "updated row");

        Ok(())
    }

    /// Delete a row and its index entries; returns the deleted row.
    pub fn delete_row(&self, row_id: RowId) -> Result<Row, InternalError> {
        let row = self.get_row(row_id)?;
        let ops = self.factory().delete(self.table_id, &row)?;
        self.kv.apply(&ops)?;

        self.record(MetricsEvent::RowsDeleted {
            table_id: self.table_id,
            rows: 1,
        });
        self.record_index_delta(0, ops.len() as u64 - 1);
        debug!(table_id = self.table_id, row_id = %row_id, "deleted row");

        Ok(row)
    }

    pub fn get_row(&self, row_id: RowId) -> Result<Row, InternalError> {
        let key = RowKey::Data {
            table_id: self.table_id,
            row_id: Some(row_id),
        };
        let payload = self
            .kv
            .get_cell(&key.encode(), PAYLOAD_QUALIFIER)?
            .ok_or_else(|| InternalError::row_not_found(self.table_id, row_id))?;

        let schema = self.schema()?;
        let mut row = Row::from_payload(&payload, self.config.max_row_bytes)?;
        row.retain_columns(&schema);

        Ok(row)
    }

    /// Remove every data row and every index entry. Returns the number of
    /// data rows removed. Safe to re-run after a partial failure.
    ///
    /// Index entries are removed by table id rather than per known index,
    /// so entries of indices no longer in the catalog go too.
    pub fn delete_all_rows(&self) -> Result<u64, InternalError> {
        let rows = self.delete_range(&ScanRange::table(self.table_id)?)?;

        let mut removes = 0;
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            removes += self.delete_range(&ScanRange::table_indices(order, self.table_id)?)?;
        }

        self.record(MetricsEvent::RowsDeleted {
            table_id: self.table_id,
            rows,
        });
        self.record_index_delta(0, removes);
        debug!(table_id = self.table_id, rows, "deleted all rows");

        Ok(rows)
    }

    /// Rewrite every stored row that still carries a cell for `column`,
    /// which the schema must no longer declare. Index entries carry the same
    /// payload and are rewritten with it. Returns the number of rows
    /// rewritten.
    pub fn purge_column(&self, column: &str) -> Result<u64, InternalError> {
        let schema = self.schema()?;
        if schema.column(column).is_some() {
            return Err(InternalError::precondition(
                ErrorOrigin::Table,
                format!("column '{column}' is still declared"),
            ));
        }

        let factory = self.factory();
        let batch = self.config.scan_batch_size;
        let range = ScanRange::table(self.table_id)?;
        let mut ops = Vec::with_capacity(batch);
        let mut rows = 0;

        for entry in KvScan::new(self.kv, range.start, range.end, batch) {
            let entry = entry?;
            let Some(payload) = entry.value(PAYLOAD_QUALIFIER) else {
                continue;
            };
            let mut row = Row::from_payload(payload, self.config.max_row_bytes)?;
            if !row.records().contains_key(column) {
                continue;
            }

            row.retain_columns(&schema);
            ops.extend(factory.rewrite(self.table_id, &row)?);
            rows += 1;
            if ops.len() >= batch {
                self.kv.apply(&ops)?;
                ops.clear();
            }
        }
        self.kv.apply(&ops)?;

        debug!(table_id = self.table_id, column, rows, "purged column cells");

        Ok(rows)
    }

    /// Backfill both index spaces of `index_name` from the data rows.
    pub fn insert_table_index(&self, index_name: &str) -> Result<u64, InternalError> {
        let factory = self.factory();
        let batch = self.config.scan_batch_size;
        let mut ops = Vec::with_capacity(batch);
        let mut rows = 0;

        for row in self.table_scan()? {
            ops.extend(factory.insert_indices(self.table_id, &row?, &[index_name])?);
            rows += 1;
            if ops.len() >= batch {
                self.kv.apply(&ops)?;
                ops.clear();
            }
        }
        self.kv.apply(&ops)?;

        self.record_index_delta(rows * 2, 0);
        debug!(table_id = self.table_id, index = index_name, rows, "backfilled index");

        Ok(rows)
    }

    /// Remove every entry of both index spaces of `index_name`.
    pub fn delete_table_index(&self, index_name: &str) -> Result<u64, InternalError> {
        let (index_id, _) = self.resolve_index(index_name)?;

        self.delete_index_entries(index_id)
    }

    /// Remove every entry of both index spaces of one index id, whether or
    /// not the catalog still knows it.
    pub fn delete_index_entries(&self, index_id: u64) -> Result<u64, InternalError> {
        let mut removes = 0;
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            removes += self.delete_range(&ScanRange::index_full(order, self.table_id, index_id)?)?;
        }

        self.record_index_delta(0, removes);
        debug!(table_id = self.table_id, index_id, removes, "deleted index entries");

        Ok(removes)
    }

    /// Look for another row holding the same values in a unique index.
    ///
    /// A NULL member never conflicts, so rows with one are never duplicates.
    pub fn find_duplicate(&self, index_name: &str, row: &Row) -> Result<Option<RowId>, InternalError> {
        let (_, index) = self.resolve_index(index_name)?;
        if !index.unique {
            return Err(InternalError::precondition(
                ErrorOrigin::Table,
                format!("index '{index_name}' is not unique"),
            ));
        }
        if index.columns.iter().any(|column| row.get(column).is_none()) {
            return Ok(None);
        }

        let mut query = QueryKey::new(index_name, QueryType::ExactKey);
        for column in &index.columns {
            query.keys.insert(column.clone(), row.records().get(column).cloned().flatten());
        }

        for found in self.index_scan_exact(&query)? {
            let found = found?;
            if found.id() != row.id() {
                return Ok(Some(found.id()));
            }
        }

        Ok(None)
    }

    ///
    /// SCANS
    ///

    /// Every row in row id order.
    pub fn table_scan(&self) -> Result<Scanner<'a>, InternalError> {
        self.scanner(ScanKind::Table, ScanRange::table(self.table_id)?)
    }

    pub fn ascending_index_scan(&self, index_name: &str) -> Result<Scanner<'a>, InternalError> {
        self.full_index_scan(SortOrder::Ascending, index_name)
    }

    pub fn descending_index_scan(&self, index_name: &str) -> Result<Scanner<'a>, InternalError> {
        self.full_index_scan(SortOrder::Descending, index_name)
    }

    /// Rows at or after the key, ascending.
    pub fn ascending_index_scan_at(&self, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        self.at_scan(SortOrder::Ascending, key)
    }

    /// Rows at or before the key, descending.
    pub fn descending_index_scan_at(&self, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        self.at_scan(SortOrder::Descending, key)
    }

    /// Rows strictly after the key, ascending.
    pub fn ascending_index_scan_after(&self, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        self.exclusive_scan(SortOrder::Ascending, key)
    }

    /// Rows strictly before the key, descending.
    pub fn descending_index_scan_before(
        &self,
        key: &QueryKey,
    ) -> Result<Scanner<'a>, InternalError> {
        self.exclusive_scan(SortOrder::Descending, key)
    }

    /// Rows whose leading member values equal the key, in row id order.
    pub fn index_scan_exact(&self, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        let (index_id, prefix) = self.query_prefix(SortOrder::Ascending, key)?;
        let range = ScanRange::index_exact(SortOrder::Ascending, self.table_id, index_id, prefix)?;

        self.scanner(ScanKind::IndexExact, range)
    }

    /// Dispatch on the query type.
    pub fn scan(&self, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        match key.query_type {
            QueryType::ExactKey => self.index_scan_exact(key),
            QueryType::AfterKey => self.ascending_index_scan_after(key),
            QueryType::KeyOrNext => self.ascending_index_scan_at(key),
            QueryType::KeyOrPrevious => self.descending_index_scan_at(key),
            QueryType::BeforeKey => self.descending_index_scan_before(key),
            QueryType::IndexFirst => self.ascending_index_scan(&key.index_name),
            QueryType::IndexLast => self.descending_index_scan(&key.index_name),
        }
    }

    ///
    /// INTERNALS
    ///

    fn factory(&self) -> MutationFactory<'a, MetadataCache<K>> {
        MutationFactory::new(self.cache, self.config.max_row_bytes)
    }

    fn full_index_scan(
        &self,
        order: SortOrder,
        index_name: &str,
    ) -> Result<Scanner<'a>, InternalError> {
        let (index_id, _) = self.resolve_index(index_name)?;
        let range = ScanRange::index_full(order, self.table_id, index_id)?;

        self.scanner(ScanKind::IndexFull, range)
    }

    fn at_scan(&self, order: SortOrder, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        let (index_id, prefix) = self.query_prefix(order, key)?;
        let range = ScanRange::index_at(order, self.table_id, index_id, prefix)?;

        self.scanner(ScanKind::IndexAt, range)
    }

    fn exclusive_scan(&self, order: SortOrder, key: &QueryKey) -> Result<Scanner<'a>, InternalError> {
        let (index_id, prefix) = self.query_prefix(order, key)?;
        let range = ScanRange::index_after(order, self.table_id, index_id, &prefix)?;

        self.scanner(ScanKind::IndexExclusive, range)
    }

    fn scanner(&self, kind: ScanKind, range: ScanRange) -> Result<Scanner<'a>, InternalError> {
        let schema = self.schema()?;
        self.record(MetricsEvent::Scan { kind });
        debug!(table_id = self.table_id, ?kind, "scan");

        let inner = KvScan::new(self.kv, range.start, range.end, self.config.scan_batch_size);

        Ok(Scanner::new(
            inner,
            schema,
            self.table_id,
            self.config.max_row_bytes,
            self.config.metrics,
        ))
    }

    fn resolve_index(&self, index_name: &str) -> Result<(u64, IndexSchema), InternalError> {
        let schema = self.schema()?;
        let index = schema
            .index(index_name)
            .ok_or_else(|| InternalError::index_not_found(self.table_id, index_name))?;
        let index_id = *self
            .cache
            .index_ids(self.table_id)?
            .get(index_name)
            .ok_or_else(|| InternalError::index_not_found(self.table_id, index_name))?;

        Ok((index_id, index.clone()))
    }

    fn query_prefix(&self, order: SortOrder, key: &QueryKey) -> Result<(u64, Vec<u8>), InternalError> {
        let (index_id, index) = self.resolve_index(&key.index_name)?;
        let schema = self.schema()?;
        let prefix = IndexRowKeyBuilder::new(self.table_id, index_id)
            .with_order(order)
            .with_query(&key.keys, &index, &schema)
            .build()?
            .encode();

        Ok((index_id, prefix))
    }

    // Stream the range and delete it in bounded batches.
    fn delete_range(&self, range: &ScanRange) -> Result<u64, InternalError> {
        let batch = self.config.scan_batch_size;
        let mut ops = Vec::with_capacity(batch);
        let mut deleted = 0;

        let scan = KvScan::new(self.kv, range.start.clone(), range.end.clone(), batch);
        for entry in scan {
            ops.push(KvOp::Delete {
                key: entry?.key,
                qualifier: None,
            });
            deleted += 1;
            if ops.len() >= batch {
                self.kv.apply(&ops)?;
                ops.clear();
            }
        }
        self.kv.apply(&ops)?;

        Ok(deleted)
    }

    fn record(&self, event: MetricsEvent) {
        sink::record_if(self.config.metrics, event);
    }

    fn record_index_delta(&self, inserts: u64, removes: u64) {
        if inserts > 0 || removes > 0 {
            self.record(MetricsEvent::IndexDelta {
                table_id: self.table_id,
                inserts,
                removes,
            });
        }
    }
}
