//! Top-level facade.
//!
//! A [`Store`] owns the metadata store, its cache and the counter locks, and
//! hands out [`Table`] handles. Every metadata mutation made through it
//! invalidates the cache entries it could stale.

#[cfg(test)]
mod tests;

use crate::{
    config::StoreConfig,
    error::InternalError,
    kv::KvStore,
    metadata::{Metadata, MetadataCache},
    schema::{ColumnSchema, IndexSchema, TableSchema},
    table::Table,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

///
/// Store
///

pub struct Store<K: KvStore> {
    kv: Arc<K>,
    metadata: Arc<Metadata<K>>,
    cache: MetadataCache<K>,
    config: StoreConfig,
    auto_inc_lock: RwLock<()>,
    row_count_lock: RwLock<()>,
}

impl<K: KvStore> Store<K> {
    /// Open a store over `kv` with the default configuration.
    #[must_use]
    pub fn new(kv: K) -> Self {
        Self::build(Arc::new(kv), StoreConfig::default())
    }

    pub fn with_config(kv: Arc<K>, config: StoreConfig) -> Result<Self, InternalError> {
        config.validate()?;

        Ok(Self::build(kv, config))
    }

    fn build(kv: Arc<K>, config: StoreConfig) -> Self {
        let metadata = Arc::new(Metadata::new(
            kv.clone(),
            config.scan_batch_size,
            config.metrics,
        ));
        let cache = MetadataCache::new(metadata.clone(), config.metrics);

        Self {
            kv,
            metadata,
            cache,
            config,
            auto_inc_lock: RwLock::new(()),
            row_count_lock: RwLock::new(()),
        }
    }

    #[must_use]
    pub fn kv(&self) -> &K {
        &self.kv
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Uncached catalog access, including the schema snapshot API.
    #[must_use]
    pub fn metadata(&self) -> &Metadata<K> {
        &self.metadata
    }

    #[must_use]
    pub const fn cache(&self) -> &MetadataCache<K> {
        &self.cache
    }

    ///
    /// TABLES
    ///

    pub fn create_table(&self, name: &str, schema: &TableSchema) -> Result<u64, InternalError> {
        let table_id = self.metadata.create_table(name, schema)?;
        self.cache.invalidate_table_id(name);

        Ok(table_id)
    }

    /// Drop every row and index entry of a table, then its metadata.
    pub fn delete_table(&self, name: &str) -> Result<(), InternalError> {
        let table = self.open_table(name)?;
        let table_id = table.id();
        let rows = table.delete_all_rows()?;

        self.metadata.delete_table(name)?;
        self.cache.invalidate_table_id(name);
        self.cache.invalidate_table(table_id);

        info!(table = name, table_id, rows, "dropped table");

        Ok(())
    }

    pub fn rename_table(&self, old: &str, new: &str) -> Result<(), InternalError> {
        self.metadata.rename_table(old, new)?;
        self.cache.invalidate_table_id(old);
        self.cache.invalidate_table_id(new);

        Ok(())
    }

    pub fn open_table(&self, name: &str) -> Result<Table<'_, K>, InternalError> {
        let table_id = self.cache.table_id(name)?;

        Ok(Table::new(&self.kv, &self.cache, &self.config, table_id))
    }

    pub fn get_schema(&self, name: &str) -> Result<Arc<TableSchema>, InternalError> {
        let table_id = self.cache.table_id(name)?;
        self.cache.schema(table_id)
    }

    ///
    /// SCHEMA CHANGES
    ///

    /// Register an index, then backfill it from existing rows. A failed
    /// backfill removes the entries written so far and the definition.
    pub fn add_index(&self, table: &str, index: IndexSchema) -> Result<u64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let name = index.name.clone();

        let index_id = self.metadata.create_table_index(table_id, index)?;
        self.cache.invalidate_schema(table_id);

        let table_handle = self.open_table(table)?;
        let rows = match table_handle.insert_table_index(&name) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(table, index = %name, index_id, error = %err, "backfill failed, removing index");
                let rollback = table_handle
                    .delete_index_entries(index_id)
                    .and_then(|_| self.metadata.delete_table_index(table_id, &name));
                self.cache.invalidate_schema(table_id);
                if let Err(rollback) = rollback {
                    warn!(table, index = %name, index_id, error = %rollback, "index rollback failed");
                }

                return Err(err);
            }
        };
        info!(table, index = %name, index_id, rows, "added index");

        Ok(index_id)
    }

    /// Remove an index's entries, then its definition.
    pub fn drop_index(&self, table: &str, index_name: &str) -> Result<(), InternalError> {
        let table_id = self.cache.table_id(table)?;

        self.open_table(table)?.delete_table_index(index_name)?;
        self.metadata.delete_table_index(table_id, index_name)?;
        self.cache.invalidate_schema(table_id);

        Ok(())
    }

    pub fn add_column(&self, table: &str, column: ColumnSchema) -> Result<u64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let column_id = self.metadata.add_column(table_id, column)?;
        self.cache.invalidate_schema(table_id);

        Ok(column_id)
    }

    /// Drop a column from the schema, then strip its cells from stored
    /// rows so a later column of the same name starts out NULL.
    ///
    /// Once the schema no longer declares the column no new write can carry
    /// it, so the rewrite only has to run over rows stored before the drop.
    pub fn drop_column(&self, table: &str, column: &str) -> Result<(), InternalError> {
        let table_id = self.cache.table_id(table)?;
        self.metadata.drop_column(table_id, column)?;
        self.cache.invalidate_schema(table_id);

        let rows = self.open_table(table)?.purge_column(column)?;
        info!(table, column, rows, "dropped column");

        Ok(())
    }

    ///
    /// AUTO INCREMENT
    ///

    pub fn get_auto_inc(&self, table: &str) -> Result<i64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.auto_inc_lock.read();

        self.cache.auto_inc(table_id)
    }

    /// Raise the counter to `value`; a lower value is ignored.
    pub fn set_auto_inc(&self, table: &str, value: i64) -> Result<(), InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.auto_inc_lock.write();

        if value > self.cache.auto_inc(table_id)? {
            self.metadata.set_auto_inc(table_id, value)?;
            self.cache.invalidate_auto_inc(table_id);
        }

        Ok(())
    }

    pub fn increment_auto_inc(&self, table: &str, delta: i64) -> Result<i64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.auto_inc_lock.write();

        let value = self.metadata.increment_auto_inc(table_id, delta)?;
        self.cache.update_auto_inc(table_id, value);

        Ok(value)
    }

    /// Reset the counter to 1.
    pub fn truncate_auto_inc(&self, table: &str) -> Result<(), InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.auto_inc_lock.write();

        self.metadata.set_auto_inc(table_id, 1)?;
        self.cache.invalidate_auto_inc(table_id);

        Ok(())
    }

    ///
    /// ROW COUNT
    ///

    pub fn get_row_count(&self, table: &str) -> Result<i64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.row_count_lock.read();

        self.cache.row_count(table_id)
    }

    pub fn increment_row_count(&self, table: &str, delta: i64) -> Result<i64, InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.row_count_lock.write();

        let value = self.metadata.increment_row_count(table_id, delta)?;
        self.cache.update_row_count(table_id, value);

        Ok(value)
    }

    pub fn truncate_row_count(&self, table: &str) -> Result<(), InternalError> {
        let table_id = self.cache.table_id(table)?;
        let _guard = self.row_count_lock.write();

        self.metadata.truncate_row_count(table_id)?;
        self.cache.invalidate_row_count(table_id);

        Ok(())
    }
}
