use crate::{
    error::{ErrorOrigin, InternalError},
    key::{RowKey, next_id},
    kv::{KvOp, KvScan, KvStore},
    metadata::{
        MAX_SCHEMA_BYTES, VALUE_QUALIFIER, decode_counter, decode_id, decode_name_map, encode_id,
        validate_name,
    },
    mutation::{SchemaSource, check_table_id},
    obs::sink::{self, MetricsEvent},
    schema::{ColumnSchema, IndexSchema, TableSchema},
    serialize::{deserialize, serialize},
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info, warn};

///
/// SchemaSnapshot
///
/// A schema as read, together with the exact blob it was decoded from. The
/// blob is the expected value of the compare-and-swap that writes the next
/// schema.
///

#[derive(Clone, Debug)]
pub struct SchemaSnapshot {
    pub table_id: u64,
    pub schema: TableSchema,
    blob: Vec<u8>,
}

///
/// Metadata
///
/// Authoritative, uncached catalog reads and writes.
///

pub struct Metadata<K: KvStore> {
    kv: Arc<K>,
    scan_batch_size: usize,
    metrics: bool,
}

impl<K: KvStore> Metadata<K> {
    #[must_use]
    pub const fn new(kv: Arc<K>, scan_batch_size: usize, metrics: bool) -> Self {
        Self {
            kv,
            scan_batch_size,
            metrics,
        }
    }

    #[must_use]
    pub fn kv(&self) -> &K {
        &self.kv
    }

    ///
    /// READS
    ///

    pub fn get_table_id(&self, name: &str) -> Result<u64, InternalError> {
        self.find_table_id(name)?
            .ok_or_else(|| InternalError::table_not_found(name))
    }

    pub fn find_table_id(&self, name: &str) -> Result<Option<u64>, InternalError> {
        validate_name("table", name)?;

        self.kv
            .get_cell(&RowKey::Tables.encode(), name.as_bytes())?
            .map(|bytes| decode_id(&bytes))
            .transpose()
    }

    /// Every table name with its id.
    pub fn get_tables(&self) -> Result<BTreeMap<String, u64>, InternalError> {
        match self.kv.get(&RowKey::Tables.encode())? {
            Some(qualifiers) => decode_name_map(&qualifiers),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn get_schema(&self, table_id: u64) -> Result<TableSchema, InternalError> {
        Ok(self.read_schema_snapshot(table_id)?.schema)
    }

    pub fn get_column_schema(
        &self,
        table_id: u64,
        column_id: u64,
    ) -> Result<ColumnSchema, InternalError> {
        check_table_id(table_id)?;
        let key = RowKey::Schema {
            table_id,
            column_id: Some(column_id),
        };
        let blob = self.kv.get_cell(&key.encode(), VALUE_QUALIFIER)?.ok_or_else(|| {
            InternalError::not_found(
                ErrorOrigin::Metadata,
                format!("no column id {column_id} in table id {table_id}"),
            )
        })?;

        Ok(deserialize(&blob, MAX_SCHEMA_BYTES)?)
    }

    pub fn get_column_ids(&self, table_id: u64) -> Result<BTreeMap<String, u64>, InternalError> {
        self.name_map(&RowKey::Columns { table_id })
    }

    pub fn get_index_ids(&self, table_id: u64) -> Result<BTreeMap<String, u64>, InternalError> {
        self.name_map(&RowKey::Indices { table_id })
    }

    pub fn read_schema_snapshot(&self, table_id: u64) -> Result<SchemaSnapshot, InternalError> {
        check_table_id(table_id)?;
        let key = RowKey::Schema {
            table_id,
            column_id: None,
        };
        let blob = self
            .kv
            .get_cell(&key.encode(), VALUE_QUALIFIER)?
            .ok_or_else(|| InternalError::table_id_not_found(table_id))?;
        let schema = deserialize(&blob, MAX_SCHEMA_BYTES)?;

        Ok(SchemaSnapshot {
            table_id,
            schema,
            blob,
        })
    }

    fn name_map(&self, key: &RowKey) -> Result<BTreeMap<String, u64>, InternalError> {
        let table_id = key.table_id().unwrap_or_default();
        check_table_id(table_id)?;

        let qualifiers = self
            .kv
            .get(&key.encode())?
            .ok_or_else(|| InternalError::table_id_not_found(table_id))?;

        decode_name_map(&qualifiers)
    }

    ///
    /// TABLES
    ///

    /// Allocate ids and write every catalog entry of a new table. The name
    /// is registered last, so a half-created table is never reachable.
    pub fn create_table(&self, name: &str, schema: &TableSchema) -> Result<u64, InternalError> {
        validate_name("table", name)?;
        schema.validate()?;
        if self.find_table_id(name)?.is_some() {
            return Err(table_exists(name));
        }

        let table_id = self.bump(&RowKey::Tables, 1)?;
        let column_ids = self.reserve(&RowKey::Columns { table_id }, schema.columns.len())?;
        let index_ids = self.reserve(&RowKey::Indices { table_id }, schema.indices.len())?;

        let mut ops = Vec::with_capacity(2 + 2 * schema.columns.len() + schema.indices.len());
        for (column, column_id) in schema.columns.iter().zip(column_ids) {
            ops.push(put_name(&RowKey::Columns { table_id }, &column.name, column_id));
            ops.push(KvOp::Put {
                key: RowKey::Schema {
                    table_id,
                    column_id: Some(column_id),
                }
                .encode(),
                qualifier: VALUE_QUALIFIER.to_vec(),
                value: serialize(column, MAX_SCHEMA_BYTES)?,
            });
        }
        for (index, index_id) in schema.indices.iter().zip(index_ids) {
            ops.push(put_name(&RowKey::Indices { table_id }, &index.name, index_id));
        }
        ops.push(KvOp::Put {
            key: RowKey::Schema {
                table_id,
                column_id: None,
            }
            .encode(),
            qualifier: VALUE_QUALIFIER.to_vec(),
            value: serialize(schema, MAX_SCHEMA_BYTES)?,
        });
        self.kv.apply(&ops)?;

        let registered = self.kv.compare_and_put(
            &RowKey::Tables.encode(),
            name.as_bytes(),
            None,
            &encode_id(table_id),
        )?;
        if !registered {
            warn!(table = name, table_id, "table name taken concurrently, removing catalog entries");
            self.remove_table_keys(table_id)?;
            return Err(table_exists(name));
        }

        info!(table = name, table_id, columns = schema.columns.len(), "created table");

        Ok(table_id)
    }

    /// Remove the name and every catalog key of a table. Data and index rows
    /// must already be gone.
    pub fn delete_table(&self, name: &str) -> Result<u64, InternalError> {
        let table_id = self.get_table_id(name)?;

        let removed = self.kv.compare_and_delete(
            &RowKey::Tables.encode(),
            name.as_bytes(),
            &encode_id(table_id),
        )?;
        if !removed {
            return Err(InternalError::conflict(
                ErrorOrigin::Metadata,
                format!("table '{name}' was renamed or dropped concurrently"),
            ));
        }
        self.remove_table_keys(table_id)?;

        info!(table = name, table_id, "deleted table metadata");

        Ok(table_id)
    }

    /// Move a table to a new name, keeping its id.
    pub fn rename_table(&self, old: &str, new: &str) -> Result<u64, InternalError> {
        validate_name("table", new)?;
        let table_id = self.get_table_id(old)?;
        if old == new {
            return Ok(table_id);
        }

        let tables = RowKey::Tables.encode();
        let id = encode_id(table_id);
        if !self
            .kv
            .compare_and_put(&tables, new.as_bytes(), None, &id)?
        {
            return Err(table_exists(new));
        }

        if !self.kv.compare_and_delete(&tables, old.as_bytes(), &id)? {
            warn!(old, new, table_id, "old table name changed during rename, rolling back");
            self.kv.compare_and_delete(&tables, new.as_bytes(), &id)?;
            return Err(InternalError::conflict(
                ErrorOrigin::Metadata,
                format!("table '{old}' was renamed or dropped concurrently"),
            ));
        }

        info!(old, new, table_id, "renamed table");

        Ok(table_id)
    }

    fn remove_table_keys(&self, table_id: u64) -> Result<(), InternalError> {
        let mut ops = vec![
            delete_key(RowKey::Columns { table_id }),
            delete_key(RowKey::Indices { table_id }),
            delete_key(RowKey::AutoInc { table_id }),
            delete_key(RowKey::RowCount { table_id }),
        ];

        let start = RowKey::Schema {
            table_id,
            column_id: None,
        }
        .encode();
        let end = RowKey::Schema {
            table_id: next_id(table_id)?,
            column_id: None,
        }
        .encode();
        for entry in KvScan::new(&*self.kv, start, end, self.scan_batch_size) {
            ops.push(KvOp::Delete {
                key: entry?.key,
                qualifier: None,
            });
        }

        self.kv.apply(&ops)?;

        Ok(())
    }

    ///
    /// SCHEMA CHANGES
    ///

    /// Add an index; returns its new id.
    pub fn create_table_index(
        &self,
        table_id: u64,
        index: IndexSchema,
    ) -> Result<u64, InternalError> {
        let snapshot = self.read_schema_snapshot(table_id)?;
        self.create_table_index_with_snapshot(&snapshot, index)
    }

    /// Add an index against a schema read earlier. Fails with a conflict if
    /// the stored schema no longer matches the snapshot.
    pub fn create_table_index_with_snapshot(
        &self,
        snapshot: &SchemaSnapshot,
        index: IndexSchema,
    ) -> Result<u64, InternalError> {
        let table_id = snapshot.table_id;
        let name = index.name.clone();
        let mut schema = snapshot.schema.clone();
        schema.add_index(index)?;

        let indices = RowKey::Indices { table_id }.encode();
        let index_id = self.bump(&RowKey::Indices { table_id }, 1)?;
        let id = encode_id(index_id);
        if !self
            .kv
            .compare_and_put(&indices, name.as_bytes(), None, &id)?
        {
            // Absent from the snapshot but present in the catalog.
            return Err(self.report_conflict(table_id));
        }

        if let Err(err) = self.swap_schema(snapshot, &schema) {
            self.kv.compare_and_delete(&indices, name.as_bytes(), &id)?;
            return Err(err);
        }

        info!(table_id, index = %name, index_id, "created index");

        Ok(index_id)
    }

    /// Remove an index definition; returns the id it had.
    pub fn delete_table_index(&self, table_id: u64, name: &str) -> Result<u64, InternalError> {
        let snapshot = self.read_schema_snapshot(table_id)?;
        self.delete_table_index_with_snapshot(&snapshot, name)
    }

    pub fn delete_table_index_with_snapshot(
        &self,
        snapshot: &SchemaSnapshot,
        name: &str,
    ) -> Result<u64, InternalError> {
        let table_id = snapshot.table_id;
        let index_id = *self
            .get_index_ids(table_id)?
            .get(name)
            .ok_or_else(|| InternalError::index_not_found(table_id, name))?;

        let mut schema = snapshot.schema.clone();
        schema.remove_index(name)?;
        self.swap_schema(snapshot, &schema)?;

        self.kv.delete(
            &RowKey::Indices { table_id }.encode(),
            Some(name.as_bytes()),
        )?;

        info!(table_id, index = name, index_id, "deleted index");

        Ok(index_id)
    }

    /// Add a column; returns its new id.
    pub fn add_column(&self, table_id: u64, column: ColumnSchema) -> Result<u64, InternalError> {
        let snapshot = self.read_schema_snapshot(table_id)?;
        self.add_column_with_snapshot(&snapshot, column)
    }

    pub fn add_column_with_snapshot(
        &self,
        snapshot: &SchemaSnapshot,
        column: ColumnSchema,
    ) -> Result<u64, InternalError> {
        let table_id = snapshot.table_id;
        let mut schema = snapshot.schema.clone();
        schema.add_column(column.clone())?;

        let columns = RowKey::Columns { table_id }.encode();
        let column_id = self.bump(&RowKey::Columns { table_id }, 1)?;
        let id = encode_id(column_id);
        let info_key = RowKey::Schema {
            table_id,
            column_id: Some(column_id),
        }
        .encode();

        if !self
            .kv
            .compare_and_put(&columns, column.name.as_bytes(), None, &id)?
        {
            return Err(self.report_conflict(table_id));
        }
        self.kv.put(
            &info_key,
            VALUE_QUALIFIER,
            &serialize(&column, MAX_SCHEMA_BYTES)?,
        )?;

        if let Err(err) = self.swap_schema(snapshot, &schema) {
            self.kv.delete(&info_key, None)?;
            self.kv
                .compare_and_delete(&columns, column.name.as_bytes(), &id)?;
            return Err(err);
        }

        info!(table_id, column = %column.name, column_id, "added column");

        Ok(column_id)
    }

    /// Drop a column no index references; returns the id it had.
    pub fn drop_column(&self, table_id: u64, name: &str) -> Result<u64, InternalError> {
        let snapshot = self.read_schema_snapshot(table_id)?;
        self.drop_column_with_snapshot(&snapshot, name)
    }

    pub fn drop_column_with_snapshot(
        &self,
        snapshot: &SchemaSnapshot,
        name: &str,
    ) -> Result<u64, InternalError> {
        let table_id = snapshot.table_id;
        let mut schema = snapshot.schema.clone();
        schema.remove_column(name)?;

        let column_id = *self.get_column_ids(table_id)?.get(name).ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Metadata,
                format!("column '{name}' of table id {table_id} has no id"),
            )
        })?;
        self.swap_schema(snapshot, &schema)?;

        self.kv.apply(&[
            KvOp::Delete {
                key: RowKey::Columns { table_id }.encode(),
                qualifier: Some(name.as_bytes().to_vec()),
            },
            delete_key(RowKey::Schema {
                table_id,
                column_id: Some(column_id),
            }),
        ])?;

        info!(table_id, column = name, column_id, "dropped column");

        Ok(column_id)
    }

    fn swap_schema(
        &self,
        snapshot: &SchemaSnapshot,
        schema: &TableSchema,
    ) -> Result<(), InternalError> {
        let table_id = snapshot.table_id;
        let blob = serialize(schema, MAX_SCHEMA_BYTES)?;
        let key = RowKey::Schema {
            table_id,
            column_id: None,
        }
        .encode();

        if self
            .kv
            .compare_and_put(&key, VALUE_QUALIFIER, Some(&snapshot.blob), &blob)?
        {
            return Ok(());
        }

        Err(self.report_conflict(table_id))
    }

    fn report_conflict(&self, table_id: u64) -> InternalError {
        sink::record_if(self.metrics, MetricsEvent::SchemaConflict { table_id });
        warn!(table_id, "schema changed since it was read");

        InternalError::schema_conflict(table_id)
    }

    ///
    /// COUNTERS
    ///

    pub fn get_auto_inc(&self, table_id: u64) -> Result<i64, InternalError> {
        self.read_counter(&RowKey::AutoInc { table_id })
    }

    pub fn increment_auto_inc(&self, table_id: u64, delta: i64) -> Result<i64, InternalError> {
        self.increment_counter(&RowKey::AutoInc { table_id }, delta)
    }

    pub fn set_auto_inc(&self, table_id: u64, value: i64) -> Result<(), InternalError> {
        check_table_id(table_id)?;
        self.kv.put(
            &RowKey::AutoInc { table_id }.encode(),
            VALUE_QUALIFIER,
            &value.to_be_bytes(),
        )?;

        Ok(())
    }

    pub fn get_row_count(&self, table_id: u64) -> Result<i64, InternalError> {
        self.read_counter(&RowKey::RowCount { table_id })
    }

    pub fn increment_row_count(&self, table_id: u64, delta: i64) -> Result<i64, InternalError> {
        self.increment_counter(&RowKey::RowCount { table_id }, delta)
    }

    pub fn truncate_row_count(&self, table_id: u64) -> Result<(), InternalError> {
        check_table_id(table_id)?;
        self.kv
            .delete(&RowKey::RowCount { table_id }.encode(), None)?;

        Ok(())
    }

    // Absent counters read as zero.
    fn read_counter(&self, key: &RowKey) -> Result<i64, InternalError> {
        check_table_id(key.table_id().unwrap_or_default())?;

        self.kv
            .get_cell(&key.encode(), VALUE_QUALIFIER)?
            .map_or(Ok(0), |bytes| decode_counter(&bytes))
    }

    fn increment_counter(&self, key: &RowKey, delta: i64) -> Result<i64, InternalError> {
        check_table_id(key.table_id().unwrap_or_default())?;
        let value = self.kv.increment(&key.encode(), VALUE_QUALIFIER, delta)?;
        debug!(key = ?key, delta, value, "incremented counter");

        Ok(value)
    }

    ///
    /// ID ALLOCATION
    ///

    // Advance an id counter by `count` and return the new top.
    fn bump(&self, key: &RowKey, count: usize) -> Result<u64, InternalError> {
        let delta = i64::try_from(count).map_err(|_| {
            InternalError::precondition(ErrorOrigin::Metadata, "id block is too large")
        })?;
        let top = self.kv.increment(&key.encode(), VALUE_QUALIFIER, delta)?;

        u64::try_from(top).map_err(|_| {
            InternalError::corruption(
                ErrorOrigin::Metadata,
                format!("id counter holds negative value {top}"),
            )
        })
    }

    // Reserve `count` ids; they are handed out ascending, ending at the new
    // top. A zero count still creates the counter cell.
    fn reserve(&self, key: &RowKey, count: usize) -> Result<Vec<u64>, InternalError> {
        let top = self.bump(key, count)?;
        let len = u64::try_from(count).unwrap_or(u64::MAX);
        let first = (top + 1).checked_sub(len).ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Metadata,
                format!("id counter at {top} is below the block of {count}"),
            )
        })?;

        Ok((first..=top).collect())
    }
}

impl<K: KvStore> SchemaSource for Metadata<K> {
    fn schema(&self, table_id: u64) -> Result<Arc<TableSchema>, InternalError> {
        self.get_schema(table_id).map(Arc::new)
    }

    fn index_ids(&self, table_id: u64) -> Result<Arc<BTreeMap<String, u64>>, InternalError> {
        self.get_index_ids(table_id).map(Arc::new)
    }
}

fn table_exists(name: &str) -> InternalError {
    InternalError::already_exists(ErrorOrigin::Metadata, format!("table '{name}' already exists"))
}

fn put_name(key: &RowKey, name: &str, id: u64) -> KvOp {
    KvOp::Put {
        key: key.encode(),
        qualifier: name.as_bytes().to_vec(),
        value: encode_id(id),
    }
}

fn delete_key(key: RowKey) -> KvOp {
    KvOp::Delete {
        key: key.encode(),
        qualifier: None,
    }
}
