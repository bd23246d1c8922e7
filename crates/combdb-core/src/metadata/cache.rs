use crate::{
    error::InternalError,
    kv::KvStore,
    metadata::Metadata,
    mutation::SchemaSource,
    obs::sink::{self, CacheKind, MetricsEvent},
    schema::TableSchema,
};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

type IdMap = Arc<BTreeMap<String, u64>>;

///
/// MetadataCache
///
/// Read-through, write-invalidate cache in front of [`Metadata`]. One cache
/// exists per store. A load that raced an invalidation is returned to its
/// caller but not kept. Invalidation bumps the generation before taking the
/// map lock, and loads compare it while holding that lock.
///

pub struct MetadataCache<K: KvStore> {
    metadata: Arc<Metadata<K>>,
    metrics: bool,
    generation: AtomicU64,
    table_ids: RwLock<BTreeMap<String, u64>>,
    schemas: RwLock<BTreeMap<u64, Arc<TableSchema>>>,
    column_ids: RwLock<BTreeMap<u64, IdMap>>,
    index_ids: RwLock<BTreeMap<u64, IdMap>>,
    auto_inc: RwLock<BTreeMap<u64, i64>>,
    row_counts: RwLock<BTreeMap<u64, i64>>,
}

impl<K: KvStore> MetadataCache<K> {
    #[must_use]
    pub fn new(metadata: Arc<Metadata<K>>, metrics: bool) -> Self {
        Self {
            metadata,
            metrics,
            generation: AtomicU64::new(0),
            table_ids: RwLock::default(),
            schemas: RwLock::default(),
            column_ids: RwLock::default(),
            index_ids: RwLock::default(),
            auto_inc: RwLock::default(),
            row_counts: RwLock::default(),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata<K> {
        &self.metadata
    }

    ///
    /// READS
    ///

    pub fn table_id(&self, name: &str) -> Result<u64, InternalError> {
        if let Some(id) = self.table_ids.read().get(name).copied() {
            self.record(CacheKind::TableId, true);
            return Ok(id);
        }
        self.record(CacheKind::TableId, false);

        let generation = self.generation();
        let id = self.metadata.get_table_id(name)?;
        let mut table_ids = self.table_ids.write();
        if self.generation() == generation {
            table_ids.insert(name.to_string(), id);
        }

        Ok(id)
    }

    pub fn schema(&self, table_id: u64) -> Result<Arc<TableSchema>, InternalError> {
        self.read_through(&self.schemas, table_id, CacheKind::Schema, || {
            self.metadata.get_schema(table_id).map(Arc::new)
        })
    }

    pub fn column_ids(&self, table_id: u64) -> Result<IdMap, InternalError> {
        self.read_through(&self.column_ids, table_id, CacheKind::Columns, || {
            self.metadata.get_column_ids(table_id).map(Arc::new)
        })
    }

    pub fn index_ids(&self, table_id: u64) -> Result<IdMap, InternalError> {
        self.read_through(&self.index_ids, table_id, CacheKind::Indices, || {
            self.metadata.get_index_ids(table_id).map(Arc::new)
        })
    }

    /// Callers hold the store's auto-increment lock.
    pub fn auto_inc(&self, table_id: u64) -> Result<i64, InternalError> {
        self.read_through(&self.auto_inc, table_id, CacheKind::AutoInc, || {
            self.metadata.get_auto_inc(table_id)
        })
    }

    /// Callers hold the store's row-count lock.
    pub fn row_count(&self, table_id: u64) -> Result<i64, InternalError> {
        self.read_through(&self.row_counts, table_id, CacheKind::RowCount, || {
            self.metadata.get_row_count(table_id)
        })
    }

    ///
    /// INVALIDATION
    ///

    pub fn invalidate_table_id(&self, name: &str) {
        self.bump_generation();
        self.table_ids.write().remove(name);
    }

    /// Drop every entry keyed by `table_id`.
    pub fn invalidate_table(&self, table_id: u64) {
        self.bump_generation();
        self.schemas.write().remove(&table_id);
        self.column_ids.write().remove(&table_id);
        self.index_ids.write().remove(&table_id);
        self.auto_inc.write().remove(&table_id);
        self.row_counts.write().remove(&table_id);
    }

    pub fn invalidate_schema(&self, table_id: u64) {
        self.bump_generation();
        self.schemas.write().remove(&table_id);
        self.column_ids.write().remove(&table_id);
        self.index_ids.write().remove(&table_id);
    }

    pub fn invalidate_auto_inc(&self, table_id: u64) {
        self.bump_generation();
        self.auto_inc.write().remove(&table_id);
    }

    /// Store the authoritative value returned by an increment.
    pub fn update_auto_inc(&self, table_id: u64, value: i64) {
        self.auto_inc.write().insert(table_id, value);
    }

    pub fn invalidate_row_count(&self, table_id: u64) {
        self.bump_generation();
        self.row_counts.write().remove(&table_id);
    }

    pub fn update_row_count(&self, table_id: u64, value: i64) {
        self.row_counts.write().insert(table_id, value);
    }

    ///
    /// INTERNALS
    ///

    fn read_through<V: Clone>(
        &self,
        map: &RwLock<BTreeMap<u64, V>>,
        table_id: u64,
        kind: CacheKind,
        load: impl FnOnce() -> Result<V, InternalError>,
    ) -> Result<V, InternalError> {
        if let Some(value) = map.read().get(&table_id).cloned() {
            self.record(kind, true);
            return Ok(value);
        }
        self.record(kind, false);

        let generation = self.generation();
        let value = load()?;
        let mut entries = map.write();
        if self.generation() == generation {
            entries.insert(table_id, value.clone());
        }

        Ok(value)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn record(&self, kind: CacheKind, hit: bool) {
        sink::record_if(self.metrics, MetricsEvent::CacheLookup { kind, hit });
    }
}

impl<K: KvStore> SchemaSource for MetadataCache<K> {
    fn schema(&self, table_id: u64) -> Result<Arc<TableSchema>, InternalError> {
        Self::schema(self, table_id)
    }

    fn index_ids(&self, table_id: u64) -> Result<Arc<BTreeMap<String, u64>>, InternalError> {
        Self::index_ids(self, table_id)
    }
}
