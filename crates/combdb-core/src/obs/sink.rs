//! Metrics sink boundary.
//!
//! This module is the only bridge between engine logic and the global
//! metrics state. A scoped override may be installed per thread.
use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// ScanKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanKind {
    Table,
    IndexFull,
    IndexAt,
    IndexExclusive,
    IndexExact,
}

///
/// CacheKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheKind {
    TableId,
    Schema,
    Columns,
    Indices,
    AutoInc,
    RowCount,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    RowsWritten {
        table_id: u64,
        rows: u64,
    },
    RowsDeleted {
        table_id: u64,
        rows: u64,
    },
    IndexDelta {
        table_id: u64,
        inserts: u64,
        removes: u64,
    },
    Scan {
        kind: ScanKind,
    },
    RowsScanned {
        table_id: u64,
        rows: u64,
    },
    CacheLookup {
        kind: CacheKind,
        hit: bool,
    },
    SchemaConflict {
        table_id: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink writing into the thread-local counter state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::RowsWritten { table_id, rows } => metrics::with_state_mut(|m| {
                m.ops.rows_written = m.ops.rows_written.saturating_add(rows);
                let entry = metrics::with_table_mut(m, table_id);
                entry.rows_written = entry.rows_written.saturating_add(rows);
            }),

            MetricsEvent::RowsDeleted { table_id, rows } => metrics::with_state_mut(|m| {
                m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(rows);
                let entry = metrics::with_table_mut(m, table_id);
                entry.rows_deleted = entry.rows_deleted.saturating_add(rows);
            }),

            MetricsEvent::IndexDelta {
                table_id,
                inserts,
                removes,
            } => metrics::with_state_mut(|m| {
                m.ops.index_inserts = m.ops.index_inserts.saturating_add(inserts);
                m.ops.index_removes = m.ops.index_removes.saturating_add(removes);
                let entry = metrics::with_table_mut(m, table_id);
                entry.index_inserts = entry.index_inserts.saturating_add(inserts);
                entry.index_removes = entry.index_removes.saturating_add(removes);
            }),

            MetricsEvent::Scan { kind } => metrics::with_state_mut(|m| {
                let slot = match kind {
                    ScanKind::Table => &mut m.ops.scan_table,
                    ScanKind::IndexFull => &mut m.ops.scan_index_full,
                    ScanKind::IndexAt => &mut m.ops.scan_index_at,
                    ScanKind::IndexExclusive => &mut m.ops.scan_index_exclusive,
                    ScanKind::IndexExact => &mut m.ops.scan_index_exact,
                };
                *slot = slot.saturating_add(1);
            }),

            MetricsEvent::RowsScanned { table_id, rows } => metrics::with_state_mut(|m| {
                m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows);
                let entry = metrics::with_table_mut(m, table_id);
                entry.rows_scanned = entry.rows_scanned.saturating_add(rows);
            }),

            MetricsEvent::CacheLookup { hit, .. } => metrics::with_state_mut(|m| {
                if hit {
                    m.ops.cache_hits = m.ops.cache_hits.saturating_add(1);
                } else {
                    m.ops.cache_misses = m.ops.cache_misses.saturating_add(1);
                }
            }),

            MetricsEvent::SchemaConflict { .. } => metrics::with_state_mut(|m| {
                m.ops.schema_conflicts = m.ops.schema_conflicts.saturating_add(1);
            }),
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match override_sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Record only when the owning store has metrics enabled.
pub(crate) fn record_if(enabled: bool, event: MetricsEvent) {
    if enabled {
        record(event);
    }
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///
