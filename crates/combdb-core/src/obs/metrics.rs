use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for engine operations.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct EventState {
    pub ops: EventOps,
    pub tables: BTreeMap<u64, TableCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EventOps {
    // Row mutations
    pub rows_written: u64,
    pub rows_deleted: u64,

    // Index maintenance (physical entries, both directions)
    pub index_inserts: u64,
    pub index_removes: u64,

    // Scans by kind
    pub scan_table: u64,
    pub scan_index_full: u64,
    pub scan_index_at: u64,
    pub scan_index_exclusive: u64,
    pub scan_index_exact: u64,
    pub rows_scanned: u64,

    // Metadata cache
    pub cache_hits: u64,
    pub cache_misses: u64,

    // Compare-and-swap failures on schema blobs
    pub schema_conflicts: u64,
}

///
/// TableCounters
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableCounters {
    pub rows_written: u64,
    pub rows_deleted: u64,
    pub index_inserts: u64,
    pub index_removes: u64,
    pub rows_scanned: u64,
}

///
/// EventReport
/// Point-in-time copy of the counters.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EventReport {
    pub ops: EventOps,
    pub tables: BTreeMap<u64, TableCounters>,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Borrow one table's counters, creating them on first use.
pub(crate) fn with_table_mut(state: &mut EventState, table_id: u64) -> &mut TableCounters {
    state.tables.entry(table_id).or_default()
}

pub(crate) fn report() -> EventReport {
    EVENT_STATE.with(|m| {
        let state = m.borrow();
        EventReport {
            ops: state.ops.clone(),
            tables: state.tables.clone(),
        }
    })
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}
