//! Observability: runtime counters and the sink abstraction feeding them.
//!
//! Engine code never touches `metrics` directly; every event flows through
//! [`sink::record`].

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, TableCounters};
pub use sink::{
    CacheKind, MetricsEvent, MetricsSink, ScanKind, metrics_report, metrics_reset_all,
    with_metrics_sink,
};
