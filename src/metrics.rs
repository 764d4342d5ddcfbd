//! C4: the metric-logging contract every mutation and query passes through.
//!
//! Modeled on the donor's `IncidentMetrics`/`NoOpMetrics`/`TestMetrics` split
//! (a trait with a production no-op-by-default implementation, a tracing-backed
//! one for real deployments, and an in-memory one the test suite asserts
//! against) and on `service::middleware::record_slice_metrics`'s
//! begin/end-around-an-operation shape.
//!
//! Every timed operation follows the same three calls: [`MetricLogger::begin`]
//! right after its locks are acquired, then either [`MetricLogger::end`] (the
//! mutation completed, possibly as a no-op) or [`MetricLogger::cancel_begin`]
//! (the mutation was rejected, e.g. a cycle or a strict not-found). A
//! completed mutation that changed relation cardinality also calls
//! [`MetricLogger::increment`]/[`MetricLogger::set`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// An in-flight timed operation, returned by [`MetricLogger::begin`] and
/// consumed by exactly one of [`MetricLogger::end`] or
/// [`MetricLogger::cancel_begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricEventId(pub u64);

/// The event kinds the core times and counts. Matches the wire event
/// taxonomy's `kind()` strings plus the read-only query kinds.
pub type MetricKind = &'static str;

/// Formal begin/end/increment/set interface for timing and counting access
/// manager operations.
///
/// Implementations must be safe to call from multiple threads concurrently,
/// since operations on disjoint relations run without mutual exclusion.
pub trait MetricLogger: Send + Sync {
    /// Start timing `kind`. Returns an id that must be passed to exactly one
    /// of `end`/`cancel_begin`.
    fn begin(&self, kind: MetricKind) -> MetricEventId;

    /// The operation completed (successfully, including as a no-op).
    fn end(&self, id: MetricEventId, kind: MetricKind);

    /// The operation was rejected before taking effect (e.g. cycle
    /// detection, a strict not-found). No duration is recorded.
    fn cancel_begin(&self, id: MetricEventId, kind: MetricKind);

    /// Bump a monotone counter by `delta` (can be negative for a decrement,
    /// e.g. cascading removal).
    fn increment(&self, kind: MetricKind, delta: i64);

    /// Set a gauge-style tally to an absolute value (used for the
    /// materialized relation cardinalities after a mutation).
    fn set(&self, kind: MetricKind, value: u64);
}

/// Default no-op implementation: all calls are free and discard their
/// arguments. Used when metric logging is disabled.
#[derive(Debug, Default)]
pub struct NoOpMetricLogger;

impl MetricLogger for NoOpMetricLogger {
    fn begin(&self, _kind: MetricKind) -> MetricEventId {
        MetricEventId(0)
    }
    fn end(&self, _id: MetricEventId, _kind: MetricKind) {}
    fn cancel_begin(&self, _id: MetricEventId, _kind: MetricKind) {}
    fn increment(&self, _kind: MetricKind, _delta: i64) {}
    fn set(&self, _kind: MetricKind, _value: u64) {}
}

/// Emits each call as a `tracing` event under the `access_manager::metrics`
/// target, at `debug` for begin/end/cancel and `info` for `set` (gauge
/// changes are comparatively rare and worth a coarser-grained trace).
#[derive(Debug, Default)]
pub struct TracingMetricLogger {
    next_id: AtomicU64,
}

impl TracingMetricLogger {
    /// A fresh logger.
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }
}

impl MetricLogger for TracingMetricLogger {
    fn begin(&self, kind: MetricKind) -> MetricEventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "access_manager::metrics", kind, id, "begin");
        MetricEventId(id)
    }

    fn end(&self, id: MetricEventId, kind: MetricKind) {
        tracing::debug!(target: "access_manager::metrics", kind, id = id.0, "end");
    }

    fn cancel_begin(&self, id: MetricEventId, kind: MetricKind) {
        tracing::debug!(target: "access_manager::metrics", kind, id = id.0, "cancel_begin");
    }

    fn increment(&self, kind: MetricKind, delta: i64) {
        tracing::debug!(target: "access_manager::metrics", kind, delta, "increment");
    }

    fn set(&self, kind: MetricKind, value: u64) {
        tracing::info!(target: "access_manager::metrics", kind, value, "set");
    }
}

/// In-memory bookkeeping of every call, for unit and integration tests to
/// assert against (how many begins happened for a kind, whether a
/// cancel_begin fired, the last gauge value set).
#[derive(Debug, Default)]
pub struct TestMetricLogger {
    next_id: AtomicU64,
    state: Mutex<TestMetricState>,
}

#[derive(Debug, Default)]
struct TestMetricState {
    begins: BTreeMap<&'static str, u64>,
    ends: BTreeMap<&'static str, u64>,
    cancels: BTreeMap<&'static str, u64>,
    increments: BTreeMap<&'static str, i64>,
    gauges: BTreeMap<&'static str, u64>,
}

impl TestMetricLogger {
    /// A fresh logger with all counters at zero.
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), state: Mutex::new(TestMetricState::default()) }
    }

    /// Number of `begin` calls recorded for `kind`.
    pub fn begin_count(&self, kind: MetricKind) -> u64 {
        self.state.lock().begins.get(kind).copied().unwrap_or(0)
    }

    /// Number of `end` calls recorded for `kind`.
    pub fn end_count(&self, kind: MetricKind) -> u64 {
        self.state.lock().ends.get(kind).copied().unwrap_or(0)
    }

    /// Number of `cancel_begin` calls recorded for `kind`.
    pub fn cancel_count(&self, kind: MetricKind) -> u64 {
        self.state.lock().cancels.get(kind).copied().unwrap_or(0)
    }

    /// Net sum of `increment` deltas recorded for `kind`.
    pub fn increment_total(&self, kind: MetricKind) -> i64 {
        self.state.lock().increments.get(kind).copied().unwrap_or(0)
    }

    /// Last `set` value recorded for `kind`, if any.
    pub fn gauge(&self, kind: MetricKind) -> Option<u64> {
        self.state.lock().gauges.get(kind).copied()
    }
}

impl MetricLogger for TestMetricLogger {
    fn begin(&self, kind: MetricKind) -> MetricEventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.state.lock().begins.entry(kind).or_insert(0) += 1;
        MetricEventId(id)
    }

    fn end(&self, _id: MetricEventId, kind: MetricKind) {
        *self.state.lock().ends.entry(kind).or_insert(0) += 1;
    }

    fn cancel_begin(&self, _id: MetricEventId, kind: MetricKind) {
        *self.state.lock().cancels.entry(kind).or_insert(0) += 1;
    }

    fn increment(&self, kind: MetricKind, delta: i64) {
        if delta == 0 {
            return;
        }
        *self.state.lock().increments.entry(kind).or_insert(0) += delta;
    }

    fn set(&self, kind: MetricKind, value: u64) {
        self.state.lock().gauges.insert(kind, value);
    }
}

impl<T: MetricLogger + ?Sized> MetricLogger for std::sync::Arc<T> {
    fn begin(&self, kind: MetricKind) -> MetricEventId {
        (**self).begin(kind)
    }
    fn end(&self, id: MetricEventId, kind: MetricKind) {
        (**self).end(id, kind)
    }
    fn cancel_begin(&self, id: MetricEventId, kind: MetricKind) {
        (**self).cancel_begin(id, kind)
    }
    fn increment(&self, kind: MetricKind, delta: i64) {
        (**self).increment(kind, delta)
    }
    fn set(&self, kind: MetricKind, value: u64) {
        (**self).set(kind, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_tracks_begin_end_and_cancel_independently() {
        let logger = TestMetricLogger::new();
        let id = logger.begin("UserAdd");
        logger.end(id, "UserAdd");
        let id2 = logger.begin("UserAdd");
        logger.cancel_begin(id2, "UserAdd");

        assert_eq!(logger.begin_count("UserAdd"), 2);
        assert_eq!(logger.end_count("UserAdd"), 1);
        assert_eq!(logger.cancel_count("UserAdd"), 1);
    }

    #[test]
    fn zero_delta_increment_is_not_recorded() {
        let logger = TestMetricLogger::new();
        logger.increment("UserToGroupAdd", 0);
        assert_eq!(logger.increment_total("UserToGroupAdd"), 0);
    }
}
