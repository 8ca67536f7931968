//! Engine-level counters.
//!
//! Lock-free accumulation; `snapshot` gives a consistent-enough view for
//! dashboards (individual counters are exact, cross-counter ratios are
//! best-effort).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub route_queries: AtomicU64,
    pub matrix_queries: AtomicU64,
    pub failed_queries: AtomicU64,
    pub states_settled: AtomicU64,
    pub endpoints_resolved: AtomicU64,
    pub dedup_saved: AtomicU64,
}

/// Plain-value copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub route_queries: u64,
    pub matrix_queries: u64,
    pub failed_queries: u64,
    pub states_settled: u64,
    pub endpoints_resolved: u64,
    pub dedup_saved: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            route_queries: self.route_queries.load(Ordering::Relaxed),
            matrix_queries: self.matrix_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            states_settled: self.states_settled.load(Ordering::Relaxed),
            endpoints_resolved: self.endpoints_resolved.load(Ordering::Relaxed),
            dedup_saved: self.dedup_saved.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_the_snapshot() {
        let metrics = EngineMetrics::new();
        metrics.add(&metrics.route_queries, 2);
        metrics.add(&metrics.states_settled, 40);
        let snap = metrics.snapshot();
        assert_eq!(snap.route_queries, 2);
        assert_eq!(snap.states_settled, 40);
        assert_eq!(snap.matrix_queries, 0);
    }
}
