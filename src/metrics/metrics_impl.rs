use crate::metrics::cell::MetricsCell;
use crate::metrics::snapshot::LabelCacheMetricsSnapshot;
use crate::metrics::traits::{LabelCacheMetricsRecorder, MetricsReset};

#[derive(Debug, Default)]
pub struct LabelCacheMetrics {
    pub get_calls: MetricsCell,
    pub get_hits: MetricsCell,
    pub get_misses: MetricsCell,
    pub create_calls: MetricsCell,
    pub create_hits: MetricsCell,
    pub create_new: MetricsCell,
    pub create_failures: MetricsCell,
    pub create_retries: MetricsCell,
    pub evictions: MetricsCell,
    pub removals: MetricsCell,
    pub unregister_failures: MetricsCell,
}

impl LabelCacheMetrics {
    pub const fn new() -> Self {
        Self {
            get_calls: MetricsCell::new(),
            get_hits: MetricsCell::new(),
            get_misses: MetricsCell::new(),
            create_calls: MetricsCell::new(),
            create_hits: MetricsCell::new(),
            create_new: MetricsCell::new(),
            create_failures: MetricsCell::new(),
            create_retries: MetricsCell::new(),
            evictions: MetricsCell::new(),
            removals: MetricsCell::new(),
            unregister_failures: MetricsCell::new(),
        }
    }

    /// Captures the counters together with the caller-supplied gauges.
    pub fn snapshot(&self, resident: usize, capacity: usize) -> LabelCacheMetricsSnapshot {
        LabelCacheMetricsSnapshot {
            get_calls: self.get_calls.get(),
            get_hits: self.get_hits.get(),
            get_misses: self.get_misses.get(),
            create_calls: self.create_calls.get(),
            create_hits: self.create_hits.get(),
            create_new: self.create_new.get(),
            create_failures: self.create_failures.get(),
            create_retries: self.create_retries.get(),
            evictions: self.evictions.get(),
            removals: self.removals.get(),
            unregister_failures: self.unregister_failures.get(),
            resident,
            capacity,
        }
    }
}

impl LabelCacheMetricsRecorder for LabelCacheMetrics {
    fn record_get_hit(&self) {
        self.get_calls.incr();
        self.get_hits.incr();
    }

    fn record_get_miss(&self) {
        self.get_calls.incr();
        self.get_misses.incr();
    }

    fn record_create_call(&self) {
        self.create_calls.incr();
    }

    fn record_create_hit(&self) {
        self.create_hits.incr();
    }

    fn record_create_new(&self) {
        self.create_new.incr();
    }

    fn record_create_failure(&self) {
        self.create_failures.incr();
    }

    fn record_create_retry(&self) {
        self.create_retries.incr();
    }

    fn record_eviction(&self) {
        self.evictions.incr();
    }

    fn record_removal(&self) {
        self.removals.incr();
    }

    fn record_unregister_failure(&self) {
        self.unregister_failures.incr();
    }
}

impl MetricsReset for LabelCacheMetrics {
    fn reset_metrics(&self) {
        for cell in [
            &self.get_calls,
            &self.get_hits,
            &self.get_misses,
            &self.create_calls,
            &self.create_hits,
            &self.create_new,
            &self.create_failures,
            &self.create_retries,
            &self.evictions,
            &self.removals,
            &self.unregister_failures,
        ] {
            cell.reset();
        }
    }
}
