#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LabelCacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub create_calls: u64,
    pub create_hits: u64,
    pub create_new: u64,
    pub create_failures: u64,
    pub create_retries: u64,

    pub evictions: u64,
    pub removals: u64,
    pub unregister_failures: u64, // teardowns whose registry call failed

    // gauges captured at snapshot time
    pub resident: usize,
    pub capacity: usize,
}

impl LabelCacheMetricsSnapshot {
    /// Fraction of `get` calls that found a resident label.
    pub fn get_hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}
