//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and resetting are split into small traits so the
//! cache only depends on the recording side.
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │  LabelCacheMetricsRecorder   │  written from LabelCache hot paths
//!   │  get / create / evict / ...  │
//!   └──────────────┬───────────────┘
//!                  │
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsReset                 │
//!   │ (monitoring / tests)         │    │ (bench iterations)           │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Recorders take `&self`: the cache is shared across threads, so every
//! counter is an atomic cell.

/// Counters recorded by [`LabelCache`](crate::cache::LabelCache).
pub trait LabelCacheMetricsRecorder {
    fn record_get_hit(&self);
    fn record_get_miss(&self);
    fn record_create_call(&self);
    /// `get_or_create` found a live entry.
    fn record_create_hit(&self);
    /// A new counter group was built and registered.
    fn record_create_new(&self);
    fn record_create_failure(&self);
    /// Another caller's creation for the same label failed and this one restarted.
    fn record_create_retry(&self);
    fn record_eviction(&self);
    fn record_removal(&self);
    fn record_unregister_failure(&self);
}

/// Snapshot provider for monitoring and tests.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}
