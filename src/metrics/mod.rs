//! Operational counters for the label cache itself.
//!
//! These describe how the cache behaves (hit rate, churn, teardown failures).
//! They are separate from the per-label counter groups the cache manages.

pub mod cell;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use metrics_impl::LabelCacheMetrics;
pub use snapshot::LabelCacheMetricsSnapshot;
pub use traits::{LabelCacheMetricsRecorder, MetricsReset, MetricsSnapshotProvider};
