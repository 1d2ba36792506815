pub use crate::builder::{LabelCacheBuilder, LabelCacheConfig};
pub use crate::cache::LabelCache;
pub use crate::entry::EntryRef;
pub use crate::error::{ConfigError, CreateError, RegistryError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{LabelCacheMetricsSnapshot, MetricsReset, MetricsSnapshotProvider};
pub use crate::registry::MemoryRegistry;
pub use crate::schema::{Counter, REQUEST_STATS};
pub use crate::traits::{CounterGroup, MetricsRegistry};
