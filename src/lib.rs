//! counterkit: a bounded, label-keyed LRU cache of metric counter groups.
//!
//! Per-label counters (one group per tenant, bucket, user, ...) are created
//! on first use, registered with a process-wide [`MetricsRegistry`], and
//! unregistered again when the label falls out of the cache. The number of
//! live groups never exceeds the configured capacity.

pub mod builder;
pub mod cache;
pub mod ds;
pub mod entry;
pub mod error;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod registry;
pub mod schema;
pub mod traits;

pub use crate::builder::{LabelCacheBuilder, LabelCacheConfig};
pub use crate::cache::LabelCache;
pub use crate::ds::{IntrusiveList, LruIndex, SlotArena, SlotId};
pub use crate::entry::{Entry, EntryRef, Label};
pub use crate::error::{ConfigError, CreateError, InvariantError, RegistryError};
#[cfg(feature = "metrics")]
pub use crate::metrics::LabelCacheMetricsSnapshot;
pub use crate::registry::{AtomicCounterGroup, MemoryRegistry, RegistryStats};
pub use crate::schema::{Counter, CounterSchema, CounterSpec, REQUEST_STATS};
pub use crate::traits::{CounterGroup, MetricsRegistry};
