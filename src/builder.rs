//! Label cache builder and configuration.
//!
//! Collects the sizing knobs for a [`LabelCache`] and validates them before
//! anything is allocated. `capacity` is the hard bound on live counter groups;
//! `index_capacity` only pre-sizes the label index and is clamped to
//! `capacity`.
//!
//! ## Example
//!
//! ```rust
//! use counterkit::builder::LabelCacheBuilder;
//! use counterkit::registry::MemoryRegistry;
//! use std::sync::Arc;
//!
//! let cache = LabelCacheBuilder::new(10_000)
//!     .with_index_capacity(256)
//!     .try_build(Arc::new(MemoryRegistry::new()))
//!     .unwrap();
//! assert_eq!(cache.capacity(), 10_000);
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::cache::LabelCache;
use crate::error::ConfigError;
use crate::traits::MetricsRegistry;

/// Validated label cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelCacheConfig {
    capacity: NonZeroUsize,
    index_capacity: usize,
}

impl LabelCacheConfig {
    /// Configuration that pre-sizes the index for the full capacity.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            index_capacity: capacity.get(),
        }
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }
}

/// Builder for [`LabelCache`] instances.
#[derive(Debug, Clone)]
pub struct LabelCacheBuilder {
    capacity: usize,
    index_capacity: Option<usize>,
}

impl LabelCacheBuilder {
    /// Create a new builder bounded at `capacity` labels.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index_capacity: None,
        }
    }

    /// Pre-size the label index for `index_capacity` labels instead of the
    /// full capacity. Useful when the bound is large but typically unreached.
    pub fn with_index_capacity(mut self, index_capacity: usize) -> Self {
        self.index_capacity = Some(index_capacity);
        self
    }

    /// Validate the collected settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `capacity` is zero.
    pub fn config(&self) -> Result<LabelCacheConfig, ConfigError> {
        let capacity = NonZeroUsize::new(self.capacity)
            .ok_or_else(|| ConfigError::new("label cache capacity must be > 0"))?;
        let index_capacity = self
            .index_capacity
            .map_or(capacity.get(), |hint| hint.min(capacity.get()));
        Ok(LabelCacheConfig {
            capacity,
            index_capacity,
        })
    }

    /// Build a cache reporting into `registry`.
    pub fn try_build<R>(self, registry: Arc<R>) -> Result<LabelCache<R>, ConfigError>
    where
        R: MetricsRegistry,
    {
        let config = self.config()?;
        Ok(LabelCache::with_config(registry, config))
    }
}
