//! Error types for counterkit.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache construction parameters are invalid
//!   (e.g. zero capacity).
//! - [`InvariantError`]: Returned when internal bookkeeping invariants are
//!   violated (`check_invariants` methods).
//! - [`RegistryError`]: Reported by a [`MetricsRegistry`](crate::traits::MetricsRegistry)
//!   implementation when building, registering or unregistering a group fails.
//! - [`CreateError`]: Returned by
//!   [`LabelCache::get_or_create`](crate::cache::LabelCache::get_or_create)
//!   when the group for a new label could not be brought up.
//!
//! Counter forwarding (`increment`, `decrement`, `set`, `read`) never returns
//! an error: recording a metric must not fail a request.
//!
//! ## Example Usage
//!
//! ```
//! use counterkit::error::ConfigError;
//! use counterkit::cache::LabelCache;
//! use counterkit::registry::MemoryRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let cache = LabelCache::try_new(Arc::clone(&registry), 64);
//! assert!(cache.is_ok());
//!
//! // Zero capacity is caught without panicking
//! let bad: Result<_, ConfigError> = LabelCache::try_new(registry, 0);
//! assert!(bad.is_err());
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by [`LruIndex::check_invariants`](crate::ds::LruIndex::check_invariants)
/// and [`LabelCache::check_invariants`](crate::cache::LabelCache::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// # Example
///
/// ```
/// use counterkit::builder::LabelCacheBuilder;
/// use counterkit::registry::MemoryRegistry;
/// use std::sync::Arc;
///
/// let err = LabelCacheBuilder::new(0)
///     .try_build(Arc::new(MemoryRegistry::new()))
///     .unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Failure reported by the process-wide metrics registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A group with the same label is already registered.
    #[error("counter group `{label}` is already registered")]
    AlreadyRegistered { label: String },
    /// The registry refused to build a group for `label`.
    #[error("counter group `{label}` could not be built: {reason}")]
    Build { label: String, reason: String },
    /// The registry backend cannot be reached.
    #[error("metrics registry unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// CreateError
// ---------------------------------------------------------------------------

/// Error returned when a label's counter group could not be created.
///
/// The cache is left unchanged: `label` does not become resident, no other
/// label is evicted, and nothing stays registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("failed to build counter group for `{label}`")]
    Build {
        label: String,
        #[source]
        source: RegistryError,
    },
    #[error("failed to register counter group for `{label}`")]
    Register {
        label: String,
        #[source]
        source: RegistryError,
    },
}

impl CreateError {
    /// Label whose creation failed.
    pub fn label(&self) -> &str {
        match self {
            CreateError::Build { label, .. } | CreateError::Register { label, .. } => label,
        }
    }

    /// Underlying registry failure.
    pub fn registry_error(&self) -> &RegistryError {
        match self {
            CreateError::Build { source, .. } | CreateError::Register { source, .. } => source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
