//! Cache entries: one label, at most one counter group.
//!
//! ## Lifecycle
//!
//! ```text
//!              initialize() ok
//!   Pending ───────────────────► Live
//!      │                          │
//!      │ initialize() err         │ retire()  (evict / remove / clear / drop)
//!      │                          │   └─► registry.unregister(group)
//!      ▼                          ▼
//!   Retired ◄─────────────────────┘
//! ```
//!
//! A group is installed at most once and never replaced. Creation runs under
//! the entry's own `lifecycle` lock, so callers racing on one label wait for
//! a single build and registration. Only live or failed entries are ever
//! retired, so `retire` never waits behind a registry call of another entry.
//! The cache-wide index lock is never held across either.
//!
//! ## Predecessors
//!
//! When a label is evicted and immediately requested again, the new entry may
//! reach `register` before the evicting thread has unregistered the old group.
//! To keep one registered group per label, a new entry remembers the previous
//! entry for its label while that one is still being torn down, and retires
//! it before registering. Lifecycle locks are taken newest entry first.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{CreateError, RegistryError};
use crate::schema::CounterSchema;
use crate::traits::MetricsRegistry;

/// Cache key: an immutable, cheaply cloned label.
pub type Label = Arc<str>;

/// A resident (or formerly resident) label and its counter group.
pub struct Entry<G> {
    label: Label,
    group: OnceLock<G>,
    // Guards creation and teardown; holds the predecessor until it is retired.
    lifecycle: Mutex<Option<Arc<Entry<G>>>>,
    retired: AtomicBool,
}

/// Outcome of [`Entry::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Initialized {
    /// This call built and registered the group.
    Created,
    /// Another caller already installed the group.
    Existing,
    /// Creation by another caller failed and retired the entry.
    Retired,
}

impl<G> Entry<G> {
    pub(crate) fn pending(label: Label, predecessor: Option<Arc<Entry<G>>>) -> Self {
        Self {
            label,
            group: OnceLock::new(),
            lifecycle: Mutex::new(predecessor),
            retired: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub(crate) fn label_arc(&self) -> &Label {
        &self.label
    }

    /// Installed counter group; `None` while creation is still in flight.
    #[inline]
    pub fn group(&self) -> Option<&G> {
        self.group.get()
    }

    /// `true` once a group is installed and the entry has not been torn down.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.group.get().is_some() && !self.is_retired()
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Builds and registers this entry's group unless someone already has.
    pub(crate) fn initialize<R>(
        &self,
        registry: &R,
        schema: &CounterSchema,
    ) -> Result<Initialized, CreateError>
    where
        R: MetricsRegistry<Group = G> + ?Sized,
    {
        if self.group.get().is_some() {
            return Ok(Initialized::Existing);
        }

        let mut predecessor = self.lifecycle.lock();
        if self.is_retired() {
            return Ok(Initialized::Retired);
        }
        if self.group.get().is_some() {
            return Ok(Initialized::Existing);
        }
        if let Some(previous) = predecessor.take() {
            previous.retire_superseded(registry);
        }

        let group = registry.build(schema, &self.label).map_err(|source| {
            self.retired.store(true, Ordering::Release);
            CreateError::Build {
                label: self.label.to_string(),
                source,
            }
        })?;
        registry.register(&group).map_err(|source| {
            self.retired.store(true, Ordering::Release);
            CreateError::Register {
                label: self.label.to_string(),
                source,
            }
        })?;

        let installed = self.group.set(group).is_ok();
        debug_assert!(installed, "group installed twice for {}", self.label);
        Ok(Initialized::Created)
    }

    /// Marks the entry retired and unregisters its group, if any.
    ///
    /// Returns `Ok(true)` when a group was unregistered and `Ok(false)` when
    /// there was nothing to release (already retired, or never created).
    pub(crate) fn retire<R>(&self, registry: &R) -> Result<bool, RegistryError>
    where
        R: MetricsRegistry<Group = G> + ?Sized,
    {
        let _guard = self.lifecycle.lock();
        if self.retired.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        match self.group.get() {
            Some(group) => registry.unregister(group).map(|()| true),
            None => Ok(false),
        }
    }

    fn retire_superseded<R>(&self, registry: &R)
    where
        R: MetricsRegistry<Group = G> + ?Sized,
    {
        if let Err(err) = self.retire(registry) {
            warn!(
                label = self.label(),
                error = %err,
                "failed to unregister superseded counter group"
            );
        }
    }
}

impl<G> fmt::Debug for Entry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_retired() {
            "retired"
        } else if self.group.get().is_some() {
            "live"
        } else {
            "pending"
        };
        f.debug_struct("Entry")
            .field("label", &self.label)
            .field("state", &state)
            .finish()
    }
}

/// Shared handle to a cache entry.
///
/// Two handles for the same label compare equal under [`ptr_eq`](Self::ptr_eq)
/// as long as the entry stayed resident between the two lookups.
pub struct EntryRef<G>(Arc<Entry<G>>);

impl<G> EntryRef<G> {
    pub(crate) fn new(entry: Arc<Entry<G>>) -> Self {
        Self(entry)
    }

    /// `true` if both handles point at the same entry (and thus the same group).
    pub fn ptr_eq(&self, other: &EntryRef<G>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<G> Clone for EntryRef<G> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<G> Deref for EntryRef<G> {
    type Target = Entry<G>;

    fn deref(&self) -> &Entry<G> {
        &self.0
    }
}

impl<G> fmt::Debug for EntryRef<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
